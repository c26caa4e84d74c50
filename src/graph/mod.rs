/// Graph Store Interface.
///
/// An abstract labeled property graph with `MERGE`-like upsert, parametric
/// queries, and time-bounded deletion. The core does not mandate a specific
/// engine; this crate ships one implementation, `InMemoryGraphStore`,
/// a `dashmap`-backed store built around a concurrent parent/child
/// adjacency map generalized into typed nodes and scored, evidenced edges.
pub mod memory;

pub use memory::InMemoryGraphStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::SpectreResult;
use crate::model::{Edge, EdgeType};
use crate::time::NanoTime;

/// The label (node type) of a stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Resource,
    ChangeEvent,
    K8sEvent,
    Dashboard,
    Panel,
    PromQuery,
    Metric,
    Variable,
    Alert,
    Service,
}

impl NodeLabel {
    /// The property field read by the Retention Manager's timestamp-based
    /// eviction. `None` for node types exempt from retention.
    pub fn retention_timestamp_field(&self) -> Option<&'static str> {
        match self {
            NodeLabel::Resource => Some("last_seen"),
            NodeLabel::ChangeEvent => Some("timestamp"),
            NodeLabel::K8sEvent => Some("timestamp"),
            NodeLabel::Metric | NodeLabel::Service | NodeLabel::Dashboard => None,
            NodeLabel::Panel | NodeLabel::PromQuery | NodeLabel::Variable | NodeLabel::Alert => None,
        }
    }
}

/// A stored node: a label, a stable id, and its JSON-encoded properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub label: NodeLabel,
    pub id: String,
    pub properties: JsonValue,
}

/// A minimal parametric query value. The core does not speak Cypher; any
/// engine satisfying upsert-by-label-+-key and variable-length traversal up
/// to depth 10 is acceptable. This shape keeps the `{rows, columns,
/// stats}` contract so a future Cypher-speaking engine is a drop-in.
#[derive(Debug, Clone)]
pub enum GraphQuery {
    NodesByLabel(NodeLabel),
    NeighborsOf { node_id: String, edge_types: Vec<EdgeType>, outgoing: bool },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryStats {
    pub nodes_scanned: u64,
    pub edges_scanned: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryOutcome {
    pub columns: Vec<String>,
    pub rows: Vec<JsonValue>,
    pub stats: QueryStats,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn connect(&self) -> SpectreResult<()>;
    async fn ping(&self) -> SpectreResult<()>;
    async fn initialize_schema(&self) -> SpectreResult<()>;
    async fn execute_query(&self, query: &GraphQuery) -> SpectreResult<QueryOutcome>;

    /// `MERGE (n:label {id}) ON CREATE SET props ON MATCH SET props` — the
    /// core's sole write path for nodes, idempotent under re-ingestion.
    async fn upsert_node(&self, label: NodeLabel, id: &str, properties: JsonValue) -> SpectreResult<()>;
    async fn get_node(&self, label: NodeLabel, id: &str) -> SpectreResult<Option<NodeRecord>>;
    async fn find_node_by_secondary_key(&self, label: NodeLabel, secondary_key: &str) -> SpectreResult<Option<NodeRecord>>;

    /// Upsert by `(type, from, to)`: re-ingestion only updates
    /// confidence/evidence/`lastValidated`, never the identity triple.
    async fn upsert_edge(&self, edge: Edge) -> SpectreResult<()>;
    async fn get_edge(&self, edge_type: EdgeType, from: &str, to: &str) -> SpectreResult<Option<Edge>>;
    async fn edges_from(&self, node_id: &str, edge_types: Option<&[EdgeType]>) -> SpectreResult<Vec<Edge>>;
    async fn edges_to(&self, node_id: &str, edge_types: Option<&[EdgeType]>) -> SpectreResult<Vec<Edge>>;
    async fn all_edges(&self) -> SpectreResult<Vec<Edge>>;
    async fn delete_edge(&self, edge_type: EdgeType, from: &str, to: &str) -> SpectreResult<()>;

    /// Delete nodes of `label` whose retention timestamp field precedes
    /// `cutoff_ns`, cascading along the store's configured cascade edge
    /// types. Returns the count deleted.
    async fn delete_nodes_by_timestamp(&self, label: NodeLabel, cutoff_ns: NanoTime) -> SpectreResult<u64>;

    async fn delete_graph(&self) -> SpectreResult<()>;
    async fn close(&self) -> SpectreResult<()>;

    async fn node_count(&self) -> SpectreResult<u64>;
    async fn edge_count(&self) -> SpectreResult<u64>;
}

/// `InMemoryGraphStore`: a `dashmap`-backed labeled property graph.
///
/// A concurrent parent/child adjacency map over opaque ids, generalized
/// into typed nodes with JSON properties and typed, evidenced,
/// confidence-bearing edges, with lock-free reads via sharded maps.
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{SpectreError, SpectreResult};
use crate::model::{Edge, EdgeType};
use crate::time::NanoTime;

use super::{GraphQuery, GraphStore, NodeLabel, NodeRecord, QueryOutcome, QueryStats};

type NodeKey = (NodeLabel, String);
type EdgeKey = (EdgeType, String, String);

/// Edge types the Retention Manager cascades deletion along.
const CASCADE_EDGE_TYPES: &[EdgeType] = &[
    EdgeType::Contains,
    EdgeType::Has,
    EdgeType::Changed,
    EdgeType::EmittedEvent,
    EdgeType::PrecededBy,
];

#[derive(Default)]
pub struct InMemoryGraphStore {
    nodes: DashMap<NodeKey, NodeRecord>,
    /// id -> label, so edge traversal (which only carries plain ids) can
    /// resolve the owning node's label for cascade deletion.
    label_by_id: DashMap<String, NodeLabel>,
    secondary_index: DashMap<(NodeLabel, String), String>,
    edges: DashMap<EdgeKey, Edge>,
    /// from-id -> outgoing edge keys, for `edges_from` without a full scan.
    out_adj: DashMap<String, Vec<EdgeKey>>,
    /// to-id -> incoming edge keys, for `edges_to` without a full scan.
    in_adj: DashMap<String, Vec<EdgeKey>>,
    connected: AtomicU64,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_label(&self, id: &str) -> Option<NodeLabel> {
        self.label_by_id.get(id).map(|l| *l)
    }

    /// Recursively delete a node and whatever the cascade edge set reaches.
    /// Returns the number of nodes removed.
    fn cascade_delete(&self, label: NodeLabel, id: &str) -> u64 {
        if self.nodes.remove(&(label, id.to_string())).is_none() {
            return 0;
        }
        self.label_by_id.remove(id);
        let mut removed = 1u64;

        if let Some((_, keys)) = self.out_adj.remove(id) {
            for key in keys {
                if CASCADE_EDGE_TYPES.contains(&key.0) {
                    if let Some(target_label) = self.node_label(&key.2) {
                        removed += self.cascade_delete(target_label, &key.2);
                    }
                }
                self.unindex_edge(&key);
            }
        }
        if let Some((_, keys)) = self.in_adj.remove(id) {
            for key in keys {
                self.unindex_edge(&key);
            }
        }
        removed
    }

    fn unindex_edge(&self, key: &EdgeKey) {
        self.edges.remove(key);
        if let Some(mut v) = self.out_adj.get_mut(&key.1) {
            v.retain(|k| k != key);
        }
        if let Some(mut v) = self.in_adj.get_mut(&key.2) {
            v.retain(|k| k != key);
        }
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn connect(&self) -> SpectreResult<()> {
        self.connected.store(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> SpectreResult<()> {
        if self.connected.load(Ordering::SeqCst) == 0 {
            return Err(SpectreError::Transient("graph store not connected".into()));
        }
        Ok(())
    }

    async fn initialize_schema(&self) -> SpectreResult<()> {
        Ok(())
    }

    async fn execute_query(&self, query: &GraphQuery) -> SpectreResult<QueryOutcome> {
        match query {
            GraphQuery::NodesByLabel(label) => {
                let mut rows = Vec::new();
                let mut scanned = 0u64;
                for entry in self.nodes.iter() {
                    scanned += 1;
                    if entry.key().0 == *label {
                        rows.push(entry.value().properties.clone());
                    }
                }
                Ok(QueryOutcome {
                    columns: vec!["node".to_string()],
                    rows,
                    stats: QueryStats { nodes_scanned: scanned, edges_scanned: 0 },
                })
            }
            GraphQuery::NeighborsOf { node_id, edge_types, outgoing } => {
                let edges = if *outgoing {
                    self.edges_from(node_id, if edge_types.is_empty() { None } else { Some(edge_types) })
                        .await?
                } else {
                    self.edges_to(node_id, if edge_types.is_empty() { None } else { Some(edge_types) })
                        .await?
                };
                let scanned = edges.len() as u64;
                let rows = edges
                    .iter()
                    .map(|e| serde_json::to_value(e).unwrap_or(JsonValue::Null))
                    .collect();
                Ok(QueryOutcome {
                    columns: vec!["edge".to_string()],
                    rows,
                    stats: QueryStats { nodes_scanned: 0, edges_scanned: scanned },
                })
            }
        }
    }

    async fn upsert_node(&self, label: NodeLabel, id: &str, properties: JsonValue) -> SpectreResult<()> {
        let key = (label, id.to_string());
        self.nodes
            .entry(key)
            .and_modify(|rec| merge_properties(&mut rec.properties, &properties))
            .or_insert_with(|| NodeRecord { label, id: id.to_string(), properties: properties.clone() });
        self.label_by_id.insert(id.to_string(), label);

        if let Some(secondary) = properties.get("secondary_key").and_then(|v| v.as_str()) {
            self.secondary_index.insert((label, secondary.to_string()), id.to_string());
        }
        Ok(())
    }

    async fn get_node(&self, label: NodeLabel, id: &str) -> SpectreResult<Option<NodeRecord>> {
        Ok(self.nodes.get(&(label, id.to_string())).map(|r| r.value().clone()))
    }

    async fn find_node_by_secondary_key(&self, label: NodeLabel, secondary_key: &str) -> SpectreResult<Option<NodeRecord>> {
        let Some(id) = self.secondary_index.get(&(label, secondary_key.to_string())).map(|r| r.value().clone()) else {
            return Ok(None);
        };
        self.get_node(label, &id).await
    }

    async fn upsert_edge(&self, edge: Edge) -> SpectreResult<()> {
        let key = edge.key();
        let is_new = !self.edges.contains_key(&key);
        self.edges
            .entry(key.clone())
            .and_modify(|existing| {
                // Re-ingestion only updates confidence/evidence/lastValidated, never identity.
                existing.confidence = edge.confidence;
                existing.evidence = edge.evidence.clone();
                existing.last_validated = edge.last_validated;
                existing.validation_state = edge.validation_state;
            })
            .or_insert(edge);
        if is_new {
            self.out_adj.entry(key.1.clone()).or_default().push(key.clone());
            self.in_adj.entry(key.2.clone()).or_default().push(key);
        }
        Ok(())
    }

    async fn get_edge(&self, edge_type: EdgeType, from: &str, to: &str) -> SpectreResult<Option<Edge>> {
        Ok(self
            .edges
            .get(&(edge_type, from.to_string(), to.to_string()))
            .map(|e| e.value().clone()))
    }

    async fn edges_from(&self, node_id: &str, edge_types: Option<&[EdgeType]>) -> SpectreResult<Vec<Edge>> {
        let Some(keys) = self.out_adj.get(node_id) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter(|k| edge_types.map(|types| types.contains(&k.0)).unwrap_or(true))
            .filter_map(|k| self.edges.get(k).map(|e| e.value().clone()))
            .collect())
    }

    async fn edges_to(&self, node_id: &str, edge_types: Option<&[EdgeType]>) -> SpectreResult<Vec<Edge>> {
        let Some(keys) = self.in_adj.get(node_id) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter(|k| edge_types.map(|types| types.contains(&k.0)).unwrap_or(true))
            .filter_map(|k| self.edges.get(k).map(|e| e.value().clone()))
            .collect())
    }

    async fn all_edges(&self) -> SpectreResult<Vec<Edge>> {
        Ok(self.edges.iter().map(|e| e.value().clone()).collect())
    }

    async fn delete_edge(&self, edge_type: EdgeType, from: &str, to: &str) -> SpectreResult<()> {
        self.unindex_edge(&(edge_type, from.to_string(), to.to_string()));
        Ok(())
    }

    async fn delete_nodes_by_timestamp(&self, label: NodeLabel, cutoff_ns: NanoTime) -> SpectreResult<u64> {
        let Some(field) = label.retention_timestamp_field() else {
            return Ok(0);
        };
        let mut to_delete = Vec::new();
        for entry in self.nodes.iter() {
            if entry.key().0 != label {
                continue;
            }
            if let Some(ts) = entry.value().properties.get(field).and_then(|v| v.as_i64()) {
                if ts < cutoff_ns {
                    to_delete.push(entry.key().1.clone());
                }
            }
        }
        let mut total = 0u64;
        for id in to_delete {
            total += self.cascade_delete(label, &id);
        }
        Ok(total)
    }

    async fn delete_graph(&self) -> SpectreResult<()> {
        self.nodes.clear();
        self.label_by_id.clear();
        self.secondary_index.clear();
        self.edges.clear();
        self.out_adj.clear();
        self.in_adj.clear();
        Ok(())
    }

    async fn close(&self) -> SpectreResult<()> {
        self.connected.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn node_count(&self) -> SpectreResult<u64> {
        Ok(self.nodes.len() as u64)
    }

    async fn edge_count(&self) -> SpectreResult<u64> {
        Ok(self.edges.len() as u64)
    }
}

/// Fields that identify when a node was first observed. Re-observation must
/// never move these forward; create-only fields take the lesser of the
/// stored and incoming value instead of being overwritten.
const CREATE_ONLY_MIN_FIELDS: &[&str] = &["first_seen", "first_observed"];

fn merge_properties(existing: &mut JsonValue, incoming: &JsonValue) {
    let (Some(existing_map), Some(incoming_map)) = (existing.as_object_mut(), incoming.as_object()) else {
        *existing = incoming.clone();
        return;
    };
    for (k, v) in incoming_map {
        if CREATE_ONLY_MIN_FIELDS.contains(&k.as_str()) {
            match (existing_map.get(k).and_then(|e| e.as_i64()), v.as_i64()) {
                (Some(stored), Some(incoming_ts)) => {
                    existing_map.insert(k.clone(), JsonValue::from(stored.min(incoming_ts)));
                }
                _ => {
                    existing_map.insert(k.clone(), v.clone());
                }
            }
        } else {
            existing_map.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EdgeType;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_node_is_idempotent_and_merges_properties() {
        let store = InMemoryGraphStore::new();
        store.upsert_node(NodeLabel::Resource, "u1", json!({"last_seen": 100, "kind": "Pod"})).await.unwrap();
        store.upsert_node(NodeLabel::Resource, "u1", json!({"last_seen": 200})).await.unwrap();

        let node = store.get_node(NodeLabel::Resource, "u1").await.unwrap().unwrap();
        assert_eq!(node.properties["last_seen"], 200);
        assert_eq!(node.properties["kind"], "Pod");
        assert_eq!(store.node_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_node_preserves_earliest_first_seen() {
        let store = InMemoryGraphStore::new();
        store.upsert_node(NodeLabel::Resource, "u1", json!({"first_seen": 100, "last_seen": 100})).await.unwrap();
        store.upsert_node(NodeLabel::Resource, "u1", json!({"first_seen": 200, "last_seen": 200})).await.unwrap();

        let node = store.get_node(NodeLabel::Resource, "u1").await.unwrap().unwrap();
        assert_eq!(node.properties["first_seen"], 100, "first_seen must never move forward on re-observation");
        assert_eq!(node.properties["last_seen"], 200);
    }

    #[tokio::test]
    async fn upsert_edge_only_updates_confidence_and_state() {
        let store = InMemoryGraphStore::new();
        let e1 = Edge::inferred(EdgeType::TriggeredBy, "a", "b", 0.8, vec![], 0);
        store.upsert_edge(e1).await.unwrap();

        let e2 = Edge::inferred(EdgeType::TriggeredBy, "a", "b", 0.5, vec![], 10);
        store.upsert_edge(e2).await.unwrap();

        let stored = store.get_edge(EdgeType::TriggeredBy, "a", "b").await.unwrap().unwrap();
        assert_eq!(stored.confidence, 0.5);
        assert_eq!(stored.first_observed, 0, "identity/first_observed must not change on re-ingestion");
        assert_eq!(store.edge_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cascade_delete_stops_at_metrics() {
        let store = InMemoryGraphStore::new();
        store.upsert_node(NodeLabel::Dashboard, "dash1", json!({})).await.unwrap();
        store.upsert_node(NodeLabel::Panel, "panel1", json!({})).await.unwrap();
        store.upsert_node(NodeLabel::PromQuery, "q1", json!({})).await.unwrap();
        store.upsert_node(NodeLabel::Metric, "cpu_usage", json!({})).await.unwrap();

        store.upsert_edge(Edge::structural(EdgeType::Contains, "dash1", "panel1", 0)).await.unwrap();
        store.upsert_edge(Edge::structural(EdgeType::Has, "panel1", "q1", 0)).await.unwrap();
        store.upsert_edge(Edge::structural(EdgeType::Uses, "q1", "cpu_usage", 0)).await.unwrap();

        let removed = store.cascade_delete(NodeLabel::Dashboard, "dash1");
        assert_eq!(removed, 3, "dashboard, panel, and query should be removed");
        assert!(store.get_node(NodeLabel::Metric, "cpu_usage").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_nodes_by_timestamp_respects_retention_exemptions() {
        let store = InMemoryGraphStore::new();
        store.upsert_node(NodeLabel::ChangeEvent, "c1", json!({"timestamp": 100})).await.unwrap();
        store.upsert_node(NodeLabel::ChangeEvent, "c2", json!({"timestamp": 500})).await.unwrap();
        store.upsert_node(NodeLabel::Metric, "m1", json!({"timestamp": 0})).await.unwrap();

        let removed = store.delete_nodes_by_timestamp(NodeLabel::ChangeEvent, 300).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_node(NodeLabel::ChangeEvent, "c1").await.unwrap().is_none());
        assert!(store.get_node(NodeLabel::ChangeEvent, "c2").await.unwrap().is_some());

        let removed_metric = store.delete_nodes_by_timestamp(NodeLabel::Metric, i64::MAX).await.unwrap();
        assert_eq!(removed_metric, 0, "Metric is exempt from retention");
    }
}

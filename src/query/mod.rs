/// Query Layer.
///
/// Causal-reasoning read operations over the graph: backward causal-path
/// reconstruction, forward blast-radius expansion, cluster-wide health
/// rollup, and per-resource anomaly detection. Every operation here
/// is read-only; none mutate the graph.
pub mod anomalies;
pub mod blast_radius;
pub mod causal_paths;
pub mod cluster_health;

pub use anomalies::Anomaly;
pub use blast_radius::BlastRadiusResult;
pub use causal_paths::CausalPath;
pub use cluster_health::ClusterHealth;

use std::sync::Arc;

use crate::error::SpectreResult;
use crate::graph::GraphStore;
use crate::model::EdgeType;
use crate::time::NanoTime;

pub struct QueryLayer {
    graph: Arc<dyn GraphStore>,
}

impl QueryLayer {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    pub async fn causal_paths(
        &self,
        resource_uid: &str,
        failure_timestamp: NanoTime,
        lookback_minutes: u64,
        max_depth: u32,
        max_paths: usize,
    ) -> SpectreResult<Vec<CausalPath>> {
        causal_paths::causal_paths(
            self.graph.as_ref(),
            resource_uid,
            failure_timestamp,
            lookback_minutes,
            max_depth.min(10),
            max_paths.min(20),
        )
        .await
    }

    pub async fn blast_radius(
        &self,
        resource_uid: &str,
        max_depth: u32,
        edge_type_filter: Option<Vec<EdgeType>>,
    ) -> SpectreResult<BlastRadiusResult> {
        blast_radius::blast_radius(self.graph.as_ref(), resource_uid, max_depth, edge_type_filter).await
    }

    pub async fn cluster_health(&self, start_ns: NanoTime, end_ns: NanoTime) -> SpectreResult<ClusterHealth> {
        cluster_health::cluster_health(self.graph.as_ref(), start_ns, end_ns).await
    }

    pub async fn anomalies(
        &self,
        resource_uid: &str,
        start_ns: NanoTime,
        end_ns: NanoTime,
    ) -> SpectreResult<Vec<Anomaly>> {
        anomalies::anomalies(self.graph.as_ref(), resource_uid, start_ns, end_ns).await
    }
}

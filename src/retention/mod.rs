/// Retention Manager.
///
/// Periodically deletes nodes whose retention timestamp field precedes the
/// retention window, cascading deletion along the edge types the graph
/// store's own cascade logic already encodes. `Metric`, `Service`,
/// `Dashboard` carry no retention timestamp field and are never swept.
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::GraphConfig;
use crate::error::SpectreResult;
use crate::graph::{GraphStore, NodeLabel};
use crate::time::now_ns;

const SWEEP_INTERVAL_SECS: u64 = 60 * 60;

const RETAINED_LABELS: &[NodeLabel] = &[
    NodeLabel::Resource,
    NodeLabel::ChangeEvent,
    NodeLabel::K8sEvent,
];

pub struct RetentionManager {
    graph: Arc<dyn GraphStore>,
    config: GraphConfig,
}

impl RetentionManager {
    pub fn new(graph: Arc<dyn GraphStore>, config: GraphConfig) -> Self {
        Self { graph, config }
    }

    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("retention worker shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            tracing::error!(error = %e, "retention sweep failed");
                        }
                    }
                }
            }
        });
    }

    /// One full sweep: for each retention-bounded node label, delete nodes
    /// whose timestamp field precedes `now - retentionHours`.
    pub async fn run_once(&self) -> SpectreResult<u64> {
        let cutoff = now_ns() - (self.config.retention_hours as i64) * 60 * 60 * 1_000_000_000;
        let mut total = 0u64;
        for label in RETAINED_LABELS {
            if label.retention_timestamp_field().is_none() {
                continue;
            }
            let deleted = self.graph.delete_nodes_by_timestamp(*label, cutoff).await?;
            if deleted > 0 {
                tracing::info!(label = ?label, deleted, "retention: swept expired nodes");
            }
            total += deleted;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraphStore;
    use crate::model::ResourceIdentity;

    #[tokio::test]
    async fn sweeps_expired_resources_but_spares_recent_ones() {
        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let now = now_ns();
        let old = ResourceIdentity::new("old", "", "v1", "Pod", "ns", "gone", now - 48 * 60 * 60 * 1_000_000_000);
        let fresh = ResourceIdentity::new("fresh", "", "v1", "Pod", "ns", "alive", now);
        graph
            .upsert_node(NodeLabel::Resource, "old", serde_json::to_value(&old).unwrap())
            .await
            .unwrap();
        graph
            .upsert_node(NodeLabel::Resource, "fresh", serde_json::to_value(&fresh).unwrap())
            .await
            .unwrap();

        let manager = RetentionManager::new(graph.clone(), GraphConfig::default());
        let deleted = manager.run_once().await.unwrap();
        assert_eq!(deleted, 1);
        assert!(graph.get_node(NodeLabel::Resource, "old").await.unwrap().is_none());
        assert!(graph.get_node(NodeLabel::Resource, "fresh").await.unwrap().is_some());
    }
}

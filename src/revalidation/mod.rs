/// Revalidation Engine.
///
/// A periodic worker that re-checks every inferred edge's evidence, applies
/// confidence decay, and marks stale/invalid edges. Structural edges
/// are exempt — they carry confidence 1.0 and never decay.
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RevalidationConfig;
use crate::graph::{GraphStore, NodeLabel};
use crate::model::{Edge, EdgeType, EvidenceKind, ValidationState};
use crate::time::now_ns;

pub struct RevalidationEngine {
    graph: Arc<dyn GraphStore>,
    config: RevalidationConfig,
}

impl RevalidationEngine {
    pub fn new(graph: Arc<dyn GraphStore>, config: RevalidationConfig) -> Self {
        Self { graph, config }
    }

    /// Spawns the periodic worker; returns a token the caller cancels at
    /// shutdown.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) {
        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("revalidation worker shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            tracing::error!(error = %e, "revalidation sweep failed");
                        }
                    }
                }
            }
        });
    }

    /// One full sweep over inferred edges older than `maxAge`.
    pub async fn run_once(&self) -> Result<(), crate::error::SpectreError> {
        let now = now_ns();
        let max_age_ns = self.config.max_age_secs as i64 * 1_000_000_000;
        let all = self.graph.all_edges().await?;

        for edge in all {
            if edge.edge_type.is_structural() {
                continue;
            }
            if now - edge.last_validated < max_age_ns {
                continue;
            }
            let revalidated = self.revalidate(edge, now).await;
            if let Err(e) = self.graph.upsert_edge(revalidated).await {
                tracing::warn!(error = %e, "revalidation: failed to write back edge");
            }
        }
        Ok(())
    }

    async fn revalidate(&self, mut edge: Edge, now: i64) -> Edge {
        let (source_deleted, target_deleted) =
            (self.node_deleted(&edge.from).await, self.node_deleted(&edge.to).await);

        let mut invalid = source_deleted || target_deleted;

        if !invalid && !edge.evidence.is_empty() {
            for item in &edge.evidence {
                if !self.evidence_holds(item, &edge).await {
                    invalid = true;
                    break;
                }
            }
        }

        if self.config.decay_enabled {
            edge.confidence = self.decay(edge.base_confidence, now - edge.first_observed);
        }

        let age = now - edge.first_observed;
        let stale_threshold_ns = self.config.stale_threshold_secs as i64 * 1_000_000_000;

        edge.validation_state = if invalid {
            ValidationState::Invalid
        } else if age > stale_threshold_ns {
            ValidationState::Stale
        } else {
            ValidationState::Valid
        };
        edge.last_validated = now;
        edge
    }

    /// Confidence decay table: 1.0 for age <= 6h, 0.9 for <= 24h, 0.7
    /// beyond, floor 0.1 — unless `base_confidence` is 1.0 (structural,
    /// handled before this is reached, but defensive here too).
    fn decay(&self, base_confidence: f64, age_ns: i64) -> f64 {
        if base_confidence >= 1.0 {
            return base_confidence;
        }
        const SIX_HOURS_NS: i64 = 6 * 60 * 60 * 1_000_000_000;
        const TWENTY_FOUR_HOURS_NS: i64 = 24 * 60 * 60 * 1_000_000_000;
        let factor = if age_ns <= SIX_HOURS_NS {
            1.0
        } else if age_ns <= TWENTY_FOUR_HOURS_NS {
            self.config.decay_factor_6h
        } else {
            self.config.decay_factor_24h
        };
        (base_confidence * factor).max(0.1)
    }

    async fn node_deleted(&self, id: &str) -> bool {
        match self.graph.get_node(NodeLabel::Resource, id).await {
            Ok(Some(node)) => node
                .properties
                .get("deleted")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            _ => false,
        }
    }

    async fn evidence_holds(&self, evidence: &crate::model::Evidence, edge: &Edge) -> bool {
        match evidence.kind {
            EvidenceKind::Label | EvidenceKind::Annotation => {
                let Some(key) = &evidence.key else { return true };
                let Ok(Some(target)) = self.graph.get_node(NodeLabel::Resource, &edge.to).await else {
                    return false;
                };
                let map_field = if evidence.kind == EvidenceKind::Label { "labels" } else { "annotations" };
                let Some(value) = target.properties.get(map_field).and_then(|m| m.get(key)).and_then(|v| v.as_str())
                else {
                    return false;
                };
                match &evidence.match_value {
                    Some(expected) => value == expected,
                    None => true,
                }
            }
            EvidenceKind::Ownership => self
                .graph
                .get_edge(EdgeType::Owns, &edge.from, &edge.to)
                .await
                .ok()
                .flatten()
                .is_some(),
            EvidenceKind::Namespace => {
                let source_ns = self.resource_namespace(&edge.from).await;
                let target_ns = self.resource_namespace(&edge.to).await;
                match (source_ns, target_ns) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            EvidenceKind::Temporal | EvidenceKind::Reconcile => true,
        }
    }

    async fn resource_namespace(&self, id: &str) -> Option<String> {
        self.graph
            .get_node(NodeLabel::Resource, id)
            .await
            .ok()
            .flatten()
            .and_then(|n| n.properties.get("namespace").and_then(|v| v.as_str()).map(str::to_string))
    }
}

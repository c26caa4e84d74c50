/// Causality Inference.
///
/// For each newly ingested `ChangeEvent`, enumerates candidate causes reached
/// by a bounded structural BFS, scores them, and emits `TRIGGERED_BY` edges
/// above the configured confidence floor.
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::config::CausalityConfig;
use crate::graph::GraphStore;
use crate::model::{ChangeEvent, Edge, EdgeType, Evidence};

const NS_PER_MS: i64 = 1_000_000;
const MAX_EDGES_PER_TARGET: usize = 5;

struct Candidate {
    change_event_id: String,
    resource_uid: String,
    timestamp: i64,
    impact_score: f64,
    hop_count: u32,
}

pub struct CausalityEngine {
    graph: Arc<dyn GraphStore>,
    config: CausalityConfig,
}

impl CausalityEngine {
    pub fn new(graph: Arc<dyn GraphStore>, config: CausalityConfig) -> Self {
        Self { graph, config }
    }

    /// Runs inference for a single newly-ingested change event, upserting any
    /// `TRIGGERED_BY` edges that clear the confidence floor. Errors are
    /// logged and swallowed — inference is best-effort and must never block
    /// the ingestion pipeline.
    pub async fn infer(&self, event: &ChangeEvent) {
        let candidates = self.enumerate_candidates(event).await;
        let mut scored: Vec<(Candidate, f64)> = candidates
            .into_iter()
            .map(|c| {
                let score = self.score(event, &c);
                (c, score)
            })
            .filter(|(_, score)| *score >= self.config.min_confidence)
            .collect();

        scored.sort_by(|(a, a_score), (b, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
                .then_with(|| b.impact_score.partial_cmp(&a.impact_score).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.resource_uid.cmp(&b.resource_uid))
        });
        scored.truncate(MAX_EDGES_PER_TARGET);

        for (candidate, score) in scored {
            let lag_ms = (event.timestamp - candidate.timestamp) / NS_PER_MS;
            let evidence = vec![
                Evidence::temporal(lag_ms, self.config.lookback_minutes as i64 * 60_000, 0.5),
                Evidence::structural(0.3),
            ];
            let edge = Edge::inferred(
                EdgeType::TriggeredBy,
                event.id.clone(),
                candidate.change_event_id.clone(),
                score,
                evidence,
                event.timestamp,
            );
            if let Err(e) = self.graph.upsert_edge(edge).await {
                tracing::warn!(error = %e, cause = %candidate.change_event_id, "causality: failed to upsert TRIGGERED_BY edge");
            }
        }
    }

    /// `0.5*temporalScore + 0.3*distanceScore + 0.2*severityScore`.
    fn score(&self, event: &ChangeEvent, candidate: &Candidate) -> f64 {
        let lookback_ms = (self.config.lookback_minutes as f64) * 60_000.0;
        let lag_ms = ((event.timestamp - candidate.timestamp) / NS_PER_MS) as f64;
        let temporal_score = (1.0 - lag_ms / lookback_ms).max(0.0);
        let distance_score = 1.0 / candidate.hop_count.max(1) as f64;
        let severity_score = candidate.impact_score;
        0.5 * temporal_score + 0.3 * distance_score + 0.2 * severity_score
    }

    /// Bounded structural BFS over `OWNS, SELECTS, SCHEDULED_ON, MOUNTS,
    /// USES_SERVICE_ACCOUNT, REFERENCES_SPEC, MANAGES`, collecting
    /// `ChangeEvent`s within `lookbackMinutes` preceding `event`.
    async fn enumerate_candidates(&self, event: &ChangeEvent) -> Vec<Candidate> {
        let hop_types: Vec<EdgeType> = [
            EdgeType::Owns,
            EdgeType::Selects,
            EdgeType::ScheduledOn,
            EdgeType::Mounts,
            EdgeType::UsesServiceAccount,
            EdgeType::ReferencesSpec,
            EdgeType::Manages,
        ]
        .to_vec();

        let lookback_ns = self.config.lookback_minutes as i64 * 60 * 1_000_000_000;
        let earliest = event.timestamp - lookback_ns;

        let mut visited = HashSet::new();
        visited.insert(event.resource_uid.clone());
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((event.resource_uid.clone(), 0));

        let mut candidates = Vec::new();

        while let Some((resource_uid, depth)) = queue.pop_front() {
            if depth >= self.config.max_depth {
                continue;
            }
            let mut neighbors: Vec<String> = Vec::new();
            if let Ok(edges) = self.graph.edges_from(&resource_uid, Some(&hop_types)).await {
                neighbors.extend(edges.into_iter().map(|e| e.to));
            }
            if let Ok(edges) = self.graph.edges_to(&resource_uid, Some(&hop_types)).await {
                neighbors.extend(edges.into_iter().map(|e| e.from));
            }

            for neighbor in neighbors {
                if visited.contains(&neighbor) {
                    continue;
                }
                visited.insert(neighbor.clone());
                let next_depth = depth + 1;

                for change in self.change_events_for(&neighbor, earliest, event.timestamp).await {
                    candidates.push(Candidate {
                        change_event_id: change.id,
                        resource_uid: neighbor.clone(),
                        timestamp: change.timestamp,
                        impact_score: change.impact_score,
                        hop_count: next_depth,
                    });
                }

                queue.push_back((neighbor, next_depth));
            }
        }

        candidates
    }

    /// Fetches `ChangeEvent`s for `resource_uid` with `earliest <= ts <
    /// before` via the structural `CHANGED` adjacency.
    async fn change_events_for(&self, resource_uid: &str, earliest: i64, before: i64) -> Vec<ChangeEvent> {
        let Ok(edges) = self.graph.edges_from(resource_uid, Some(&[EdgeType::Changed])).await else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for edge in edges {
            let Ok(Some(node)) = self.graph.get_node(crate::graph::NodeLabel::ChangeEvent, &edge.to).await else {
                continue;
            };
            let Ok(change) = serde_json::from_value::<ChangeEvent>(node.properties) else {
                continue;
            };
            if change.timestamp >= earliest && change.timestamp < before {
                out.push(change);
            }
        }
        out
    }
}

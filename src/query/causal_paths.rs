/// Causal paths: bounded backward BFS from a failing resource's
/// `ChangeEvent`, reconstructed from the materialized `TRIGGERED_BY` edges
/// Causality Inference already produced, rather than re-running the same
/// structural BFS a second time at query time.
use serde::Serialize;

use crate::error::SpectreResult;
use crate::graph::{GraphStore, NodeLabel};
use crate::model::{ChangeEvent, EdgeType};
use crate::time::{to_rfc3339, NanoTime};

#[derive(Debug, Clone, Serialize)]
pub struct CausalPathStep {
    pub change_event_id: String,
    pub resource_uid: String,
    pub timestamp: NanoTime,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CausalPath {
    pub steps: Vec<CausalPathStep>,
    pub hop_count: u32,
    pub min_confidence: f64,
    pub path_score: f64,
    pub explanation: String,
}

pub async fn causal_paths(
    graph: &dyn GraphStore,
    resource_uid: &str,
    failure_timestamp: NanoTime,
    lookback_minutes: u64,
    max_depth: u32,
    max_paths: usize,
) -> SpectreResult<Vec<CausalPath>> {
    let lookback_ns = lookback_minutes as i64 * 60 * 1_000_000_000;
    let earliest = failure_timestamp - lookback_ns;

    let Some(start) = latest_change_event_before(graph, resource_uid, failure_timestamp).await? else {
        return Ok(Vec::new());
    };

    let mut paths = Vec::new();
    let mut stack = vec![(vec![CausalPathStep {
        change_event_id: start.id.clone(),
        resource_uid: resource_uid.to_string(),
        timestamp: start.timestamp,
        confidence: 1.0,
    }], 1.0f64)];

    // Iterative DFS over TRIGGERED_BY edges, bounded by max_depth and the
    // lookback window.
    while let Some((path, min_conf)) = stack.pop() {
        let tail = path.last().unwrap();
        let outgoing = graph.edges_from(&tail.change_event_id, Some(&[EdgeType::TriggeredBy])).await?;
        let mut extended = false;

        if (path.len() as u32) < max_depth {
            for edge in &outgoing {
                let Ok(Some(cause_node)) = graph.get_node(NodeLabel::ChangeEvent, &edge.to).await else {
                    continue;
                };
                let Ok(cause) = serde_json::from_value::<ChangeEvent>(cause_node.properties) else {
                    continue;
                };
                if cause.timestamp < earliest {
                    continue;
                }
                if path.iter().any(|s| s.change_event_id == cause.id) {
                    continue; // avoid cycles
                }
                let mut next_path = path.clone();
                next_path.push(CausalPathStep {
                    change_event_id: cause.id.clone(),
                    resource_uid: cause.resource_uid.clone(),
                    timestamp: cause.timestamp,
                    confidence: edge.confidence,
                });
                stack.push((next_path, min_conf.min(edge.confidence)));
                extended = true;
            }
        }

        if !extended && path.len() > 1 {
            paths.push(build_path(path, min_conf, failure_timestamp, lookback_ns));
        }
    }

    paths.sort_by(|a, b| {
        b.path_score
            .partial_cmp(&a.path_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let a_severity = a.steps.last().map(|s| s.confidence).unwrap_or(0.0);
                let b_severity = b.steps.last().map(|s| s.confidence).unwrap_or(0.0);
                b_severity.partial_cmp(&a_severity).unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    paths.truncate(max_paths);
    Ok(paths)
}

fn build_path(steps: Vec<CausalPathStep>, min_confidence: f64, failure_timestamp: NanoTime, lookback_ns: i64) -> CausalPath {
    let hop_count = (steps.len() - 1) as u32;
    let last = steps.last().unwrap();
    let lag_ms = (failure_timestamp - last.timestamp) / 1_000_000;
    let lookback_ms = (lookback_ns / 1_000_000).max(1) as f64;
    let temporal_score = (1.0 - lag_ms as f64 / lookback_ms).max(0.0);
    let path_score = 0.4 * temporal_score + 0.4 * min_confidence + 0.2 * (1.0 / hop_count.max(1) as f64);

    let explanation = format!(
        "{} caused by {} ({} hop{}, confidence {:.2}, observed {})",
        steps.first().map(|s| s.resource_uid.as_str()).unwrap_or("?"),
        last.resource_uid,
        hop_count,
        if hop_count == 1 { "" } else { "s" },
        min_confidence,
        to_rfc3339(last.timestamp),
    );

    CausalPath { steps, hop_count, min_confidence, path_score, explanation }
}

async fn latest_change_event_before(
    graph: &dyn GraphStore,
    resource_uid: &str,
    at_or_before: NanoTime,
) -> SpectreResult<Option<ChangeEvent>> {
    let edges = graph.edges_from(resource_uid, Some(&[EdgeType::Changed])).await?;
    let mut best: Option<ChangeEvent> = None;
    for edge in edges {
        let Some(node) = graph.get_node(NodeLabel::ChangeEvent, &edge.to).await? else {
            continue;
        };
        let Ok(change) = serde_json::from_value::<ChangeEvent>(node.properties) else {
            continue;
        };
        if change.timestamp > at_or_before {
            continue;
        }
        if best.as_ref().map(|b| change.timestamp > b.timestamp).unwrap_or(true) {
            best = Some(change);
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EventType, Status};

    #[tokio::test]
    async fn single_hop_causal_path_is_scored_and_explained() {
        let graph = crate::graph::InMemoryGraphStore::new();

        let cause = ChangeEvent::new("ce-cause", "deploy-1", 1_000_000_000, EventType::Update, Status::Error);
        let effect = ChangeEvent::new("ce-effect", "pod-1", 1_200_000_000, EventType::Update, Status::Error);

        graph.upsert_node(NodeLabel::ChangeEvent, &cause.id, serde_json::to_value(&cause).unwrap()).await.unwrap();
        graph.upsert_node(NodeLabel::ChangeEvent, &effect.id, serde_json::to_value(&effect).unwrap()).await.unwrap();
        graph.upsert_edge(Edge::structural(EdgeType::Changed, "pod-1", effect.id.clone(), effect.timestamp)).await.unwrap();
        graph
            .upsert_edge(Edge::inferred(EdgeType::TriggeredBy, effect.id.clone(), cause.id.clone(), 0.8, vec![], effect.timestamp))
            .await
            .unwrap();

        let paths = causal_paths(&graph, "pod-1", 1_300_000_000, 10, 5, 20).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].hop_count, 1);
        assert!(paths[0].explanation.contains("deploy-1"));
    }
}

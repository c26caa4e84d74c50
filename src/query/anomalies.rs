/// Anomaly detection: crash loops, OOM kills, image-pull errors,
/// state-transition storms, and networking errors, derived from a
/// resource's `ChangeEvent` history over a window.
use serde::Serialize;

use crate::error::SpectreResult;
use crate::graph::{GraphStore, NodeLabel};
use crate::model::{ChangeEvent, EdgeType, Status};
use crate::time::NanoTime;

const CRASH_LOOP_THRESHOLD: usize = 3;
const STATE_TRANSITION_STORM_THRESHOLD: usize = 5;
const OOM_PREFIXES: &[&str] = &["OOMKilled", "OOM"];
const IMAGE_PULL_PREFIXES: &[&str] = &["ImagePullBackOff", "ErrImagePull"];
const NETWORK_KEYWORDS: &[&str] = &["network", "dns", "timeout", "connection refused"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnomalyKind {
    CrashLoop,
    OomKill,
    ImagePullError,
    StateTransitionStorm,
    NetworkingError,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub resource_uid: String,
    pub occurrences: u64,
    pub last_seen: NanoTime,
    pub detail: String,
}

pub async fn anomalies(
    graph: &dyn GraphStore,
    resource_uid: &str,
    start_ns: NanoTime,
    end_ns: NanoTime,
) -> SpectreResult<Vec<Anomaly>> {
    let mut changes = window_change_events(graph, resource_uid, start_ns, end_ns).await?;
    changes.sort_by_key(|c| c.timestamp);

    let mut out = Vec::new();

    let error_count = changes.iter().filter(|c| c.status == Status::Error).count();
    if error_count >= CRASH_LOOP_THRESHOLD {
        out.push(Anomaly {
            kind: AnomalyKind::CrashLoop,
            resource_uid: resource_uid.to_string(),
            occurrences: error_count as u64,
            last_seen: changes.last().map(|c| c.timestamp).unwrap_or(end_ns),
            detail: format!("{error_count} error transitions within window"),
        });
    }

    let oom_events: Vec<&ChangeEvent> = changes
        .iter()
        .filter(|c| c.container_issues.iter().any(|issue| OOM_PREFIXES.iter().any(|p| issue.starts_with(p))))
        .collect();
    if !oom_events.is_empty() {
        out.push(Anomaly {
            kind: AnomalyKind::OomKill,
            resource_uid: resource_uid.to_string(),
            occurrences: oom_events.len() as u64,
            last_seen: oom_events.last().map(|c| c.timestamp).unwrap_or(end_ns),
            detail: "container terminated by OOM killer".to_string(),
        });
    }

    let image_pull_events: Vec<&ChangeEvent> = changes
        .iter()
        .filter(|c| c.container_issues.iter().any(|issue| IMAGE_PULL_PREFIXES.iter().any(|p| issue.starts_with(p))))
        .collect();
    if !image_pull_events.is_empty() {
        out.push(Anomaly {
            kind: AnomalyKind::ImagePullError,
            resource_uid: resource_uid.to_string(),
            occurrences: image_pull_events.len() as u64,
            last_seen: image_pull_events.last().map(|c| c.timestamp).unwrap_or(end_ns),
            detail: "image pull failures detected".to_string(),
        });
    }

    let transitions = count_status_flips(&changes);
    if transitions > STATE_TRANSITION_STORM_THRESHOLD {
        out.push(Anomaly {
            kind: AnomalyKind::StateTransitionStorm,
            resource_uid: resource_uid.to_string(),
            occurrences: transitions as u64,
            last_seen: changes.last().map(|c| c.timestamp).unwrap_or(end_ns),
            detail: format!("{transitions} status flips within window"),
        });
    }

    let network_events: Vec<&ChangeEvent> = changes
        .iter()
        .filter(|c| {
            c.error_message
                .as_ref()
                .map(|m| {
                    let lower = m.to_lowercase();
                    NETWORK_KEYWORDS.iter().any(|k| lower.contains(k))
                })
                .unwrap_or(false)
        })
        .collect();
    if !network_events.is_empty() {
        out.push(Anomaly {
            kind: AnomalyKind::NetworkingError,
            resource_uid: resource_uid.to_string(),
            occurrences: network_events.len() as u64,
            last_seen: network_events.last().map(|c| c.timestamp).unwrap_or(end_ns),
            detail: "networking-related errors detected".to_string(),
        });
    }

    Ok(out)
}

fn count_status_flips(sorted_changes: &[ChangeEvent]) -> usize {
    sorted_changes.windows(2).filter(|pair| pair[0].status != pair[1].status).count()
}

async fn window_change_events(
    graph: &dyn GraphStore,
    resource_uid: &str,
    start_ns: NanoTime,
    end_ns: NanoTime,
) -> SpectreResult<Vec<ChangeEvent>> {
    let edges = graph.edges_from(resource_uid, Some(&[EdgeType::Changed])).await?;
    let mut out = Vec::new();
    for edge in edges {
        let Some(node) = graph.get_node(NodeLabel::ChangeEvent, &edge.to).await? else { continue };
        let Ok(change) = serde_json::from_value::<ChangeEvent>(node.properties) else { continue };
        if change.timestamp >= start_ns && change.timestamp <= end_ns {
            out.push(change);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EventType};

    async fn seed_change(graph: &crate::graph::InMemoryGraphStore, resource_uid: &str, id: &str, ts: i64, status: Status) {
        let mut ce = ChangeEvent::new(id, resource_uid, ts, EventType::Update, status);
        if status == Status::Error {
            ce.container_issues.push("OOMKilled: container exceeded memory limit".to_string());
        }
        graph.upsert_node(NodeLabel::ChangeEvent, id, serde_json::to_value(&ce).unwrap()).await.unwrap();
        graph.upsert_edge(Edge::structural(EdgeType::Changed, resource_uid, id, ts)).await.unwrap();
    }

    #[tokio::test]
    async fn detects_crash_loop_and_oom() {
        let graph = crate::graph::InMemoryGraphStore::new();
        for i in 0..4 {
            seed_change(&graph, "pod-1", &format!("ce{i}"), i as i64 * 10, Status::Error).await;
        }
        let found = anomalies(&graph, "pod-1", 0, 1000).await.unwrap();
        assert!(found.iter().any(|a| a.kind == AnomalyKind::CrashLoop));
        assert!(found.iter().any(|a| a.kind == AnomalyKind::OomKill));
    }

    #[tokio::test]
    async fn no_anomalies_for_healthy_resource() {
        let graph = crate::graph::InMemoryGraphStore::new();
        seed_change(&graph, "pod-2", "ce0", 0, Status::Ready).await;
        let found = anomalies(&graph, "pod-2", 0, 1000).await.unwrap();
        assert!(found.is_empty());
    }
}

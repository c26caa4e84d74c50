/// Cluster health: over a time window, each resource's *current*
/// status is the status of its latest `ChangeEvent` within the window;
/// overall health rolls up to `Critical`/`Degraded`/`Healthy`.
use std::collections::HashMap;

use serde::Serialize;

use crate::error::SpectreResult;
use crate::graph::{GraphQuery, GraphStore, NodeLabel};
use crate::model::{ChangeEvent, EdgeType, Status};
use crate::time::NanoTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Critical,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct KindSummary {
    pub kind: String,
    pub total: u64,
    pub error: u64,
    pub warning: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterIssue {
    pub resource_uid: String,
    pub kind: String,
    pub status: Status,
    pub error_duration_ns: i64,
    pub event_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterHealth {
    pub overall: OverallStatus,
    pub by_kind: Vec<KindSummary>,
    pub top_issues: Vec<ClusterIssue>,
}

pub async fn cluster_health(graph: &dyn GraphStore, start_ns: NanoTime, end_ns: NanoTime) -> SpectreResult<ClusterHealth> {
    let resources = graph.execute_query(&GraphQuery::NodesByLabel(NodeLabel::Resource)).await?;

    let mut overall = OverallStatus::Healthy;
    let mut by_kind: HashMap<String, KindSummary> = HashMap::new();
    let mut issues = Vec::new();

    for row in resources.rows {
        let Some(uid) = row.get("uid").and_then(|v| v.as_str()) else { continue };
        let kind = row.get("kind").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();

        let mut changes = change_events_in_window(graph, uid, start_ns, end_ns).await?;
        if changes.is_empty() {
            continue;
        }
        changes.sort_by_key(|c| c.timestamp);

        let latest_status = changes.last().unwrap().status;
        let error_duration_ns = error_duration(&changes, end_ns);
        let event_count = changes.len() as u64;

        let summary = by_kind.entry(kind.clone()).or_insert_with(|| KindSummary { kind: kind.clone(), ..Default::default() });
        summary.total += 1;
        match latest_status {
            Status::Error => {
                summary.error += 1;
                overall = OverallStatus::Critical;
            }
            Status::Warning => {
                summary.warning += 1;
                if overall == OverallStatus::Healthy {
                    overall = OverallStatus::Degraded;
                }
            }
            _ => {}
        }

        issues.push(ClusterIssue { resource_uid: uid.to_string(), kind, status: latest_status, error_duration_ns, event_count });
    }

    issues.sort_by(|a, b| {
        b.error_duration_ns
            .cmp(&a.error_duration_ns)
            .then_with(|| b.event_count.cmp(&a.event_count))
    });
    issues.truncate(10);

    Ok(ClusterHealth { overall, by_kind: by_kind.into_values().collect(), top_issues: issues })
}

async fn change_events_in_window(
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

/// Sum of wall-clock time spent in `Error` status within the window,
/// treating each change as holding until the next change (or window end).
fn error_duration(sorted_changes: &[ChangeEvent], window_end: NanoTime) -> i64 {
    let mut total = 0i64;
    for (i, change) in sorted_changes.iter().enumerate() {
        if change.status != Status::Error {
            continue;
        }
        let segment_end = sorted_changes.get(i + 1).map(|c| c.timestamp).unwrap_or(window_end);
        total += (segment_end - change.timestamp).max(0);
    }
    total
}

/// Blast radius: forward, depth-bounded BFS from a resource across
/// `OWNS, SELECTS, MOUNTS, SCHEDULED_ON`, optionally narrowed to a caller-
/// supplied subset of those edge types.
use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::error::SpectreResult;
use crate::graph::GraphStore;
use crate::model::EdgeType;

const DEFAULT_EDGE_TYPES: &[EdgeType] =
    &[EdgeType::Owns, EdgeType::Selects, EdgeType::Mounts, EdgeType::ScheduledOn];

#[derive(Debug, Clone, Serialize)]
pub struct BlastRadiusNode {
    pub resource_uid: String,
    pub hop_count: u32,
    pub via: EdgeType,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct BlastRadiusResult {
    pub affected: Vec<BlastRadiusNode>,
}

pub async fn blast_radius(
    graph: &dyn GraphStore,
    resource_uid: &str,
    max_depth: u32,
    edge_type_filter: Option<Vec<EdgeType>>,
) -> SpectreResult<BlastRadiusResult> {
    let allowed: Vec<EdgeType> = match edge_type_filter {
        Some(types) => types.into_iter().filter(|t| DEFAULT_EDGE_TYPES.contains(t)).collect(),
        None => DEFAULT_EDGE_TYPES.to_vec(),
    };

    let mut visited = HashSet::new();
    visited.insert(resource_uid.to_string());
    let mut queue = VecDeque::new();
    queue.push_back((resource_uid.to_string(), 0u32));

    let mut affected = Vec::new();

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let edges = graph.edges_from(&current, Some(&allowed)).await?;
        for edge in edges {
            if visited.contains(&edge.to) {
                continue;
            }
            visited.insert(edge.to.clone());
            affected.push(BlastRadiusNode { resource_uid: edge.to.clone(), hop_count: depth + 1, via: edge.edge_type });
            queue.push_back((edge.to, depth + 1));
        }
    }

    Ok(BlastRadiusResult { affected })
}

/// Extractor Framework.
///
/// A registry of pluggable per-kind extractors producing edges with
/// evidence. Extractors never mutate the graph directly; they return
/// proposed edges, which the framework filters (discarding null/invalid
/// targets) and forwards to the Ingestion Pipeline.
pub mod cr;
pub mod native;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::graph::{GraphStore, NodeLabel};
use crate::model::{Edge, EventType, Status};
use crate::time::NanoTime;

/// A parsed owner reference, as carried by `metadata.ownerReferences`.
#[derive(Debug, Clone)]
pub struct OwnerRef {
    pub uid: String,
    pub kind: String,
    pub name: String,
}

/// The event an extractor inspects: a parsed resource observation plus the
/// kind-specific fields (`spec`) extractors key off of. `spec` intentionally
/// stays a `serde_json::Value` — re-parsing it per extractor has a real
/// cost; a per-event parsed cache is a natural follow-up once a specific
/// extractor proves hot.
#[derive(Debug, Clone)]
pub struct IngestEvent {
    pub uid: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub event_type: EventType,
    pub timestamp: NanoTime,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub owner_references: Vec<OwnerRef>,
    pub spec: serde_json::Value,
    pub status: Status,
    pub error_message: Option<String>,
    pub container_issues: Vec<String>,
    pub config_changed: bool,
    pub status_changed: bool,
    pub replicas_changed: bool,
    pub impact_score: Option<f64>,
}

impl IngestEvent {
    pub fn spec_str(&self, field: &str) -> Option<String> {
        self.spec.get(field).and_then(|v| v.as_str()).map(|s| s.to_string())
    }

    pub fn spec_array_of_strings(&self, field: &str) -> Vec<String> {
        self.spec
            .get(field)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn spec_label_map(&self, field: &str) -> HashMap<String, String> {
        self.spec
            .get(field)
            .and_then(|v| v.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Read-only handle into the current graph, exposed to extractors so they
/// can resolve references without ever mutating state directly.
pub struct GraphLookup {
    store: Arc<dyn GraphStore>,
}

impl GraphLookup {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Find a resource's `uid` by `(namespace, kind, name)`. Returns `None`
    /// if unknown — extractors treat this as "resource missing", not an
    /// error.
    pub async fn find_resource_by_namespace(&self, namespace: &str, kind: &str, name: &str) -> Option<String> {
        let key = crate::time::content_hash(&[kind, namespace, name]);
        self.store
            .find_node_by_secondary_key(NodeLabel::Resource, &key)
            .await
            .ok()
            .flatten()
            .map(|rec| rec.id)
    }

    /// Find all resources of a given kind/namespace matching a label
    /// selector (used by `ServiceSelectorExtractor`).
    pub async fn find_resources_matching_labels(
        &self,
        namespace: &str,
        kind: &str,
        selector: &HashMap<String, String>,
    ) -> Vec<String> {
        use crate::graph::GraphQuery;
        let Ok(outcome) = self.store.execute_query(&GraphQuery::NodesByLabel(NodeLabel::Resource)).await else {
            return Vec::new();
        };
        outcome
            .rows
            .iter()
            .filter_map(|row| {
                let ns = row.get("namespace")?.as_str()?;
                let k = row.get("kind")?.as_str()?;
                if ns != namespace || k != kind {
                    return None;
                }
                let labels = row.get("labels")?.as_object()?;
                let matches = selector.iter().all(|(sk, sv)| {
                    labels.get(sk).and_then(|v| v.as_str()).map(|v| v == sv).unwrap_or(false)
                });
                if matches {
                    row.get("uid")?.as_str().map(str::to_string)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Find resources (any kind) within a namespace carrying a given label
    /// key/value pair — used by CR extractors like the Flux HelmRelease
    /// extractor, which manages resources across multiple kinds.
    pub async fn find_resources_with_label_value(
        &self,
        namespace: &str,
        label_key: &str,
        label_value: &str,
    ) -> Vec<String> {
        use crate::graph::GraphQuery;
        let Ok(outcome) = self.store.execute_query(&GraphQuery::NodesByLabel(NodeLabel::Resource)).await else {
            return Vec::new();
        };
        outcome
            .rows
            .iter()
            .filter_map(|row| {
                let ns = row.get("namespace")?.as_str()?;
                if ns != namespace {
                    return None;
                }
                let labels = row.get("labels")?.as_object()?;
                if labels.get(label_key).and_then(|v| v.as_str()) == Some(label_value) {
                    row.get("uid")?.as_str().map(str::to_string)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, event: &IngestEvent) -> bool;
    /// Lower runs first.
    fn priority(&self) -> i32 {
        100
    }
    async fn extract_relationships(&self, event: &IngestEvent, lookup: &GraphLookup) -> Vec<Edge>;
}

/// Holds all registered extractors, ordered by priority.
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self { extractors: Vec::new() }
    }

    /// The built-in native and custom-resource extractors.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(native::OwnerReferenceExtractor));
        registry.register(Arc::new(native::PodNodeExtractor));
        registry.register(Arc::new(native::PodPvcExtractor));
        registry.register(Arc::new(native::PodServiceAccountExtractor));
        registry.register(Arc::new(native::ServiceSelectorExtractor));
        registry.register(Arc::new(native::EventObjectExtractor));
        registry.register(Arc::new(cr::HelmReleaseExtractor));
        registry.register(Arc::new(cr::HttpRouteExtractor));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.push(extractor);
        self.extractors.sort_by_key(|e| e.priority());
    }

    /// Run every matching extractor in priority order, discarding edges with
    /// an empty endpoint.
    pub async fn run_all(&self, event: &IngestEvent, lookup: &GraphLookup) -> Vec<Edge> {
        let mut out = Vec::new();
        for extractor in &self.extractors {
            if !extractor.matches(event) {
                continue;
            }
            let edges = extractor.extract_relationships(event, lookup).await;
            for edge in edges {
                if edge.from.is_empty() || edge.to.is_empty() {
                    tracing::debug!(extractor = extractor.name(), "discarding edge with empty endpoint");
                    continue;
                }
                out.push(edge);
            }
        }
        out
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Ingestion Pipeline.
///
/// A hash-partitioned worker pool: each incoming event is routed by
/// `resource.uid` to one of `ingest.workers` bounded queues, guaranteeing
/// per-resource FIFO ordering while allowing cross-resource parallelism.
/// Workers never drop an event — a graph-store failure is
/// retried with backoff, never a discard.
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::causality::CausalityEngine;
use crate::config::IngestConfig;
use crate::error::SpectreError;
use crate::eventlog::{EventLog, RawEvent};
use crate::extractors::{ExtractorRegistry, GraphLookup, IngestEvent};
use crate::graph::{GraphStore, NodeLabel};
use crate::model::{ChangeEvent, Edge, EdgeType, ResourceIdentity};
use crate::time::now_ns;

const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 10_000;

/// Per-worker-pool ingestion metrics, plain counters rather than wired to
/// a concrete metrics backend.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    pub events_processed: AtomicU64,
    pub extractor_failures: AtomicU64,
    pub graph_store_retries: AtomicU64,
    pub graph_store_failures: AtomicU64,
}

/// Owns the worker pool and routes events by `uid` hash.
pub struct IngestionPipeline {
    senders: Vec<mpsc::Sender<IngestEvent>>,
    pub metrics: Arc<IngestMetrics>,
    cancel: CancellationToken,
}

impl IngestionPipeline {
    pub fn spawn(
        config: &IngestConfig,
        graph: Arc<dyn GraphStore>,
        event_log: Arc<dyn EventLog>,
        extractors: Arc<ExtractorRegistry>,
        causality: Arc<CausalityEngine>,
    ) -> Self {
        let metrics = Arc::new(IngestMetrics::default());
        let cancel = CancellationToken::new();
        let mut senders = Vec::with_capacity(config.workers.max(1));

        for worker_id in 0..config.workers.max(1) {
            let (tx, rx) = mpsc::channel(config.buffer_size.max(1));
            senders.push(tx);
            let worker = Worker {
                id: worker_id,
                graph: graph.clone(),
                event_log: event_log.clone(),
                extractors: extractors.clone(),
                causality: causality.clone(),
                metrics: metrics.clone(),
                cancel: cancel.clone(),
            };
            tokio::spawn(worker.run(rx));
        }

        Self { senders, metrics, cancel }
    }

    /// Routes `event` to its owning worker by hashing `event.uid`, then
    /// appends it to the Event Log so it is durable even if the worker
    /// queue briefly backs up (blocking send is the backpressure mechanism —
    /// no event is ever silently dropped).
    pub async fn submit(&self, event_log: &dyn EventLog, raw: RawEvent, event: IngestEvent) -> Result<(), SpectreError> {
        event_log.append_event(raw).await?;
        let worker = self.partition(&event.uid);
        self.senders[worker]
            .send(event)
            .await
            .map_err(|_| SpectreError::Cancelled("ingestion pipeline shut down".into()))
    }

    fn partition(&self, uid: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        uid.hash(&mut hasher);
        (hasher.finish() as usize) % self.senders.len().max(1)
    }

    /// Cooperative shutdown: stop accepting new routing and let in-flight
    /// workers drain within the shutdown timeout managed by the caller.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

struct Worker {
    id: usize,
    graph: Arc<dyn GraphStore>,
    event_log: Arc<dyn EventLog>,
    extractors: Arc<ExtractorRegistry>,
    causality: Arc<CausalityEngine>,
    metrics: Arc<IngestMetrics>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<IngestEvent>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    while let Ok(event) = rx.try_recv() {
                        self.process(event).await;
                    }
                    break;
                }
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => self.process(event).await,
                        None => break,
                    }
                }
            }
        }
        tracing::debug!(worker = self.id, "ingestion worker drained and exiting");
    }

    async fn process(&self, event: IngestEvent) {
        let now = now_ns();

        // Step 1: upsert ResourceIdentity, append ChangeEvent + CHANGED edge.
        let previous_change_event = self.previous_change_event(&event.uid).await;

        if let Err(e) = self.upsert_with_retry(&event).await {
            self.metrics.graph_store_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(uid = %event.uid, error = %e, "ingestion: resource upsert failed after retries");
            return;
        }

        let mut change_event = ChangeEvent::new(
            format!("{}-{}", event.uid, event.timestamp),
            event.uid.clone(),
            event.timestamp,
            event.event_type,
            event.status,
        );
        change_event.error_message = event.error_message.clone();
        change_event.container_issues = event.container_issues.clone();
        change_event.config_changed = event.config_changed;
        change_event.status_changed = event.status_changed;
        change_event.replicas_changed = event.replicas_changed;
        let default_impact = change_event.impact_score;
        let change_event = change_event.with_impact_score(event.impact_score.unwrap_or(default_impact));

        if let Err(e) = self.upsert_change_event(&change_event).await {
            self.metrics.graph_store_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(uid = %event.uid, error = %e, "ingestion: change event upsert failed");
            return;
        }

        // Step 2: run matching extractors in priority order.
        let lookup = GraphLookup::new(self.graph.clone());
        let edges = self.extractors.run_all(&event, &lookup).await;
        for edge in edges {
            if let Err(e) = self.upsert_edge_with_retry(edge.clone()).await {
                self.metrics.extractor_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(edge_type = ?edge.edge_type, error = %e, "ingestion: extractor edge upsert failed, discarding");
            }
        }

        // Step 3: link to the previous ChangeEvent of the same resource. A
        // deterministic temporal fact, but classified inferred rather than
        // structural since PRECEDED_BY is revalidated like other inferred
        // edges rather than exempted from decay.
        if let Some(prev_id) = previous_change_event {
            let precede = Edge::inferred(
                EdgeType::PrecededBy,
                change_event.id.clone(),
                prev_id,
                1.0,
                vec![crate::model::Evidence::temporal(0, 0, 1.0)],
                now,
            );
            if let Err(e) = self.upsert_edge_with_retry(precede).await {
                tracing::warn!(error = %e, "ingestion: PRECEDED_BY edge upsert failed");
            }
        }

        // Step 4: hand off to causality inference.
        self.causality.infer(&change_event).await;

        self.metrics.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    async fn previous_change_event(&self, resource_uid: &str) -> Option<String> {
        let edges = self.graph.edges_from(resource_uid, Some(&[EdgeType::Changed])).await.ok()?;
        edges.into_iter().max_by_key(|e| e.last_validated).map(|e| e.to)
    }

    async fn upsert_with_retry(&self, event: &IngestEvent) -> Result<(), SpectreError> {
        let mut identity = ResourceIdentity::new(
            event.uid.clone(),
            String::new(),
            String::new(),
            event.kind.clone(),
            event.namespace.clone(),
            event.name.clone(),
            event.timestamp,
        );
        identity.observe_with_annotations(event.timestamp, &event.labels, &event.annotations);
        if matches!(event.event_type, crate::model::EventType::Delete) {
            identity.mark_deleted(event.timestamp);
        }
        let mut props = serde_json::to_value(&identity).map_err(SpectreError::from)?;
        if let Some(map) = props.as_object_mut() {
            map.insert("secondary_key".to_string(), serde_json::Value::String(identity.secondary_key()));
        }
        self.with_retry(|| {
            let graph = self.graph.clone();
            let props = props.clone();
            let uid = event.uid.clone();
            async move { graph.upsert_node(NodeLabel::Resource, &uid, props).await }
        })
        .await
    }

    async fn upsert_change_event(&self, change_event: &ChangeEvent) -> Result<(), SpectreError> {
        let props = serde_json::to_value(change_event).map_err(SpectreError::from)?;
        self.with_retry(|| {
            let graph = self.graph.clone();
            let props = props.clone();
            let id = change_event.id.clone();
            async move { graph.upsert_node(NodeLabel::ChangeEvent, &id, props).await }
        })
        .await?;

        let edge = Edge::structural(
            EdgeType::Changed,
            change_event.resource_uid.clone(),
            change_event.id.clone(),
            change_event.timestamp,
        );
        self.upsert_edge_with_retry(edge).await
    }

    async fn upsert_edge_with_retry(&self, edge: Edge) -> Result<(), SpectreError> {
        self.with_retry(|| {
            let graph = self.graph.clone();
            let edge = edge.clone();
            async move { graph.upsert_edge(edge).await }
        })
        .await
    }

    /// Exponential backoff, 100ms -> 10s, capped at 5 attempts.
    async fn with_retry<F, Fut>(&self, mut op: F) -> Result<(), SpectreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), SpectreError>>,
    {
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        for attempt in 0..MAX_RETRIES {
            match op().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt + 1 < MAX_RETRIES => {
                    self.metrics.graph_store_retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("loop always returns within MAX_RETRIES iterations")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventlog::InMemoryEventLog;
    use crate::graph::InMemoryGraphStore;
    use crate::model::{EventType, Status};
    use std::collections::HashMap;

    fn sample_event(uid: &str, ts: i64) -> IngestEvent {
        IngestEvent {
            uid: uid.to_string(),
            kind: "Pod".to_string(),
            namespace: "default".to_string(),
            name: "web-1".to_string(),
            event_type: EventType::Update,
            timestamp: ts,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            owner_references: Vec::new(),
            spec: serde_json::json!({}),
            status: Status::Ready,
            error_message: None,
            container_issues: Vec::new(),
            config_changed: false,
            status_changed: false,
            replicas_changed: false,
            impact_score: None,
        }
    }

    #[tokio::test]
    async fn partitions_by_uid_hash_consistently() {
        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let event_log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
        let extractors = Arc::new(ExtractorRegistry::with_defaults());
        let causality = Arc::new(CausalityEngine::new(graph.clone(), Default::default()));
        let pipeline = IngestionPipeline::spawn(
            &IngestConfig { workers: 4, buffer_size: 8 },
            graph,
            event_log,
            extractors,
            causality,
        );
        let a = pipeline.partition("same-uid");
        let b = pipeline.partition("same-uid");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn pipeline_processes_submitted_event_end_to_end() {
        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let event_log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
        let extractors = Arc::new(ExtractorRegistry::with_defaults());
        let causality = Arc::new(CausalityEngine::new(graph.clone(), Default::default()));
        let pipeline = IngestionPipeline::spawn(
            &IngestConfig { workers: 1, buffer_size: 8 },
            graph.clone(),
            event_log.clone(),
            extractors,
            causality,
        );

        let event = sample_event("pod-1", 1_000_000_000);
        let raw = RawEvent {
            id: "pod-1-1".to_string(),
            namespace: "default".to_string(),
            kind: "Pod".to_string(),
            timestamp: event.timestamp,
            payload: serde_json::json!({}),
        };
        pipeline.submit(event_log.as_ref(), raw, event).await.unwrap();

        // Give the worker a beat to process.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pipeline.metrics.events_processed.load(Ordering::Relaxed), 1);
        assert!(graph.get_node(NodeLabel::Resource, "pod-1").await.unwrap().is_some());
    }
}

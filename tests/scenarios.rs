//! End-to-end scenarios exercising the full ingest -> extract -> infer ->
//! query path through the public API, rather than any single module.
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use spectre_core::analytics::metrics::{classify, DayType, MetricClass, Sample, TimeSlot};
use spectre_core::analytics::TemplateMiner;
use spectre_core::causality::CausalityEngine;
use spectre_core::config::{CausalityConfig, IngestConfig, RevalidationConfig};
use spectre_core::eventlog::{EventLog, InMemoryEventLog, RawEvent};
use spectre_core::extractors::{ExtractorRegistry, IngestEvent, OwnerRef};
use spectre_core::graph::{GraphStore, InMemoryGraphStore};
use spectre_core::ingestion::IngestionPipeline;
use spectre_core::model::{EdgeType, EventType, Status, ValidationState};
use spectre_core::query::QueryLayer;
use spectre_core::revalidation::RevalidationEngine;

fn bare_event(uid: &str, kind: &str, namespace: &str, name: &str, event_type: EventType, ts: i64, status: Status) -> IngestEvent {
    IngestEvent {
        uid: uid.to_string(),
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
        event_type,
        timestamp: ts,
        labels: HashMap::new(),
        annotations: HashMap::new(),
        owner_references: Vec::new(),
        spec: serde_json::json!({}),
        status,
        error_message: None,
        container_issues: Vec::new(),
        config_changed: false,
        status_changed: false,
        replicas_changed: false,
        impact_score: None,
    }
}

struct Harness {
    pipeline: IngestionPipeline,
    graph: Arc<dyn GraphStore>,
    event_log: Arc<dyn EventLog>,
    query: QueryLayer,
}

impl Harness {
    async fn new(workers: usize) -> Self {
        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        graph.connect().await.unwrap();
        graph.initialize_schema().await.unwrap();
        let event_log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
        let extractors = Arc::new(ExtractorRegistry::with_defaults());
        let causality = Arc::new(CausalityEngine::new(graph.clone(), CausalityConfig::default()));
        let pipeline = IngestionPipeline::spawn(
            &IngestConfig { workers, buffer_size: 64 },
            graph.clone(),
            event_log.clone(),
            extractors,
            causality,
        );
        let query = QueryLayer::new(graph.clone());
        Self { pipeline, graph, event_log, query }
    }

    async fn ingest(&self, event: IngestEvent) {
        let raw = RawEvent {
            id: format!("raw-{}-{}", event.uid, event.timestamp),
            namespace: event.namespace.clone(),
            kind: event.kind.clone(),
            timestamp: event.timestamp,
            payload: serde_json::json!({}),
        };
        let target = self.pipeline.metrics.events_processed.load(Ordering::Relaxed) + 1;
        self.pipeline.submit(self.event_log.as_ref(), raw, event).await.unwrap();
        while self.pipeline.metrics.events_processed.load(Ordering::Relaxed) < target {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

const SECOND: i64 = 1_000_000_000;
const MINUTE: i64 = 60 * SECOND;

/// A pod stuck crash-looping for ten minutes should read as cluster-critical
/// and surface a crash-loop anomaly with every error transition counted.
#[tokio::test]
async fn crash_loop_pod_is_critical_and_flagged() {
    let h = Harness::new(1).await;

    h.ingest(bare_event("pod-crash", "Pod", "default", "web-1", EventType::Create, 0, Status::Ready)).await;

    for i in 0..15 {
        let mut event = bare_event("pod-crash", "Pod", "default", "web-1", EventType::Update, SECOND + i * 40 * SECOND, Status::Error);
        event.container_issues.push("CrashLoopBackOff".to_string());
        h.ingest(event).await;
    }

    let window_end = 10 * MINUTE;
    let health = h.query.cluster_health(0, window_end).await.unwrap();
    assert_eq!(health.overall, spectre_core::query::cluster_health::OverallStatus::Critical);
    let issue = health.top_issues.iter().find(|i| i.resource_uid == "pod-crash").expect("pod-crash should be a top issue");
    assert_eq!(issue.error_duration_ns, window_end - SECOND);

    let anomalies = h.query.anomalies("pod-crash", 0, window_end).await.unwrap();
    let crash_loop = anomalies
        .iter()
        .find(|a| a.kind == spectre_core::query::anomalies::AnomalyKind::CrashLoop)
        .expect("crash loop anomaly expected");
    assert_eq!(crash_loop.occurrences, 15);
}

/// A deployment rollout that breaks a pod two ownership hops downstream
/// should leave a reconstructable causal path of three change events.
#[tokio::test]
async fn deployment_rollout_causes_pod_crash() {
    let h = Harness::new(1).await;

    let mut deploy_event = bare_event("deploy-1", "Deployment", "default", "checkout", EventType::Update, 0, Status::Warning);
    deploy_event.config_changed = true;
    deploy_event.impact_score = Some(0.9);
    h.ingest(deploy_event).await;

    let mut rs_event = bare_event("rs-1", "ReplicaSet", "default", "checkout-7d6", EventType::Create, 5 * SECOND, Status::Ready);
    rs_event.owner_references.push(OwnerRef { uid: "deploy-1".to_string(), kind: "Deployment".to_string(), name: "checkout".to_string() });
    h.ingest(rs_event).await;

    let mut pod_event = bare_event("pod-1", "Pod", "default", "checkout-7d6-xk2", EventType::Update, 12 * SECOND, Status::Error);
    pod_event.owner_references.push(OwnerRef { uid: "rs-1".to_string(), kind: "ReplicaSet".to_string(), name: "checkout-7d6".to_string() });
    pod_event.container_issues.push("CrashLoopBackOff".to_string());
    h.ingest(pod_event).await;

    let paths = h.query.causal_paths("pod-1", 13 * SECOND, 10, 5, 20).await.unwrap();
    assert!(!paths.is_empty(), "expected at least one causal path back from the crashing pod");

    let chained = paths
        .iter()
        .find(|p| p.hop_count == 2 && p.steps.last().map(|s| s.resource_uid.as_str()) == Some("deploy-1"))
        .expect("expected a 3-step path from pod through the replica set to the deployment");
    assert!(chained.min_confidence >= 0.6, "chained path confidence {} below 0.6", chained.min_confidence);
    assert_eq!(chained.steps[0].resource_uid, "pod-1");
    assert_eq!(chained.steps[1].resource_uid, "rs-1");
    assert_eq!(chained.steps[2].resource_uid, "deploy-1");
}

// Secret-rotation edge preservation (scenario 3) has no literal counterpart
// in this crate: the HTTP query surface carries no auth/token layer to
// rotate. `integrations::tests::reload_only_touches_the_named_integration`
// covers the adjacent property this scenario is really after — that a
// config change to one integration never perturbs another's running state.

/// A HelmRelease's MANAGES edge to a labeled Deployment should invalidate
/// once the Deployment is deleted and revalidation sweeps it.
#[tokio::test]
async fn helm_deletion_invalidates_manages_edge() {
    let h = Harness::new(1).await;

    let mut deploy_event = bare_event("deploy-helm", "Deployment", "default", "checkout", EventType::Create, 0, Status::Ready);
    deploy_event.labels.insert("helm.toolkit.fluxcd.io/name".to_string(), "checkout-release".to_string());
    h.ingest(deploy_event).await;

    let release_event = bare_event("hr-1", "HelmRelease", "default", "checkout-release", EventType::Create, SECOND, Status::Ready);
    h.ingest(release_event).await;

    let managed = h.graph.get_edge(EdgeType::Manages, "hr-1", "deploy-helm").await.unwrap();
    let managed = managed.expect("HelmRelease should manage the labeled Deployment");
    assert!(managed.confidence >= 0.5);
    assert_eq!(managed.validation_state, ValidationState::Pending);

    let delete_event = bare_event("deploy-helm", "Deployment", "default", "checkout", EventType::Delete, 2 * SECOND, Status::Terminating);
    h.ingest(delete_event).await;

    let revalidation = RevalidationEngine::new(h.graph.clone(), RevalidationConfig { max_age_secs: 0, ..RevalidationConfig::default() });
    revalidation.run_once().await.unwrap();

    let managed = h.graph.get_edge(EdgeType::Manages, "hr-1", "deploy-helm").await.unwrap().unwrap();
    assert_eq!(managed.validation_state, ValidationState::Invalid);
}

/// A previously-unseen log template should be flagged novel exactly once,
/// against a window otherwise dominated by one repeating pattern.
#[tokio::test]
async fn template_mining_flags_a_single_novel_pattern() {
    let mut miner = TemplateMiner::new();

    for i in 0..100 {
        let message = format!("connected to 10.0.0.{} port 443", i % 256);
        miner.observe("default", &message, i as i64);
    }
    miner.roll_window();

    let mut novel_count = 0;
    for i in 0..100 {
        let message = format!("connected to 10.0.0.{} port 443", i % 256);
        let (_, novel) = miner.observe("default", &message, 1000 + i as i64);
        if novel {
            novel_count += 1;
        }
    }
    for i in 0..3 {
        let (_, novel) = miner.observe("default", "panic: out of memory", 2000 + i as i64);
        if novel {
            novel_count += 1;
        }
    }

    assert_eq!(novel_count, 1, "only the out-of-memory panic is new in the second window");
}

/// A metric with zero historical variance can't be z-scored and must not
/// manufacture an anomaly just because a fresh sample matches the mean.
#[tokio::test]
async fn flat_baseline_metric_never_anomalizes() {
    let slot = TimeSlot { day_type: DayType::Weekday, hour_of_day: 9 };
    let samples: Vec<Sample> = (0..10).map(|_| Sample { slot, value: 100.0 }).collect();

    let anomaly = classify("request_latency_ms", 100.0, &samples, slot, MetricClass::General);
    assert!(anomaly.is_none());
}

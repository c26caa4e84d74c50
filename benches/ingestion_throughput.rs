use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use spectre_core::causality::CausalityEngine;
use spectre_core::config::{CausalityConfig, IngestConfig};
use spectre_core::eventlog::{EventLog, InMemoryEventLog, RawEvent};
use spectre_core::extractors::{ExtractorRegistry, IngestEvent};
use spectre_core::graph::{GraphStore, InMemoryGraphStore};
use spectre_core::ingestion::IngestionPipeline;
use spectre_core::model::{EventType, Status};

fn sample_event(uid: &str, ts: i64) -> (RawEvent, IngestEvent) {
    let raw = RawEvent {
        id: format!("raw-{uid}-{ts}"),
        namespace: "default".to_string(),
        kind: "Pod".to_string(),
        timestamp: ts,
        payload: serde_json::json!({}),
    };
    let event = IngestEvent {
        uid: uid.to_string(),
        kind: "Pod".to_string(),
        namespace: "default".to_string(),
        name: format!("web-{uid}"),
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
    };
    (raw, event)
}

/// Submits `count` distinct-resource events through a freshly spawned
/// pipeline and waits for every worker to finish processing, exercising the
/// hash-partitioned worker pool end to end.
async fn submit_and_drain(pipeline: &IngestionPipeline, event_log: &Arc<dyn EventLog>, count: usize) {
    use std::sync::atomic::Ordering;

    let base_ts: i64 = 1_700_000_000_000_000_000;
    for i in 0..count {
        let uid = format!("bench-uid-{i}");
        let (raw, event) = sample_event(&uid, base_ts + i as i64 * 1_000_000);
        pipeline.submit(event_log.as_ref(), raw, event).await.unwrap();
    }

    // Workers process asynchronously relative to `submit`; poll the shared
    // counter until every submitted event has been accounted for.
    while pipeline.metrics.events_processed.load(Ordering::Relaxed) < count as u64 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

fn bench_ingestion_by_worker_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingestion_by_worker_count");

    for workers in [1usize, 4, 8] {
        group.throughput(Throughput::Elements(200));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.to_async(Runtime::new().unwrap()).iter(|| async move {
                let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
                graph.connect().await.unwrap();
                graph.initialize_schema().await.unwrap();
                let event_log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
                let extractors = Arc::new(ExtractorRegistry::with_defaults());
                let causality = Arc::new(CausalityEngine::new(graph.clone(), CausalityConfig::default()));
                let pipeline = IngestionPipeline::spawn(
                    &IngestConfig { workers, buffer_size: 256 },
                    graph,
                    event_log.clone(),
                    extractors,
                    causality,
                );

                black_box(submit_and_drain(&pipeline, &event_log, 200).await);
                pipeline.shutdown();
            })
        });
    }
    group.finish();
}

fn configure_criterion() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(3))
        .sample_size(20)
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = bench_ingestion_by_worker_count
}

criterion_main!(benches);

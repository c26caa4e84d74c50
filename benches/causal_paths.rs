use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use spectre_core::graph::{GraphStore, InMemoryGraphStore};
use spectre_core::model::{ChangeEvent, Edge, EdgeType, EventType, Evidence, ResourceIdentity, Status};
use spectre_core::query::QueryLayer;

/// Builds a chain of `depth` resources, each owning the next, with a
/// `ChangeEvent` per resource and a `TRIGGERED_BY` edge linking each change
/// to its predecessor — the shape `causal_paths` walks backward over.
async fn seed_chain(graph: &Arc<dyn GraphStore>, depth: usize) -> String {
    let base_ts: i64 = 1_700_000_000_000_000_000;
    let mut previous_change: Option<String> = None;
    let mut last_uid = String::new();

    for i in 0..depth {
        let uid = format!("uid-{i}");
        let identity = ResourceIdentity::new(&uid, "apps", "v1", "Deployment", "default", format!("svc-{i}"), base_ts);
        graph.upsert_node(spectre_core::graph::NodeLabel::Resource, &uid, serde_json::to_value(&identity).unwrap()).await.unwrap();

        let change_id = format!("change-{i}");
        let change = ChangeEvent::new(&change_id, &uid, base_ts + i as i64 * 1_000_000_000, EventType::Update, Status::Warning);
        graph
            .upsert_node(spectre_core::graph::NodeLabel::ChangeEvent, &change_id, serde_json::to_value(&change).unwrap())
            .await
            .unwrap();
        graph.upsert_edge(Edge::structural(EdgeType::Changed, &uid, &change_id, change.timestamp)).await.unwrap();

        if let Some(prev) = &previous_change {
            let evidence = vec![Evidence::temporal(1_000, 600_000, 0.8), Evidence::structural(0.6)];
            graph
                .upsert_edge(Edge::inferred(EdgeType::TriggeredBy, &change_id, prev, 0.75, evidence, change.timestamp))
                .await
                .unwrap();
        }

        previous_change = Some(change_id);
        last_uid = uid;
    }

    last_uid
}

fn bench_causal_paths_by_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("causal_paths_by_chain_depth");

    for depth in [2usize, 5, 10] {
        let rt = Runtime::new().unwrap();
        let (query, tail_uid, failure_ts) = rt.block_on(async move {
            let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
            graph.connect().await.unwrap();
            graph.initialize_schema().await.unwrap();
            let tail_uid = seed_chain(&graph, depth).await;
            let query = QueryLayer::new(graph.clone());
            (query, tail_uid, 1_700_000_000_000_000_000i64 + depth as i64 * 1_000_000_000)
        });

        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &_depth| {
            b.to_async(Runtime::new().unwrap()).iter(|| async {
                black_box(query.causal_paths(&tail_uid, failure_ts, 60, 10, 20).await.unwrap())
            })
        });
    }
    group.finish();
}

fn configure_criterion() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(3))
        .sample_size(50)
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = bench_causal_paths_by_depth
}

criterion_main!(benches);

/// Illustrative Grafana connector: syncs dashboards/alerts into the
/// Grafana-domain nodes. The wire protocol is external and out of
/// scope; this integration's job starts once a dashboard/alert has
/// already been decoded off the wire and handed to it as a payload.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::SpectreResult;
use crate::graph::{GraphStore, NodeLabel};
use crate::model::grafana::{AlertPayload, DashboardPayload};
use crate::model::{Alert, Dashboard, Edge, EdgeType, Metric, Panel, PromQuery, Service, Variable};
use crate::time::NanoTime;

use super::{HealthStatus, Integration, ToolDescriptor, ToolRegistry};

enum SyncItem {
    Dashboard(DashboardPayload, NanoTime),
    Alert(AlertPayload, NanoTime),
}

/// Upserts a dashboard's full `Dashboard -Contains-> Panel -Has-> Query
/// -Uses-> Metric -Tracks-> Service` subtree, plus `Dashboard -HasVariable->
/// Variable`. `Service` is inferred from each query's label selector and
/// only materialized when inference succeeds.
async fn materialize_dashboard(graph: &dyn GraphStore, payload: &DashboardPayload, at: NanoTime) -> SpectreResult<()> {
    let dashboard = Dashboard::new(payload.uid.clone(), payload.title.clone(), payload.tags.clone());
    graph
        .upsert_node(NodeLabel::Dashboard, &dashboard.uid, serde_json::to_value(&dashboard)?)
        .await?;

    for panel in &payload.panels {
        let panel_id = format!("{}/panel/{}", dashboard.uid, panel.id);
        let p = Panel { id: panel_id.clone(), dashboard_uid: dashboard.uid.clone(), title: panel.title.clone() };
        graph.upsert_node(NodeLabel::Panel, &p.id, serde_json::to_value(&p)?).await?;
        graph
            .upsert_edge(Edge::structural(EdgeType::Contains, dashboard.uid.clone(), p.id.clone(), at))
            .await?;

        for query in &panel.queries {
            let query_id = format!("{panel_id}/query/{}", query.id);
            let q = PromQuery { id: query_id.clone(), panel_id: panel_id.clone(), expr: query.expr.clone() };
            graph.upsert_node(NodeLabel::PromQuery, &q.id, serde_json::to_value(&q)?).await?;
            graph.upsert_edge(Edge::structural(EdgeType::Has, panel_id.clone(), q.id.clone(), at)).await?;

            let metric = Metric { name: query.metric_name.clone() };
            graph
                .upsert_node(NodeLabel::Metric, &metric.name, serde_json::to_value(&metric)?)
                .await?;
            graph
                .upsert_edge(Edge::structural(EdgeType::Uses, q.id.clone(), metric.name.clone(), at))
                .await?;

            if let Some(service_name) = Service::name_from_labels(&query.labels) {
                let cluster = query.labels.get("cluster").cloned().unwrap_or_default();
                let namespace = query.labels.get("namespace").cloned().unwrap_or_default();
                let service = Service { name: service_name, cluster, namespace };
                let service_id = format!("{}/{}/{}", service.cluster, service.namespace, service.name);
                graph
                    .upsert_node(NodeLabel::Service, &service_id, serde_json::to_value(&service)?)
                    .await?;
                graph
                    .upsert_edge(Edge::structural(EdgeType::Tracks, metric.name.clone(), service_id, at))
                    .await?;
            }
        }
    }

    for name in &payload.variable_names {
        let var_id = format!("{}/var/{name}", dashboard.uid);
        let v = Variable { id: var_id.clone(), dashboard_uid: dashboard.uid.clone(), name: name.clone() };
        graph.upsert_node(NodeLabel::Variable, &v.id, serde_json::to_value(&v)?).await?;
        graph
            .upsert_edge(Edge::structural(EdgeType::HasVariable, dashboard.uid.clone(), v.id, at))
            .await?;
    }

    Ok(())
}

/// Upserts an alert rule and its `Alert -Monitors-> Metric` edge.
async fn materialize_alert(graph: &dyn GraphStore, payload: &AlertPayload, at: NanoTime) -> SpectreResult<()> {
    let alert = Alert { id: payload.id.clone(), name: payload.name.clone(), metric_name: payload.metric_name.clone() };
    graph.upsert_node(NodeLabel::Alert, &alert.id, serde_json::to_value(&alert)?).await?;

    let metric = Metric { name: alert.metric_name.clone() };
    graph
        .upsert_node(NodeLabel::Metric, &metric.name, serde_json::to_value(&metric)?)
        .await?;
    graph
        .upsert_edge(Edge::structural(EdgeType::Monitors, alert.id.clone(), metric.name, at))
        .await?;

    Ok(())
}

pub struct GrafanaIntegration {
    name: String,
    running: AtomicBool,
    graph: Arc<dyn GraphStore>,
    pending: Arc<Mutex<Vec<SyncItem>>>,
}

impl GrafanaIntegration {
    pub fn new(name: impl Into<String>, graph: Arc<dyn GraphStore>) -> Self {
        Self { name: name.into(), running: AtomicBool::new(false), graph, pending: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Queue a decoded dashboard for materialization on the next sync tick.
    pub fn enqueue_dashboard(&self, payload: DashboardPayload, at: NanoTime) {
        self.pending.lock().push(SyncItem::Dashboard(payload, at));
    }

    /// Queue a decoded alert rule for materialization on the next sync tick.
    pub fn enqueue_alert(&self, payload: AlertPayload, at: NanoTime) {
        self.pending.lock().push(SyncItem::Alert(payload, at));
    }

    async fn flush(graph: &Arc<dyn GraphStore>, pending: &Arc<Mutex<Vec<SyncItem>>>) {
        let items = std::mem::take(&mut *pending.lock());
        for item in items {
            let result = match &item {
                SyncItem::Dashboard(payload, at) => materialize_dashboard(graph.as_ref(), payload, *at).await,
                SyncItem::Alert(payload, at) => materialize_alert(graph.as_ref(), payload, *at).await,
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "grafana sync: materialization failed");
            }
        }
    }
}

#[async_trait]
impl Integration for GrafanaIntegration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, cancel: CancellationToken) -> SpectreResult<()> {
        self.running.store(true, Ordering::SeqCst);
        let graph = self.graph.clone();
        let pending = self.pending.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        Self::flush(&graph, &pending).await;
                        break;
                    }
                    _ = ticker.tick() => {
                        tracing::debug!("grafana integration: dashboard/alert sync tick");
                        Self::flush(&graph, &pending).await;
                    }
                }
            }
        });
        Ok(())
    }

    async fn stop(&self) -> SpectreResult<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn health(&self) -> HealthStatus {
        if self.running.load(Ordering::SeqCst) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Stopped
        }
    }

    fn register_tools(&self, registry: &ToolRegistry) {
        registry.register(ToolDescriptor {
            name: format!("{}.list_dashboards", self.name),
            description: "List synced Grafana dashboards".to_string(),
            owner_integration: self.name.clone(),
        });
        registry.register(ToolDescriptor {
            name: format!("{}.list_alerts", self.name),
            description: "List synced Grafana alert rules".to_string(),
            owner_integration: self.name.clone(),
        });
    }
}

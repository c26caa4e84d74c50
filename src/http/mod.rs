/// HTTP Query Surface.
///
/// An `axum` router wrapping the Query Layer and Event Log for read-only
/// cluster introspection. Responses are JSON; gzip is negotiated by
/// `tower-http`'s `CompressionLayer`; a `Server-Timing` header reports
/// resource-query, event-query, and total durations per request.
mod timing;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::SpectreError;
use crate::eventlog::EventLog;
use crate::graph::GraphStore;
use crate::query::QueryLayer;
use crate::time::{normalize_unix_to_ns, NanoTime};

use timing::ServerTimingLayer;

#[derive(Clone)]
pub struct AppState {
    pub query: Arc<QueryLayer>,
    pub graph: Arc<dyn GraphStore>,
    pub event_log: Arc<dyn EventLog>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/timeline", get(timeline))
        .route("/v1/metadata", get(metadata))
        .route("/v1/causal_paths", get(causal_paths))
        .route("/v1/anomalies", get(anomalies))
        .route("/v1/cluster_health", get(cluster_health))
        .layer(ServerTimingLayer)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The `{"error": CODE, "message": ...}` error response shape.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for SpectreError {
    fn into_response(self) -> Response {
        let status = match &self {
            SpectreError::Validation(_) => StatusCode::BAD_REQUEST,
            SpectreError::NotFound(_) => StatusCode::NOT_FOUND,
            SpectreError::Cancelled(_) => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody { error: self.code(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}

fn parse_timestamp(raw: &str) -> Result<NanoTime, SpectreError> {
    raw.parse::<i64>()
        .map(normalize_unix_to_ns)
        .map_err(|_| SpectreError::Validation(format!("invalid timestamp: {raw}")))
}

#[derive(Deserialize)]
struct TimelineParams {
    start: String,
    end: String,
    /// Repeatable `?kind=Pod&kind=Deployment`.
    #[serde(default)]
    kind: Vec<String>,
    /// Comma-separated alternative to repeated `kind`.
    kinds: Option<String>,
    /// Repeatable `?namespace=a&namespace=b`.
    #[serde(default)]
    namespace: Vec<String>,
    /// Comma-separated alternative to repeated `namespace`.
    namespaces: Option<String>,
}

/// Merges a repeated query param with its comma-separated sibling into one
/// filter set; empty means "no filter" to the callers that consume this.
fn merge_filter(repeated: Vec<String>, csv: Option<String>) -> Vec<String> {
    let mut out = repeated;
    if let Some(csv) = csv {
        out.extend(csv.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string));
    }
    out
}

#[derive(Serialize)]
struct TimelineResponse {
    resources: Vec<serde_json::Value>,
    events: Vec<serde_json::Value>,
}

/// Executes the resource and event sub-queries concurrently, sharing the
/// parsed time window across both so each underlying data source is
/// consulted once per request.
async fn timeline(State(state): State<AppState>, Query(params): Query<TimelineParams>) -> Result<Response, SpectreError> {
    let resource_start = Instant::now();
    let start_ns = parse_timestamp(&params.start)?;
    let end_ns = parse_timestamp(&params.end)?;

    let namespaces = merge_filter(params.namespace, params.namespaces);
    let kinds = merge_filter(params.kind, params.kinds);

    let resources_fut = state.graph.execute_query(&crate::graph::GraphQuery::NodesByLabel(crate::graph::NodeLabel::Resource));
    let events_fut = state.event_log.range_scan(start_ns, end_ns, &namespaces, &kinds);

    let (resources_result, events_result) = tokio::join!(resources_fut, events_fut);
    let resource_elapsed = resource_start.elapsed();

    let event_start = Instant::now();
    let resources = resources_result?.rows;
    let events = events_result?
        .into_iter()
        .map(|e| serde_json::to_value(&e).unwrap_or(serde_json::Value::Null))
        .collect();
    let event_elapsed = event_start.elapsed();

    let body = TimelineResponse { resources, events };
    let mut response = Json(body).into_response();
    timing::record(&mut response, "resource-query", resource_elapsed);
    timing::record(&mut response, "event-query", event_elapsed);
    Ok(response)
}

#[derive(Deserialize)]
struct MetadataParams {
    start: String,
    end: String,
}

async fn metadata(State(state): State<AppState>, Query(params): Query<MetadataParams>) -> Result<Json<serde_json::Value>, SpectreError> {
    let start_ns = parse_timestamp(&params.start)?;
    let end_ns = parse_timestamp(&params.end)?;
    let meta = state.event_log.metadata(start_ns, end_ns).await?;
    Ok(Json(serde_json::json!({ "namespaces": meta.namespaces, "kinds": meta.kinds })))
}

#[derive(Deserialize)]
struct CausalPathParams {
    resource_uid: String,
    failure_timestamp: String,
    #[serde(default = "default_lookback_minutes")]
    lookback_minutes: u64,
    #[serde(default = "default_max_depth")]
    max_depth: u32,
    #[serde(default = "default_max_paths")]
    max_paths: usize,
}

fn default_lookback_minutes() -> u64 {
    10
}
fn default_max_depth() -> u32 {
    5
}
fn default_max_paths() -> usize {
    20
}

async fn causal_paths(
    State(state): State<AppState>,
    Query(params): Query<CausalPathParams>,
) -> Result<Json<serde_json::Value>, SpectreError> {
    let failure_ts = parse_timestamp(&params.failure_timestamp)?;
    let paths = state
        .query
        .causal_paths(&params.resource_uid, failure_ts, params.lookback_minutes, params.max_depth, params.max_paths)
        .await?;
    Ok(Json(serde_json::to_value(paths).map_err(SpectreError::from)?))
}

#[derive(Deserialize)]
struct AnomaliesParams {
    resource_uid: String,
    start: String,
    end: String,
}

async fn anomalies(
    State(state): State<AppState>,
    Query(params): Query<AnomaliesParams>,
) -> Result<Json<serde_json::Value>, SpectreError> {
    let start_ns = parse_timestamp(&params.start)?;
    let end_ns = parse_timestamp(&params.end)?;
    let found = state.query.anomalies(&params.resource_uid, start_ns, end_ns).await?;
    Ok(Json(serde_json::to_value(found).map_err(SpectreError::from)?))
}

#[derive(Deserialize)]
struct ClusterHealthParams {
    start: String,
    end: String,
}

async fn cluster_health(
    State(state): State<AppState>,
    Query(params): Query<ClusterHealthParams>,
) -> Result<Json<serde_json::Value>, SpectreError> {
    let start_ns = parse_timestamp(&params.start)?;
    let end_ns = parse_timestamp(&params.end)?;
    let health = state.query.cluster_health(start_ns, end_ns).await?;
    Ok(Json(serde_json::to_value(health).map_err(SpectreError::from)?))
}

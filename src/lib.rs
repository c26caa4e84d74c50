//! # Spectre — causal graph materialization, inference, and revalidation
//!
//! Spectre ingests Kubernetes resource and event observations, materializes
//! them as a labeled property graph, runs pluggable relationship extractors
//! over every observation, infers probable causal links between events with
//! decaying confidence, and periodically revalidates and retires what it
//! has inferred. A causal-reasoning query layer and a log/metric analytics
//! pipeline sit on top.
//!
//! ## Architecture
//!
//! - [`model`] — the node/edge vocabulary every other component speaks in.
//! - [`graph`] — the labeled property graph store (`GraphStore` trait plus
//!   an in-memory default).
//! - [`eventlog`] — the append-only, time-indexed Event Log.
//! - [`extractors`] — pluggable per-kind relationship extractors.
//! - [`ingestion`] — the hash-partitioned worker pool driving steps 1–4 of
//!   the ingestion pipeline.
//! - [`causality`] — `TRIGGERED_BY` inference over newly ingested events.
//! - [`revalidation`] — periodic evidence re-evaluation and confidence decay.
//! - [`retention`] — periodic cascading deletion of expired nodes.
//! - [`query`] — causal paths, blast radius, cluster health, anomalies.
//! - [`analytics`] — log template mining, metric anomaly detection, alert
//!   flappiness.
//! - [`integrations`] — the pluggable integration lifecycle and tool
//!   registry.
//! - [`http`] — the read-only HTTP query surface.
//!
//! ## Quick start
//!
//! ```ignore
//! use spectre_core::{init_logging, Spectre};
//! use spectre_core::config::SpectreConfig;
//!
//! #[tokio::main]
//! async fn main() -> spectre_core::error::SpectreResult<()> {
//!     init_logging();
//!     let spectre = Spectre::bootstrap(SpectreConfig::default()).await?;
//!     spectre.serve_http().await
//! }
//! ```

pub mod analytics;
pub mod causality;
pub mod config;
pub mod error;
pub mod eventlog;
pub mod extractors;
pub mod graph;
pub mod http;
pub mod ingestion;
pub mod integrations;
pub mod model;
pub mod query;
pub mod retention;
pub mod revalidation;
pub mod time;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use causality::CausalityEngine;
use config::SpectreConfig;
use error::{SpectreError, SpectreResult};
use eventlog::{EventLog, InMemoryEventLog};
use extractors::ExtractorRegistry;
use graph::{GraphStore, InMemoryGraphStore};
use ingestion::IngestionPipeline;
use integrations::IntegrationManager;
use query::QueryLayer;
use retention::RetentionManager;
use revalidation::RevalidationEngine;

/// Initialize structured logging with an environment-controlled filter.
///
/// Call once at process startup, before spawning any workers. The log level
/// is controlled via the `SPECTRE_LOG` environment variable (`error`,
/// `warn`, `info` — the default, `debug`, `trace`).
pub fn init_logging() {
    init_logging_with_filter("info")
}

/// Like [`init_logging`], but with an explicit default filter directive,
/// overridden by `SPECTRE_LOG` when set.
pub fn init_logging_with_filter(default_directive: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("SPECTRE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive.to_string()));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// The assembled core: the graph, event log, and every long-running worker
/// wired together per the configuration. Owns the workers' cancellation
/// tokens so [`Spectre::shutdown`] can drain them cooperatively.
pub struct Spectre {
    pub config: SpectreConfig,
    pub graph: Arc<dyn GraphStore>,
    pub event_log: Arc<dyn EventLog>,
    pub extractors: Arc<ExtractorRegistry>,
    pub causality: Arc<CausalityEngine>,
    pub ingestion: Arc<IngestionPipeline>,
    pub revalidation: Arc<RevalidationEngine>,
    pub retention: Arc<RetentionManager>,
    pub query: Arc<QueryLayer>,
    pub integrations: Arc<IntegrationManager>,
    shutdown: CancellationToken,
}

impl Spectre {
    /// Validate configuration, connect the graph store, and spawn every
    /// background worker (ingestion, causality, revalidation, retention).
    pub async fn bootstrap(config: SpectreConfig) -> SpectreResult<Self> {
        config.validate()?;

        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        graph.connect().await?;
        graph.initialize_schema().await?;

        let event_log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
        let extractors = Arc::new(ExtractorRegistry::with_defaults());
        let causality = Arc::new(CausalityEngine::new(graph.clone(), config.causality.clone()));
        let ingestion = Arc::new(IngestionPipeline::spawn(
            &config.ingest,
            graph.clone(),
            event_log.clone(),
            extractors.clone(),
            causality.clone(),
        ));

        let shutdown = CancellationToken::new();

        let revalidation = Arc::new(RevalidationEngine::new(graph.clone(), config.revalidation.clone()));
        revalidation.clone().spawn(shutdown.child_token());

        let retention = Arc::new(RetentionManager::new(graph.clone(), config.graph.clone()));
        retention.clone().spawn(shutdown.child_token());

        let query = Arc::new(QueryLayer::new(graph.clone()));
        let integrations = Arc::new(IntegrationManager::new());

        Ok(Self {
            config,
            graph,
            event_log,
            extractors,
            causality,
            ingestion,
            revalidation,
            retention,
            query,
            integrations,
            shutdown,
        })
    }

    /// Serve the HTTP Query Surface until a shutdown signal is received,
    /// draining within `http.shutdownTimeoutSecs`.
    pub async fn serve_http(&self) -> SpectreResult<()> {
        let state = http::AppState {
            query: self.query.clone(),
            graph: self.graph.clone(),
            event_log: self.event_log.clone(),
        };
        let app = http::router(state);

        let listener = tokio::net::TcpListener::bind(&self.config.http.addr)
            .await
            .map_err(|e| SpectreError::Fatal(format!("failed to bind {}: {e}", self.config.http.addr)))?;

        tracing::info!(addr = %self.config.http.addr, "HTTP query surface listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| SpectreError::Fatal(format!("HTTP server error: {e}")))
    }

    /// Cooperative shutdown: cancels every background worker and stops all
    /// running integrations, honoring `http.shutdownTimeoutSecs` as the
    /// overall bound.
    pub async fn shutdown(&self) -> SpectreResult<()> {
        self.shutdown.cancel();
        self.ingestion.shutdown();
        let timeout = std::time::Duration::from_secs(self.config.http.shutdown_timeout_secs);
        let _ = tokio::time::timeout(timeout, self.integrations.stop_all()).await;
        self.graph.close().await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

//! Spectre daemon entrypoint: loads configuration, bootstraps the core, wires
//! configured integrations, and serves the HTTP Query Surface until signaled
//! to shut down.
use std::path::PathBuf;
use std::sync::Arc;

use spectre_core::config::{IntegrationEntry, SpectreConfig};
use spectre_core::error::{SpectreError, SpectreResult};
use spectre_core::integrations::{GrafanaIntegration, Integration, VictoriaLogsIntegration};
use spectre_core::{init_logging, Spectre};

#[tokio::main]
async fn main() -> SpectreResult<()> {
    init_logging();

    let config = load_config()?;
    let spectre = Spectre::bootstrap(config.clone()).await?;

    for entry in &config.integrations {
        let integration = build_integration(&spectre, entry)?;
        spectre.integrations.start(integration).await?;
        tracing::info!(name = %entry.name, kind = %entry.kind, "integration started");
    }

    let result = spectre.serve_http().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "HTTP server exited with an error");
    }

    spectre.shutdown().await?;
    result
}

/// Reads `SPECTRE_CONFIG` (a path to a TOML file) if set, falling back to
/// built-in defaults. A missing or malformed file at an explicitly
/// requested path is fatal; an unset variable is not.
fn load_config() -> SpectreResult<SpectreConfig> {
    match std::env::var_os("SPECTRE_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| SpectreError::Config(format!("failed to read {}: {e}", path.display())))?;
            SpectreConfig::from_toml(&raw)
        }
        None => Ok(SpectreConfig::default()),
    }
}

/// Maps an `[[integrations]]` config entry to its concrete `Integration`
/// implementation. Unknown `type` values are a configuration error,
/// not a silent no-op.
fn build_integration(spectre: &Spectre, entry: &IntegrationEntry) -> SpectreResult<Arc<dyn Integration>> {
    match entry.kind.as_str() {
        "grafana" => Ok(Arc::new(GrafanaIntegration::new(entry.name.clone(), spectre.graph.clone()))),
        "victoria_logs" => {
            let miner = Arc::new(parking_lot::Mutex::new(spectre_core::analytics::TemplateMiner::new()));
            Ok(Arc::new(VictoriaLogsIntegration::new(entry.name.clone(), miner)))
        }
        other => Err(SpectreError::Config(format!("unknown integration type '{other}' for '{}'", entry.name))),
    }
}

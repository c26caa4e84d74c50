/// Configuration options recognized by the core.
///
/// CLI flag parsing and environment plumbing live outside the core; this
/// module only defines the shapes and defaults the core validates against,
/// loadable from TOML the same way the surrounding observability/Kubernetes
/// corpus loads its service configuration.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{SpectreError, SpectreResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub retention_hours: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 7687,
            password: None,
            retention_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevalidationConfig {
    pub interval_secs: u64,
    pub max_age_secs: u64,
    pub stale_threshold_secs: u64,
    pub decay_enabled: bool,
    pub decay_factor_6h: f64,
    pub decay_factor_24h: f64,
}

impl Default for RevalidationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5 * 60,
            max_age_secs: 60 * 60,
            stale_threshold_secs: 7 * 24 * 60 * 60,
            decay_enabled: true,
            decay_factor_6h: 0.9,
            decay_factor_24h: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CausalityConfig {
    pub lookback_minutes: u64,
    pub max_depth: u32,
    pub min_confidence: f64,
}

impl Default for CausalityConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: 10,
            max_depth: 5,
            min_confidence: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub workers: usize,
    pub buffer_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            buffer_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogPipelineConfig {
    pub buffer_size: usize,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for LogPipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            batch_size: 100,
            flush_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub addr: String,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Top-level configuration accepted by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectreConfig {
    pub graph: GraphConfig,
    pub revalidation: RevalidationConfig,
    pub causality: CausalityConfig,
    pub ingest: IngestConfig,
    pub log_pipeline: LogPipelineConfig,
    pub integrations: Vec<IntegrationEntry>,
    pub http: HttpConfig,
}

impl SpectreConfig {
    /// Parse configuration from a TOML document.
    pub fn from_toml(raw: &str) -> SpectreResult<Self> {
        toml::from_str(raw).map_err(|e| SpectreError::Config(e.to_string()))
    }

    /// Validate cross-field constraints not expressible via `Default`.
    pub fn validate(&self) -> SpectreResult<()> {
        if self.causality.min_confidence < 0.0 || self.causality.min_confidence > 1.0 {
            return Err(SpectreError::Config(
                "causality.minConfidence must be within [0,1]".into(),
            ));
        }
        if self.causality.max_depth == 0 || self.causality.max_depth > 10 {
            return Err(SpectreError::Config(
                "causality.maxDepth must be within [1,10]".into(),
            ));
        }
        if self.ingest.buffer_size == 0 {
            return Err(SpectreError::Config(
                "ingest.bufferSize must be greater than zero".into(),
            ));
        }
        if self.log_pipeline.buffer_size == 0 || self.log_pipeline.batch_size == 0 {
            return Err(SpectreError::Config(
                "log.pipeline buffer/batch sizes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = SpectreConfig::default();
        assert_eq!(cfg.graph.retention_hours, 24);
        assert_eq!(cfg.revalidation.interval_secs, 300);
        assert_eq!(cfg.revalidation.max_age_secs, 3600);
        assert_eq!(cfg.revalidation.stale_threshold_secs, 7 * 24 * 60 * 60);
        assert_eq!(cfg.causality.lookback_minutes, 10);
        assert_eq!(cfg.causality.max_depth, 5);
        assert!((cfg.causality.min_confidence - 0.3).abs() < f64::EPSILON);
        assert_eq!(cfg.ingest.buffer_size, 1000);
        assert_eq!(cfg.log_pipeline.batch_size, 100);
        assert_eq!(cfg.http.request_timeout_secs, 30);
        assert_eq!(cfg.http.shutdown_timeout_secs, 10);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let mut cfg = SpectreConfig::default();
        cfg.causality.min_confidence = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let raw = r#"
            [graph]
            retention_hours = 48

            [[integrations]]
            name = "grafana-prod"
            type = "grafana"
        "#;
        let cfg = SpectreConfig::from_toml(raw).unwrap();
        assert_eq!(cfg.graph.retention_hours, 48);
        assert_eq!(cfg.integrations.len(), 1);
        assert_eq!(cfg.integrations[0].kind, "grafana");
        // Unspecified sections still carry spec defaults.
        assert_eq!(cfg.causality.max_depth, 5);
    }
}

/// Error types for the Spectre core engine.
///
/// This module provides the error hierarchy used across ingestion, the graph
/// store, causality inference, revalidation, retention, the query layer, and
/// the analytics pipeline. All fallible operations return `SpectreResult<T>`.
use thiserror::Error;

/// The main error type for Spectre core operations.
#[derive(Error, Debug)]
pub enum SpectreError {
    /// Input failed validation (bad timestamps, bad filters, missing args).
    /// Never retried; surfaced as HTTP 400 at the query boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// A requested resource, edge, or node does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The graph store, event log, or an external connector is unreachable.
    /// Retried with exponential backoff before being surfaced.
    #[error("transient infrastructure error: {0}")]
    Transient(String),

    /// A single extractor or analytical step failed; caller should log and
    /// continue processing other extractors/metrics.
    #[error("extractor error in '{extractor}': {reason}")]
    Extractor { extractor: String, reason: String },

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration failed to parse or violates a documented constraint.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation was cancelled (shutdown, request timeout). Propagated
    /// verbatim; never retried.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Unrecoverable startup failure (schema init, service-account read).
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Catch-all for internal invariant violations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SpectreError {
    /// Stable machine-readable code for the `{"error": CODE, ...}` response shape.
    pub fn code(&self) -> &'static str {
        match self {
            SpectreError::Validation(_) => "VALIDATION",
            SpectreError::NotFound(_) => "NOT_FOUND",
            SpectreError::Transient(_) => "TRANSIENT",
            SpectreError::Extractor { .. } => "EXTRACTOR",
            SpectreError::Serialization(_) => "SERIALIZATION",
            SpectreError::Config(_) => "CONFIG",
            SpectreError::Cancelled(_) => "CANCELLED",
            SpectreError::Fatal(_) => "FATAL",
            SpectreError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether an operation that failed with this error is safe to retry
    /// with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SpectreError::Transient(_))
    }
}

/// Result type alias for Spectre core operations.
pub type SpectreResult<T> = Result<T, SpectreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_per_variant() {
        assert_eq!(SpectreError::Validation("x".into()).code(), "VALIDATION");
        assert_eq!(SpectreError::Transient("x".into()).code(), "TRANSIENT");
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(SpectreError::Transient("x".into()).is_retryable());
        assert!(!SpectreError::Validation("x".into()).is_retryable());
        assert!(!SpectreError::Cancelled("x".into()).is_retryable());
    }
}

/// Edges with typed evidence, confidence, and validation state.
use serde::{Deserialize, Serialize};

use crate::time::NanoTime;

/// Structural edges carry confidence 1.0 and never decay; inferred edges are
/// scored and revalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum EdgeType {
    Owns,
    Changed,
    Selects,
    ScheduledOn,
    Mounts,
    UsesServiceAccount,
    EmittedEvent,
    Contains,
    Has,
    Uses,
    Monitors,
    HasVariable,
    Tracks,
    TriggeredBy,
    Manages,
    ReferencesSpec,
    Annotates,
    CreatesObserved,
    PrecededBy,
}

impl EdgeType {
    /// Structural edges have confidence 1.0 and are exempt from decay.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            EdgeType::TriggeredBy
                | EdgeType::Manages
                | EdgeType::ReferencesSpec
                | EdgeType::Annotates
                | EdgeType::CreatesObserved
                | EdgeType::PrecededBy
        )
    }

    /// Structural edge types traversable by causal-inference BFS.
    pub fn is_causal_structural_hop(&self) -> bool {
        matches!(
            self,
            EdgeType::Owns
                | EdgeType::Selects
                | EdgeType::ScheduledOn
                | EdgeType::Mounts
                | EdgeType::UsesServiceAccount
                | EdgeType::ReferencesSpec
                | EdgeType::Manages
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceKind {
    Label,
    Annotation,
    Temporal,
    Namespace,
    Ownership,
    Reconcile,
}

/// A tagged fact justifying an inferred edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: EvidenceKind,
    pub weight: f64,
    /// `label`/`annotation`/`namespace` evidence: the key that must exist
    /// (and, if `match_value` is set, must equal) on the target.
    pub key: Option<String>,
    pub match_value: Option<String>,
    /// `temporal` evidence: observed lag and correlation window.
    pub lag_ms: Option<i64>,
    pub window_ms: Option<i64>,
}

impl Evidence {
    pub fn label(key: impl Into<String>, match_value: Option<String>, weight: f64) -> Self {
        Self {
            kind: EvidenceKind::Label,
            weight,
            key: Some(key.into()),
            match_value,
            lag_ms: None,
            window_ms: None,
        }
    }

    pub fn ownership(weight: f64) -> Self {
        Self {
            kind: EvidenceKind::Ownership,
            weight,
            key: None,
            match_value: None,
            lag_ms: None,
            window_ms: None,
        }
    }

    pub fn namespace(weight: f64) -> Self {
        Self {
            kind: EvidenceKind::Namespace,
            weight,
            key: None,
            match_value: None,
            lag_ms: None,
            window_ms: None,
        }
    }

    pub fn temporal(lag_ms: i64, window_ms: i64, weight: f64) -> Self {
        Self {
            kind: EvidenceKind::Temporal,
            weight,
            key: None,
            match_value: None,
            lag_ms: Some(lag_ms),
            window_ms: Some(window_ms),
        }
    }

    pub fn structural(weight: f64) -> Self {
        Self {
            kind: EvidenceKind::Reconcile,
            weight,
            key: None,
            match_value: None,
            lag_ms: None,
            window_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationState {
    Valid,
    Stale,
    Invalid,
    Pending,
}

/// An edge between two nodes, identified for upsert purposes by
/// `(type, from_uid, to_uid)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub edge_type: EdgeType,
    pub from: String,
    pub to: String,
    pub confidence: f64,
    pub base_confidence: f64,
    pub evidence: Vec<Evidence>,
    pub first_observed: NanoTime,
    pub last_validated: NanoTime,
    pub validation_state: ValidationState,
}

impl Edge {
    pub fn structural(edge_type: EdgeType, from: impl Into<String>, to: impl Into<String>, at: NanoTime) -> Self {
        Self {
            edge_type,
            from: from.into(),
            to: to.into(),
            confidence: 1.0,
            base_confidence: 1.0,
            evidence: Vec::new(),
            first_observed: at,
            last_validated: at,
            validation_state: ValidationState::Valid,
        }
    }

    pub fn inferred(
        edge_type: EdgeType,
        from: impl Into<String>,
        to: impl Into<String>,
        confidence: f64,
        evidence: Vec<Evidence>,
        at: NanoTime,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            edge_type,
            from: from.into(),
            to: to.into(),
            confidence,
            base_confidence: confidence,
            evidence,
            first_observed: at,
            last_validated: at,
            validation_state: ValidationState::Pending,
        }
    }

    /// Upsert identity key.
    pub fn key(&self) -> (EdgeType, String, String) {
        (self.edge_type, self.from.clone(), self.to.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_edges_never_decay() {
        assert!(EdgeType::Owns.is_structural());
        assert!(EdgeType::Changed.is_structural());
        assert!(!EdgeType::TriggeredBy.is_structural());
    }

    #[test]
    fn structural_edge_has_full_confidence() {
        let e = Edge::structural(EdgeType::Owns, "a", "b", 0);
        assert_eq!(e.confidence, 1.0);
        assert_eq!(e.validation_state, ValidationState::Valid);
    }

    #[test]
    fn inferred_edge_clamps_confidence() {
        let e = Edge::inferred(EdgeType::TriggeredBy, "a", "b", 1.5, vec![], 0);
        assert_eq!(e.confidence, 1.0);
        assert_eq!(e.base_confidence, 1.0);
    }
}

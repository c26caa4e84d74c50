/// ChangeEvent and K8sEvent nodes.
use serde::{Deserialize, Serialize};

use crate::time::NanoTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ready,
    Warning,
    Error,
    Terminating,
    Unknown,
}

/// A point-in-time status/spec change, connected to its `ResourceIdentity`
/// by exactly one `CHANGED` edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: String,
    pub resource_uid: String,
    pub timestamp: NanoTime,
    pub event_type: EventType,
    pub status: Status,
    pub error_message: Option<String>,
    pub container_issues: Vec<String>,
    pub config_changed: bool,
    pub status_changed: bool,
    pub replicas_changed: bool,
    /// Severity used by causality scoring.
    pub impact_score: f64,
}

impl ChangeEvent {
    pub fn new(
        id: impl Into<String>,
        resource_uid: impl Into<String>,
        timestamp: NanoTime,
        event_type: EventType,
        status: Status,
    ) -> Self {
        Self {
            id: id.into(),
            resource_uid: resource_uid.into(),
            timestamp,
            event_type,
            status,
            error_message: None,
            container_issues: Vec::new(),
            config_changed: false,
            status_changed: false,
            replicas_changed: false,
            impact_score: Self::default_impact(status),
        }
    }

    fn default_impact(status: Status) -> f64 {
        match status {
            Status::Error => 0.9,
            Status::Warning => 0.5,
            Status::Terminating => 0.4,
            Status::Unknown => 0.2,
            Status::Ready => 0.1,
        }
    }

    pub fn with_impact_score(mut self, score: f64) -> Self {
        self.impact_score = score.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum K8sEventType {
    Normal,
    Warning,
}

/// A cluster-emitted event (distinct from `ChangeEvent`, which is derived
/// from resource observation rather than the Kubernetes Event API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct K8sEvent {
    pub id: String,
    pub involved_uid: String,
    pub reason: String,
    pub message: String,
    pub event_type: K8sEventType,
    pub count: u32,
    pub timestamp: NanoTime,
}

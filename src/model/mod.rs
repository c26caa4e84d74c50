/// Event & Graph Model.
///
/// Immutable events, resource identities, and edges with typed evidence,
/// confidence, and validation state — the node/edge vocabulary every other
/// component (extractors, ingestion, causality, revalidation, query layer)
/// speaks in terms of.
pub mod change_event;
pub mod edge;
pub mod grafana;
pub mod resource;

pub use change_event::{ChangeEvent, EventType, K8sEvent, K8sEventType, Status};
pub use edge::{Edge, EdgeType, Evidence, EvidenceKind, ValidationState};
pub use grafana::{Alert, Dashboard, HierarchyLevel, Metric, Panel, PromQuery, Service, Variable};
pub use resource::ResourceIdentity;

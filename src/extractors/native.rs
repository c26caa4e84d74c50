/// Native extractors: relationships directly inferable from a
/// resource's own fields, with no heuristics involved. All outputs here are
/// structural edges (confidence 1.0, exempt from decay).
use async_trait::async_trait;

use crate::model::{Edge, EdgeType};

use super::{Extractor, GraphLookup, IngestEvent};

/// `metadata.ownerReferences` -> `OWNS` (owner -> child).
pub struct OwnerReferenceExtractor;

#[async_trait]
impl Extractor for OwnerReferenceExtractor {
    fn name(&self) -> &'static str {
        "owner_reference"
    }

    fn matches(&self, event: &IngestEvent) -> bool {
        !event.owner_references.is_empty()
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn extract_relationships(&self, event: &IngestEvent, _lookup: &GraphLookup) -> Vec<Edge> {
        event
            .owner_references
            .iter()
            .map(|owner| Edge::structural(EdgeType::Owns, owner.uid.clone(), event.uid.clone(), event.timestamp))
            .collect()
    }
}

/// `Pod.spec.nodeName` -> `SCHEDULED_ON`.
pub struct PodNodeExtractor;

#[async_trait]
impl Extractor for PodNodeExtractor {
    fn name(&self) -> &'static str {
        "pod_node"
    }

    fn matches(&self, event: &IngestEvent) -> bool {
        event.kind == "Pod" && event.spec_str("node_name").is_some()
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn extract_relationships(&self, event: &IngestEvent, lookup: &GraphLookup) -> Vec<Edge> {
        let Some(node_name) = event.spec_str("node_name") else {
            return Vec::new();
        };
        let Some(node_uid) = lookup.find_resource_by_namespace("", "Node", &node_name).await else {
            return Vec::new();
        };
        vec![Edge::structural(EdgeType::ScheduledOn, event.uid.clone(), node_uid, event.timestamp)]
    }
}

/// `Pod.spec.pvcNames` -> `MOUNTS` (one edge per mounted PVC).
pub struct PodPvcExtractor;

#[async_trait]
impl Extractor for PodPvcExtractor {
    fn name(&self) -> &'static str {
        "pod_pvc"
    }

    fn matches(&self, event: &IngestEvent) -> bool {
        event.kind == "Pod" && !event.spec_array_of_strings("pvc_names").is_empty()
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn extract_relationships(&self, event: &IngestEvent, lookup: &GraphLookup) -> Vec<Edge> {
        let mut out = Vec::new();
        for pvc_name in event.spec_array_of_strings("pvc_names") {
            if let Some(pvc_uid) = lookup
                .find_resource_by_namespace(&event.namespace, "PersistentVolumeClaim", &pvc_name)
                .await
            {
                out.push(Edge::structural(EdgeType::Mounts, event.uid.clone(), pvc_uid, event.timestamp));
            }
        }
        out
    }
}

/// `Pod.spec.serviceAccountName` -> `USES_SERVICE_ACCOUNT`.
pub struct PodServiceAccountExtractor;

#[async_trait]
impl Extractor for PodServiceAccountExtractor {
    fn name(&self) -> &'static str {
        "pod_service_account"
    }

    fn matches(&self, event: &IngestEvent) -> bool {
        event.kind == "Pod" && event.spec_str("service_account_name").is_some()
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn extract_relationships(&self, event: &IngestEvent, lookup: &GraphLookup) -> Vec<Edge> {
        let Some(sa_name) = event.spec_str("service_account_name") else {
            return Vec::new();
        };
        let Some(sa_uid) = lookup.find_resource_by_namespace(&event.namespace, "ServiceAccount", &sa_name).await else {
            return Vec::new();
        };
        vec![Edge::structural(EdgeType::UsesServiceAccount, event.uid.clone(), sa_uid, event.timestamp)]
    }
}

/// `Service.spec.selector` matched against Pod labels -> `SELECTS`.
pub struct ServiceSelectorExtractor;

#[async_trait]
impl Extractor for ServiceSelectorExtractor {
    fn name(&self) -> &'static str {
        "service_selector"
    }

    fn matches(&self, event: &IngestEvent) -> bool {
        event.kind == "Service" && !event.spec_label_map("selector").is_empty()
    }

    fn priority(&self) -> i32 {
        30
    }

    async fn extract_relationships(&self, event: &IngestEvent, lookup: &GraphLookup) -> Vec<Edge> {
        let selector = event.spec_label_map("selector");
        lookup
            .find_resources_matching_labels(&event.namespace, "Pod", &selector)
            .await
            .into_iter()
            .map(|pod_uid| Edge::structural(EdgeType::Selects, event.uid.clone(), pod_uid, event.timestamp))
            .collect()
    }
}

/// A `K8sEvent`'s involved object -> `EMITTED_EVENT` (object -> event).
pub struct EventObjectExtractor;

#[async_trait]
impl Extractor for EventObjectExtractor {
    fn name(&self) -> &'static str {
        "event_object"
    }

    fn matches(&self, event: &IngestEvent) -> bool {
        event.kind == "Event" && event.spec_str("involved_uid").is_some()
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn extract_relationships(&self, event: &IngestEvent, _lookup: &GraphLookup) -> Vec<Edge> {
        let Some(involved_uid) = event.spec_str("involved_uid") else {
            return Vec::new();
        };
        vec![Edge::structural(EdgeType::EmittedEvent, involved_uid, event.uid.clone(), event.timestamp)]
    }
}

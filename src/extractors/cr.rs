/// CR extractors: operator- and gateway-specific relationships that
/// require matching against conventional labels/annotations rather than a
/// direct field reference. Every edge here is inferred and carries at least
/// one `label` or `ownership` evidence item, per the Extractor Framework's
/// evidence requirement.
use async_trait::async_trait;

use crate::model::{Edge, EdgeType, Evidence};

use super::{Extractor, GraphLookup, IngestEvent};

const HELM_NAME_LABEL: &str = "helm.toolkit.fluxcd.io/name";

/// Flux `HelmRelease` -> the resources it manages, matched via the
/// `helm.toolkit.fluxcd.io/name` label convention, plus a `REFERENCES_SPEC`
/// edge to the chart it was rendered from.
pub struct HelmReleaseExtractor;

#[async_trait]
impl Extractor for HelmReleaseExtractor {
    fn name(&self) -> &'static str {
        "helm_release"
    }

    fn matches(&self, event: &IngestEvent) -> bool {
        event.kind == "HelmRelease"
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn extract_relationships(&self, event: &IngestEvent, lookup: &GraphLookup) -> Vec<Edge> {
        let managed = lookup
            .find_resources_with_label_value(&event.namespace, HELM_NAME_LABEL, &event.name)
            .await;

        let mut out: Vec<Edge> = managed
            .into_iter()
            .map(|managed_uid| {
                let evidence = vec![Evidence::label(HELM_NAME_LABEL, Some(event.name.clone()), 0.9)];
                Edge::inferred(EdgeType::Manages, event.uid.clone(), managed_uid, 0.9, evidence, event.timestamp)
            })
            .collect();

        if let Some(chart_name) = event.spec_str("chart_name") {
            if let Some(chart_uid) = lookup.find_resource_by_namespace(&event.namespace, "HelmChart", &chart_name).await {
                let evidence = vec![Evidence::label("chart_name", Some(chart_name), 0.8)];
                out.push(Edge::inferred(
                    EdgeType::ReferencesSpec,
                    event.uid.clone(),
                    chart_uid,
                    0.8,
                    evidence,
                    event.timestamp,
                ));
            }
        }
        out
    }
}

/// Gateway API `HTTPRoute` -> its `parentRefs` (Gateways) and `backendRefs`
/// (Services), both via `REFERENCES_SPEC`.
pub struct HttpRouteExtractor;

#[async_trait]
impl Extractor for HttpRouteExtractor {
    fn name(&self) -> &'static str {
        "http_route"
    }

    fn matches(&self, event: &IngestEvent) -> bool {
        event.kind == "HTTPRoute"
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn extract_relationships(&self, event: &IngestEvent, lookup: &GraphLookup) -> Vec<Edge> {
        let mut out = Vec::new();

        for parent_name in event.spec_array_of_strings("parent_refs") {
            if let Some(gateway_uid) = lookup.find_resource_by_namespace(&event.namespace, "Gateway", &parent_name).await {
                let evidence = vec![Evidence::label("parent_ref", Some(parent_name), 0.85)];
                out.push(Edge::inferred(
                    EdgeType::ReferencesSpec,
                    event.uid.clone(),
                    gateway_uid,
                    0.85,
                    evidence,
                    event.timestamp,
                ));
            }
        }

        for backend_name in event.spec_array_of_strings("backend_refs") {
            if let Some(service_uid) = lookup.find_resource_by_namespace(&event.namespace, "Service", &backend_name).await {
                let evidence = vec![Evidence::label("backend_ref", Some(backend_name), 0.85)];
                out.push(Edge::inferred(
                    EdgeType::ReferencesSpec,
                    event.uid.clone(),
                    service_uid,
                    0.85,
                    evidence,
                    event.timestamp,
                ));
            }
        }

        out
    }
}

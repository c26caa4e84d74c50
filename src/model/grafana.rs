/// Grafana-domain nodes: Dashboard, Panel, Query, Metric, Variable,
/// Alert, Service.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HierarchyLevel {
    Overview,
    Drilldown,
    Detail,
}

impl HierarchyLevel {
    /// Derive hierarchy level from dashboard tags.
    pub fn from_tags(tags: &[String]) -> Self {
        if tags.iter().any(|t| t.eq_ignore_ascii_case("detail")) {
            HierarchyLevel::Detail
        } else if tags.iter().any(|t| t.eq_ignore_ascii_case("drilldown")) {
            HierarchyLevel::Drilldown
        } else {
            HierarchyLevel::Overview
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub uid: String,
    pub title: String,
    pub tags: Vec<String>,
    pub hierarchy_level: HierarchyLevel,
}

impl Dashboard {
    pub fn new(uid: impl Into<String>, title: impl Into<String>, tags: Vec<String>) -> Self {
        let hierarchy_level = HierarchyLevel::from_tags(&tags);
        Self {
            uid: uid.into(),
            title: title.into(),
            tags,
            hierarchy_level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    pub id: String,
    pub dashboard_uid: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromQuery {
    pub id: String,
    pub panel_id: String,
    pub expr: String,
}

/// Metric nodes are shared across dashboards/alerts by `name` and
/// outlive dashboards that reference them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub dashboard_uid: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub name: String,
    pub metric_name: String,
}

/// Service nodes are inferred from PromQL label selectors. Identity is
/// `(name, cluster, namespace)`; label priority is `app > service > job`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Service {
    pub name: String,
    pub cluster: String,
    pub namespace: String,
}

impl Service {
    /// Pick a service name from PromQL-style label selectors using the
    /// documented priority order; `None` if none of the labels are present.
    pub fn name_from_labels(labels: &std::collections::HashMap<String, String>) -> Option<String> {
        labels
            .get("app")
            .or_else(|| labels.get("service"))
            .or_else(|| labels.get("job"))
            .cloned()
    }
}

/// A query as parsed off a dashboard panel, prior to graph materialization.
#[derive(Debug, Clone)]
pub struct QueryPayload {
    pub id: String,
    pub expr: String,
    pub metric_name: String,
    pub labels: std::collections::HashMap<String, String>,
}

/// A panel as parsed off a dashboard, prior to graph materialization.
#[derive(Debug, Clone)]
pub struct PanelPayload {
    pub id: String,
    pub title: String,
    pub queries: Vec<QueryPayload>,
}

/// A dashboard as the connector's wire layer would hand it to the graph —
/// decoded from Grafana's JSON model, but not yet upserted.
#[derive(Debug, Clone)]
pub struct DashboardPayload {
    pub uid: String,
    pub title: String,
    pub tags: Vec<String>,
    pub panels: Vec<PanelPayload>,
    pub variable_names: Vec<String>,
}

/// An alert rule as the connector's wire layer would hand it to the graph.
#[derive(Debug, Clone)]
pub struct AlertPayload {
    pub id: String,
    pub name: String,
    pub metric_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn hierarchy_level_detects_detail_over_drilldown() {
        let tags = vec!["drilldown".to_string(), "detail".to_string()];
        assert_eq!(HierarchyLevel::from_tags(&tags), HierarchyLevel::Detail);
    }

    #[test]
    fn hierarchy_level_defaults_overview() {
        assert_eq!(HierarchyLevel::from_tags(&[]), HierarchyLevel::Overview);
    }

    #[test]
    fn service_name_priority_is_app_then_service_then_job() {
        let mut labels = HashMap::new();
        labels.insert("job".to_string(), "job-name".to_string());
        labels.insert("service".to_string(), "service-name".to_string());
        assert_eq!(
            Service::name_from_labels(&labels),
            Some("service-name".to_string())
        );
        labels.insert("app".to_string(), "app-name".to_string());
        assert_eq!(
            Service::name_from_labels(&labels),
            Some("app-name".to_string())
        );
    }
}

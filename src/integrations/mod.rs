/// Integration Manager.
///
/// Holds a name-keyed map of running integrations, each honoring
/// `start`/`stop`/`health`/`register_tools`. Config hot-reload stops,
/// recreates, and restarts only the integration named in the change; all
/// others keep running undisturbed.
pub mod grafana;
pub mod victoria_logs;

pub use grafana::GrafanaIntegration;
pub use victoria_logs::VictoriaLogsIntegration;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::IntegrationEntry;
use crate::error::SpectreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Stopped,
}

/// A tool exposed to the external tool surface by a running integration.
/// The tool surface itself is out of scope; this is the registration
/// record integrations publish into.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub owner_integration: String,
}

#[async_trait]
pub trait Integration: Send + Sync {
    fn name(&self) -> &str;
    async fn start(&self, cancel: CancellationToken) -> SpectreResult<()>;
    async fn stop(&self) -> SpectreResult<()>;
    async fn health(&self) -> HealthStatus;
    fn register_tools(&self, registry: &ToolRegistry);
}

/// Append-only during `Integration::start`, read-only at runtime.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<ToolDescriptor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: ToolDescriptor) {
        self.tools.write().push(tool);
    }

    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().clone()
    }

    /// Drop every tool registered by a given integration — used before that
    /// integration is recreated during hot-reload.
    fn unregister_owned_by(&self, integration_name: &str) {
        self.tools.write().retain(|t| t.owner_integration != integration_name);
    }
}

struct Running {
    integration: Arc<dyn Integration>,
    cancel: CancellationToken,
}

/// Holds every configured integration and the shared tool registry they
/// publish into.
pub struct IntegrationManager {
    running: RwLock<HashMap<String, Running>>,
    registry: Arc<ToolRegistry>,
}

impl IntegrationManager {
    pub fn new() -> Self {
        Self { running: RwLock::new(HashMap::new()), registry: Arc::new(ToolRegistry::new()) }
    }

    pub fn tool_registry(&self) -> Arc<ToolRegistry> {
        self.registry.clone()
    }

    pub async fn start(&self, integration: Arc<dyn Integration>) -> SpectreResult<()> {
        let cancel = CancellationToken::new();
        let name = integration.name().to_string();
        integration.start(cancel.clone()).await?;
        integration.register_tools(&self.registry);
        self.running.write().insert(name, Running { integration, cancel });
        Ok(())
    }

    pub async fn stop(&self, name: &str) -> SpectreResult<()> {
        let running = self.running.write().remove(name);
        if let Some(running) = running {
            running.cancel.cancel();
            running.integration.stop().await?;
            self.registry.unregister_owned_by(name);
        }
        Ok(())
    }

    pub async fn health(&self, name: &str) -> Option<HealthStatus> {
        let integration = {
            let guard = self.running.read();
            guard.get(name).map(|r| r.integration.clone())
        };
        match integration {
            Some(integration) => Some(integration.health().await),
            None => None,
        }
    }

    /// On configuration change for `entry.name`: stop the running
    /// integration (if any), recreate it via `factory`, and start it again.
    /// Unrelated integrations are untouched.
    pub async fn reload(
        &self,
        entry: &IntegrationEntry,
        factory: impl FnOnce(&IntegrationEntry) -> SpectreResult<Arc<dyn Integration>>,
    ) -> SpectreResult<()> {
        self.stop(&entry.name).await?;
        let recreated = factory(entry)?;
        self.start(recreated).await
    }

    pub async fn stop_all(&self) -> SpectreResult<()> {
        let names: Vec<String> = self.running.read().keys().cloned().collect();
        for name in names {
            self.stop(&name).await?;
        }
        Ok(())
    }
}

impl Default for IntegrationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraphStore;
    use crate::integrations::grafana::GrafanaIntegration;

    #[tokio::test]
    async fn start_then_stop_unregisters_tools() {
        let manager = IntegrationManager::new();
        let graph: Arc<dyn crate::graph::GraphStore> = Arc::new(InMemoryGraphStore::new());
        let integration = Arc::new(GrafanaIntegration::new("grafana-prod", graph));
        manager.start(integration.clone()).await.unwrap();
        assert!(!manager.tool_registry().tools().is_empty());
        assert_eq!(manager.health("grafana-prod").await, Some(HealthStatus::Healthy));

        manager.stop("grafana-prod").await.unwrap();
        assert!(manager.tool_registry().tools().is_empty());
        assert_eq!(manager.health("grafana-prod").await, None);
    }

    #[tokio::test]
    async fn reload_only_touches_the_named_integration() {
        let manager = IntegrationManager::new();
        let graph: Arc<dyn crate::graph::GraphStore> = Arc::new(InMemoryGraphStore::new());
        let grafana = Arc::new(GrafanaIntegration::new("grafana-prod", graph.clone()));
        let other = Arc::new(GrafanaIntegration::new("grafana-staging", graph.clone()));
        manager.start(grafana).await.unwrap();
        manager.start(other).await.unwrap();

        let entry = IntegrationEntry { name: "grafana-prod".to_string(), kind: "grafana".to_string(), config: Default::default() };
        manager
            .reload(&entry, |e| Ok(Arc::new(GrafanaIntegration::new(&e.name, graph.clone()))))
            .await
            .unwrap();

        assert_eq!(manager.health("grafana-prod").await, Some(HealthStatus::Healthy));
        assert_eq!(manager.health("grafana-staging").await, Some(HealthStatus::Healthy));
    }
}

/// Illustrative VictoriaLogs connector: feeds raw log lines into the Log &
/// Metric Analytics pipeline. Wire protocol out of scope; this
/// is a lifecycle-only stub.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::analytics::TemplateMiner;
use crate::error::SpectreResult;

use super::{HealthStatus, Integration, ToolDescriptor, ToolRegistry};

pub struct VictoriaLogsIntegration {
    name: String,
    running: AtomicBool,
    miner: Arc<Mutex<TemplateMiner>>,
}

impl VictoriaLogsIntegration {
    pub fn new(name: impl Into<String>, miner: Arc<Mutex<TemplateMiner>>) -> Self {
        Self { name: name.into(), running: AtomicBool::new(false), miner }
    }
}

#[async_trait]
impl Integration for VictoriaLogsIntegration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, cancel: CancellationToken) -> SpectreResult<()> {
        self.running.store(true, Ordering::SeqCst);
        let miner = self.miner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(300));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        miner.lock().roll_window();
                    }
                }
            }
        });
        Ok(())
    }

    async fn stop(&self) -> SpectreResult<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn health(&self) -> HealthStatus {
        if self.running.load(Ordering::SeqCst) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Stopped
        }
    }

    fn register_tools(&self, registry: &ToolRegistry) {
        registry.register(ToolDescriptor {
            name: format!("{}.search_logs", self.name),
            description: "Search ingested log templates".to_string(),
            owner_integration: self.name.clone(),
        });
    }
}

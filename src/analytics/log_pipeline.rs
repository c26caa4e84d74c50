/// Per-log-source ingestion pipeline: bounded channel, fixed batch
/// size, periodic flush, graceful drain on stop. The blocking `ingest` call
/// itself provides backpressure — there are no silent drops.
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::LogPipelineConfig;
use crate::time::NanoTime;

use super::templates::TemplateMiner;

#[derive(Debug, Clone)]
pub struct LogLine {
    pub namespace: String,
    pub message: String,
    pub timestamp: NanoTime,
}

pub struct LogIngestionPipeline {
    sender: mpsc::Sender<LogLine>,
    cancel: CancellationToken,
}

impl LogIngestionPipeline {
    pub fn spawn(config: LogPipelineConfig, miner: Arc<Mutex<TemplateMiner>>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<LogLine>(config.buffer_size.max(1));
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let batch_size = config.batch_size.max(1);
        let flush_interval = Duration::from_millis(config.flush_interval_ms.max(1));

        tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let mut ticker = tokio::time::interval(flush_interval);

            loop {
                tokio::select! {
                    _ = worker_cancel.cancelled() => {
                        while let Ok(line) = receiver.try_recv() {
                            batch.push(line);
                        }
                        flush(&miner, &mut batch);
                        break;
                    }
                    _ = ticker.tick() => {
                        flush(&miner, &mut batch);
                    }
                    maybe_line = receiver.recv() => {
                        match maybe_line {
                            Some(line) => {
                                batch.push(line);
                                if batch.len() >= batch_size {
                                    flush(&miner, &mut batch);
                                }
                            }
                            None => {
                                flush(&miner, &mut batch);
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self { sender, cancel }
    }

    /// Blocks when the channel is full — the documented backpressure
    /// mechanism.
    pub async fn ingest(&self, line: LogLine) -> Result<(), crate::error::SpectreError> {
        self.sender
            .send(line)
            .await
            .map_err(|_| crate::error::SpectreError::Cancelled("log pipeline shut down".into()))
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

fn flush(miner: &Arc<Mutex<TemplateMiner>>, batch: &mut Vec<LogLine>) {
    if batch.is_empty() {
        return;
    }
    let mut guard = miner.lock();
    for line in batch.drain(..) {
        guard.observe(&line.namespace, &line.message, line.timestamp);
    }
}

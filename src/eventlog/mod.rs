/// Event Log Interface.
///
/// An append-only, time-indexed event store with range scans. The
/// core treats durable retention as an external collaborator; this
/// crate ships an in-memory default satisfying the "append event" /
/// "range-scan events by time window" contract the core actually needs.
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::SpectreResult;
use crate::time::NanoTime;

/// An opaque raw event as it arrives at the Ingestion Pipeline, before
/// extraction. `kind` distinguishes resource snapshots, K8s Events, Grafana
/// sync payloads, and so on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: String,
    pub namespace: String,
    pub kind: String,
    pub timestamp: NanoTime,
    pub payload: JsonValue,
}

#[derive(Debug, Clone, Default)]
pub struct EventLogMetadata {
    pub namespaces: Vec<String>,
    pub kinds: Vec<String>,
}

#[async_trait]
pub trait EventLog: Send + Sync {
    /// Idempotent by `event.id`.
    async fn append_event(&self, event: RawEvent) -> SpectreResult<()>;

    /// Yields events in timestamp order within `[start_ns, end_ns)`,
    /// optionally filtered to a set of namespaces/kinds. An empty filter
    /// matches everything.
    async fn range_scan(
        &self,
        start_ns: NanoTime,
        end_ns: NanoTime,
        namespaces: &[String],
        kinds: &[String],
    ) -> SpectreResult<Vec<RawEvent>>;

    async fn metadata(&self, start_ns: NanoTime, end_ns: NanoTime) -> SpectreResult<EventLogMetadata>;
}

/// In-memory event log: a `BTreeMap<timestamp, Vec<event>>` for ordered
/// range scans plus a `DashMap<id, ()>` for append idempotency — a single
/// reader/writer lock around the ordered index, non-blocking id lookups.
#[derive(Default)]
pub struct InMemoryEventLog {
    by_time: RwLock<BTreeMap<NanoTime, Vec<RawEvent>>>,
    seen_ids: DashMap<String, ()>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append_event(&self, event: RawEvent) -> SpectreResult<()> {
        if self.seen_ids.contains_key(&event.id) {
            return Ok(());
        }
        self.seen_ids.insert(event.id.clone(), ());
        self.by_time.write().entry(event.timestamp).or_default().push(event);
        Ok(())
    }

    async fn range_scan(
        &self,
        start_ns: NanoTime,
        end_ns: NanoTime,
        namespaces: &[String],
        kinds: &[String],
    ) -> SpectreResult<Vec<RawEvent>> {
        let guard = self.by_time.read();
        let mut out = Vec::new();
        for (_, events) in guard.range(start_ns..end_ns) {
            for e in events {
                if (namespaces.is_empty() || namespaces.iter().any(|ns| ns == &e.namespace))
                    && (kinds.is_empty() || kinds.iter().any(|k| k == &e.kind))
                {
                    out.push(e.clone());
                }
            }
        }
        Ok(out)
    }

    async fn metadata(&self, start_ns: NanoTime, end_ns: NanoTime) -> SpectreResult<EventLogMetadata> {
        let events = self.range_scan(start_ns, end_ns, &[], &[]).await?;
        let mut namespaces: Vec<String> = events.iter().map(|e| e.namespace.clone()).collect();
        let mut kinds: Vec<String> = events.iter().map(|e| e.kind.clone()).collect();
        namespaces.sort();
        namespaces.dedup();
        kinds.sort();
        kinds.dedup();
        Ok(EventLogMetadata { namespaces, kinds })
    }
}

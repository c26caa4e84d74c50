/// ResourceIdentity: identifies a Kubernetes-like object over time.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::time::{content_hash, NanoTime};

/// Identifies a Kubernetes-like object. `uid` is the sole identity;
/// `(group, version, kind, namespace, name)` is a secondary,
/// human-readable lookup key used by extractors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceIdentity {
    pub uid: String,
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub first_seen: NanoTime,
    pub last_seen: NanoTime,
    pub deleted: bool,
    pub deleted_at: Option<NanoTime>,
    /// JSON-encoded label map.
    pub labels: HashMap<String, String>,
    /// Annotation map, checked by `annotation` evidence during revalidation
    /// the same way `labels` is checked by `label` evidence.
    pub annotations: HashMap<String, String>,
}

impl ResourceIdentity {
    pub fn new(
        uid: impl Into<String>,
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        observed_at: NanoTime,
    ) -> Self {
        Self {
            uid: uid.into(),
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            first_seen: observed_at,
            last_seen: observed_at,
            deleted: false,
            deleted_at: None,
            labels: HashMap::new(),
            annotations: HashMap::new(),
        }
    }

    /// Merge a fresh observation into this identity. `lastSeen` only ever
    /// moves forward, so `firstSeen <= lastSeen` always holds.
    pub fn observe(&mut self, at: NanoTime, labels: &HashMap<String, String>) {
        self.observe_with_annotations(at, labels, &HashMap::new())
    }

    pub fn observe_with_annotations(
        &mut self,
        at: NanoTime,
        labels: &HashMap<String, String>,
        annotations: &HashMap<String, String>,
    ) {
        if at > self.last_seen {
            self.last_seen = at;
        }
        if at < self.first_seen {
            self.first_seen = at;
        }
        for (k, v) in labels {
            self.labels.insert(k.clone(), v.clone());
        }
        for (k, v) in annotations {
            self.annotations.insert(k.clone(), v.clone());
        }
    }

    pub fn mark_deleted(&mut self, at: NanoTime) {
        self.deleted = true;
        self.deleted_at = Some(at);
        if at > self.last_seen {
            self.last_seen = at;
        }
    }

    /// Stable lookup key for the graph store's secondary index, keyed on
    /// `(kind, namespace, name)` — the triple the Extractor Framework's
    /// `FindResourceByNamespace` actually has in hand; `group`/
    /// `version` are not always known to an extractor at match time.
    pub fn secondary_key(&self) -> String {
        content_hash(&[&self.kind, &self.namespace, &self.name])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_never_moves_first_seen_forward() {
        let mut r = ResourceIdentity::new("u1", "apps", "v1", "Deployment", "ns", "web", 100);
        r.observe(50, &HashMap::new());
        assert_eq!(r.first_seen, 50);
        assert!(r.first_seen <= r.last_seen);
    }

    #[test]
    fn mark_deleted_sets_tombstone() {
        let mut r = ResourceIdentity::new("u1", "", "v1", "Pod", "ns", "web-1", 100);
        r.mark_deleted(200);
        assert!(r.deleted);
        assert_eq!(r.deleted_at, Some(200));
    }
}

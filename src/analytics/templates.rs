/// Drain-like template mining: per-namespace log clustering into
/// stable templates, with novelty detection against the immediately
/// preceding window.
use std::collections::HashMap;

use serde::Serialize;

use crate::time::{content_hash, NanoTime};

/// A coarse tokenization: numbers, hex ids, and UUID-shaped tokens collapse
/// to a wildcard, matching Drain's "mask variable tokens" step.
fn tokenize(message: &str) -> Vec<String> {
    message
        .split_whitespace()
        .map(|tok| if is_variable_token(tok) { "<*>".to_string() } else { tok.to_string() })
        .collect()
}

fn is_variable_token(tok: &str) -> bool {
    let cleaned = tok.trim_matches(|c: char| !c.is_alphanumeric());
    if cleaned.is_empty() {
        return false;
    }
    cleaned.chars().any(|c| c.is_ascii_digit())
        || cleaned.chars().all(|c| c.is_ascii_hexdigit()) && cleaned.len() >= 8
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: String,
    pub namespace: String,
    pub pattern: String,
    pub tokens: Vec<String>,
    pub count: u64,
    pub first_seen: NanoTime,
    pub last_seen: NanoTime,
}

/// Tracks templates per namespace and detects novelty by comparing the
/// current window's template set to the immediately preceding one.
#[derive(Default)]
pub struct TemplateMiner {
    templates: HashMap<(String, String), Template>,
    previous_window: HashMap<String, std::collections::HashSet<String>>,
    current_window: HashMap<String, std::collections::HashSet<String>>,
}

impl TemplateMiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one log message, returning its template id and whether it is
    /// novel relative to the previous window.
    pub fn observe(&mut self, namespace: &str, message: &str, at: NanoTime) -> (String, bool) {
        let tokens = tokenize(message);
        let pattern = tokens.join(" ");
        let id = content_hash(&[namespace, &pattern]);

        let key = (namespace.to_string(), id.clone());
        self.templates
            .entry(key)
            .and_modify(|t| {
                t.count += 1;
                t.last_seen = at;
            })
            .or_insert_with(|| Template {
                id: id.clone(),
                namespace: namespace.to_string(),
                pattern: pattern.clone(),
                tokens,
                count: 1,
                first_seen: at,
                last_seen: at,
            });

        self.current_window.entry(namespace.to_string()).or_default().insert(id.clone());
        let novel = !self
            .previous_window
            .get(namespace)
            .map(|set| set.contains(&id))
            .unwrap_or(false);

        (id, novel)
    }

    /// Roll the current window into "previous" — called at window boundary.
    pub fn roll_window(&mut self) {
        self.previous_window = std::mem::take(&mut self.current_window);
    }

    pub fn template(&self, namespace: &str, id: &str) -> Option<&Template> {
        self.templates.get(&(namespace.to_string(), id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_messages_share_a_template() {
        let mut miner = TemplateMiner::new();
        let (id1, _) = miner.observe("ns", "pod web-1 restarted 3 times", 0);
        let (id2, _) = miner.observe("ns", "pod web-2 restarted 7 times", 1);
        assert_eq!(id1, id2);
        assert_eq!(miner.template("ns", &id1).unwrap().count, 2);
    }

    #[test]
    fn novelty_tracks_against_previous_window() {
        let mut miner = TemplateMiner::new();
        let (id_a, novel_a) = miner.observe("ns", "scheduler assigned pod 42", 0);
        assert!(novel_a, "first-ever template is novel in an empty previous window");
        miner.roll_window();

        let (id_a_again, novel_again) = miner.observe("ns", "scheduler assigned pod 99", 1);
        assert_eq!(id_a, id_a_again);
        assert!(!novel_again, "seen in the previous window");

        let (_, novel_new) = miner.observe("ns", "volume mount failed for claim data", 2);
        assert!(novel_new);
    }
}

//! Per-run call tallies.
//!
//! Labels are free-form strings. The summarization loop records
//! `ask <identity>`, `ask-hit <identity>` and `ask-miss <identity>` for every
//! request. Counts live only as long as the owning [`Llm`](crate::llm::Llm).

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::warn;

/// Default pattern for [`Counters::counter_string`]: top-level request counts.
pub const DEFAULT_COUNTER_PATTERN: &str = "^ask ";

/// Mutex-guarded label → count map. Increments are atomic.
#[derive(Debug, Default)]
pub struct Counters {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to `label` and return the new count.
    pub fn increment(&self, label: &str) -> u64 {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let count = counts.entry(label.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Current count for `label` (0 if never incremented).
    pub fn get(&self, label: &str) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.get(label).copied().unwrap_or(0)
    }

    /// Copy of every label and count, sorted by label.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// `"name:count; name:count"` for labels matching `pattern`, sorted by
    /// label. An invalid pattern is logged and yields an empty string.
    pub fn counter_string(&self, pattern: &str) -> String {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!("Invalid counter pattern '{pattern}': {e}");
                return String::new();
            }
        };
        self.snapshot()
            .iter()
            .filter(|(label, _)| re.is_match(label))
            .map(|(label, count)| format!("{label}:{count}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

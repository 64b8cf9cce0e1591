use parking_lot::Mutex;
use std::collections::HashMap;

/// Told about every snippet that was successfully expanded.
pub trait UsageSink: Send + Sync {
    fn record_use(&self, snippet_id: &str);
}

/// Ignores usage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsage;

impl UsageSink for NoopUsage {
    fn record_use(&self, _snippet_id: &str) {}
}

/// In-memory per-snippet expansion counts.
#[derive(Debug, Default)]
pub struct UsageCounter {
    counts: Mutex<HashMap<String, u64>>,
}

impl UsageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, snippet_id: &str) -> u64 {
        self.counts.lock().get(snippet_id).copied().unwrap_or(0)
    }

    /// Counts sorted by most used first, ties by id.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut counts: Vec<_> = self
            .counts
            .lock()
            .iter()
            .map(|(id, count)| (id.clone(), *count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}

impl UsageSink for UsageCounter {
    fn record_use(&self, snippet_id: &str) {
        *self.counts.lock().entry(snippet_id.to_string()).or_insert(0) += 1;
        tracing::debug!(snippet = snippet_id, "Snippet expanded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let counter = UsageCounter::new();
        counter.record_use("a");
        counter.record_use("b");
        counter.record_use("b");

        assert_eq!(counter.count("a"), 1);
        assert_eq!(counter.count("b"), 2);
        assert_eq!(counter.count("missing"), 0);
        assert_eq!(
            counter.snapshot(),
            vec![("b".to_string(), 2), ("a".to_string(), 1)]
        );
    }
}

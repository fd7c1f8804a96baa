use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Hits,
    Successes,
    Errors,
}

/// Best-effort request tallies as an injected capability rather than ambient
/// global state. Lost updates under races are acceptable.
pub trait MetricsSink: Send + Sync {
    fn incr(&self, counter: Counter);
}

#[derive(Default)]
pub struct AtomicMetrics {
    hits: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Hits => self.hits.load(Ordering::Relaxed),
            Counter::Successes => self.successes.load(Ordering::Relaxed),
            Counter::Errors => self.errors.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for AtomicMetrics {
    fn incr(&self, counter: Counter) {
        let cell = match counter {
            Counter::Hits => &self.hits,
            Counter::Successes => &self.successes,
            Counter::Errors => &self.errors,
        };
        cell.fetch_add(1, Ordering::Relaxed);
    }
}

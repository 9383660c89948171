//! Global atomic counters for evaluation attempts.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. before the CLI exits).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    attempts_started: AtomicU64,
    attempts_settled: AtomicU64,
    attempts_failed: AtomicU64,
    entries_dropped: AtomicU64,
    scores_clamped: AtomicU64,
    engine_retries: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            attempts_started: AtomicU64::new(0),
            attempts_settled: AtomicU64::new(0),
            attempts_failed: AtomicU64::new(0),
            entries_dropped: AtomicU64::new(0),
            scores_clamped: AtomicU64::new(0),
            engine_retries: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64, by: u64, name: &'static str) {
        counter.fetch_add(by, Ordering::Relaxed);
        tracing::trace!(metric = name, "counter incremented");
    }

    pub fn inc_attempts_started(&self) {
        Self::bump(&self.attempts_started, 1, "attempts_started");
    }

    pub fn inc_attempts_settled(&self) {
        Self::bump(&self.attempts_settled, 1, "attempts_settled");
    }

    pub fn inc_attempts_failed(&self) {
        Self::bump(&self.attempts_failed, 1, "attempts_failed");
    }

    pub fn add_entries_dropped(&self, n: u64) {
        Self::bump(&self.entries_dropped, n, "entries_dropped");
    }

    pub fn add_scores_clamped(&self, n: u64) {
        Self::bump(&self.scores_clamped, n, "scores_clamped");
    }

    pub fn inc_engine_retries(&self) {
        Self::bump(&self.engine_retries, 1, "engine_retries");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            attempts_started = self.attempts_started(),
            attempts_settled = self.attempts_settled(),
            attempts_failed = self.attempts_failed(),
            entries_dropped = self.entries_dropped(),
            scores_clamped = self.scores_clamped(),
            engine_retries = self.engine_retries(),
        );
    }

    pub fn attempts_started(&self) -> u64 {
        self.attempts_started.load(Ordering::Relaxed)
    }

    pub fn attempts_settled(&self) -> u64 {
        self.attempts_settled.load(Ordering::Relaxed)
    }

    pub fn attempts_failed(&self) -> u64 {
        self.attempts_failed.load(Ordering::Relaxed)
    }

    pub fn entries_dropped(&self) -> u64 {
        self.entries_dropped.load(Ordering::Relaxed)
    }

    pub fn scores_clamped(&self) -> u64 {
        self.scores_clamped.load(Ordering::Relaxed)
    }

    pub fn engine_retries(&self) -> u64 {
        self.engine_retries.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for c in [
            &self.attempts_started,
            &self.attempts_settled,
            &self.attempts_failed,
            &self.entries_dropped,
            &self.scores_clamped,
            &self.engine_retries,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.attempts_started(), 0);
        m.inc_attempts_started();
        m.inc_attempts_started();
        assert_eq!(m.attempts_started(), 2);

        m.add_entries_dropped(3);
        assert_eq!(m.entries_dropped(), 3);

        m.inc_engine_retries();
        assert_eq!(m.engine_retries(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_attempts_settled();
        m.inc_attempts_failed();
        m.add_scores_clamped(2);
        m.reset();
        assert_eq!(m.attempts_settled(), 0);
        assert_eq!(m.attempts_failed(), 0);
        assert_eq!(m.scores_clamped(), 0);
    }
}

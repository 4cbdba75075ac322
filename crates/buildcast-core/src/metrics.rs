//! Global atomic counters for Buildcast observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (after each install and checker tick).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    installs_started: AtomicU64,
    installs_completed: AtomicU64,
    installs_failed: AtomicU64,
    bytes_downloaded: AtomicU64,
    checker_ticks: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            installs_started: AtomicU64::new(0),
            installs_completed: AtomicU64::new(0),
            installs_failed: AtomicU64::new(0),
            bytes_downloaded: AtomicU64::new(0),
            checker_ticks: AtomicU64::new(0),
        }
    }

    pub fn inc_installs_started(&self) {
        self.installs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "installs_started", "counter incremented");
    }

    pub fn inc_installs_completed(&self) {
        self.installs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "installs_completed", "counter incremented");
    }

    pub fn inc_installs_failed(&self) {
        self.installs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "installs_failed", "counter incremented");
    }

    /// Add `n` to the downloaded-bytes counter.
    pub fn add_bytes_downloaded(&self, n: u64) {
        self.bytes_downloaded.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_checker_ticks(&self) {
        self.checker_ticks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checker_ticks", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            installs_started = self.installs_started(),
            installs_completed = self.installs_completed(),
            installs_failed = self.installs_failed(),
            bytes_downloaded = self.bytes_downloaded(),
            checker_ticks = self.checker_ticks(),
        );
    }

    pub fn installs_started(&self) -> u64 {
        self.installs_started.load(Ordering::Relaxed)
    }

    pub fn installs_completed(&self) -> u64 {
        self.installs_completed.load(Ordering::Relaxed)
    }

    pub fn installs_failed(&self) -> u64 {
        self.installs_failed.load(Ordering::Relaxed)
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::Relaxed)
    }

    pub fn checker_ticks(&self) -> u64 {
        self.checker_ticks.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.installs_started.store(0, Ordering::Relaxed);
        self.installs_completed.store(0, Ordering::Relaxed);
        self.installs_failed.store(0, Ordering::Relaxed);
        self.bytes_downloaded.store(0, Ordering::Relaxed);
        self.checker_ticks.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_installs_started();
        m.inc_installs_started();
        assert_eq!(m.installs_started(), 2);

        m.inc_installs_completed();
        m.inc_installs_failed();
        assert_eq!(m.installs_completed(), 1);
        assert_eq!(m.installs_failed(), 1);

        m.add_bytes_downloaded(4096);
        m.add_bytes_downloaded(10);
        assert_eq!(m.bytes_downloaded(), 4106);

        m.inc_checker_ticks();
        assert_eq!(m.checker_ticks(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_installs_started();
        m.add_bytes_downloaded(7);
        m.inc_checker_ticks();
        m.reset();
        assert_eq!(m.installs_started(), 0);
        assert_eq!(m.bytes_downloaded(), 0);
        assert_eq!(m.checker_ticks(), 0);
    }
}

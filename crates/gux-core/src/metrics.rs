//! Process-global counters for verification runs.
//!
//! Counters are bumped at the call site with relaxed atomics. Call
//! [`Counters::flush`] at the end of a run to emit all values as one
//! `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Counters = Counters::new();

pub struct Counters {
    zones_extracted: AtomicU64,
    techniques_run: AtomicU64,
    technique_errors: AtomicU64,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    pub const fn new() -> Self {
        Self {
            zones_extracted: AtomicU64::new(0),
            techniques_run: AtomicU64::new(0),
            technique_errors: AtomicU64::new(0),
        }
    }

    pub fn inc_zones_extracted(&self) {
        self.zones_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_techniques_run(&self) {
        self.techniques_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_technique_errors(&self) {
        self.technique_errors.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "technique_errors", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            zones_extracted = self.zones_extracted(),
            techniques_run = self.techniques_run(),
            technique_errors = self.technique_errors(),
        );
    }

    pub fn zones_extracted(&self) -> u64 {
        self.zones_extracted.load(Ordering::Relaxed)
    }

    pub fn techniques_run(&self) -> u64 {
        self.techniques_run.load(Ordering::Relaxed)
    }

    pub fn technique_errors(&self) -> u64 {
        self.technique_errors.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.zones_extracted.store(0, Ordering::Relaxed);
        self.techniques_run.store(0, Ordering::Relaxed);
        self.technique_errors.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_reset() {
        let c = Counters::new();
        c.inc_zones_extracted();
        c.inc_techniques_run();
        c.inc_techniques_run();
        c.inc_technique_errors();
        assert_eq!(c.zones_extracted(), 1);
        assert_eq!(c.techniques_run(), 2);
        assert_eq!(c.technique_errors(), 1);
        c.reset();
        assert_eq!(c.techniques_run(), 0);
    }
}

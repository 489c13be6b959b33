//! Atomic helpers for backend statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// An atomic counter for statistics.
#[derive(Debug)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create a new counter.
    pub const fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    /// Increment the counter.
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

/// An atomic gauge for tracking current values (can go up or down).
#[derive(Debug)]
pub struct AtomicGauge(AtomicU64);

impl AtomicGauge {
    /// Create a new gauge.
    pub const fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    /// Add to the gauge, returning the new value.
    pub fn add(&self, value: u64) -> u64 {
        self.0.fetch_add(value, Ordering::Relaxed) + value
    }

    /// Subtract from the gauge, returning the new value.
    pub fn sub(&self, value: u64) -> u64 {
        self.0.fetch_sub(value, Ordering::Relaxed) - value
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Update the maximum (for high-water marks).
    pub fn update_max(&self, value: u64) {
        self.0.fetch_max(value, Ordering::Relaxed);
    }
}

impl Default for AtomicGauge {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_high_water_mark() {
        let live = AtomicGauge::default();
        let peak = AtomicGauge::default();

        peak.update_max(live.add(300));
        peak.update_max(live.add(200));
        live.sub(400);
        peak.update_max(live.get());

        assert_eq!(live.get(), 100);
        assert_eq!(peak.get(), 500);
    }

    #[test]
    fn test_counter() {
        let c = AtomicCounter::default();
        c.increment();
        c.increment();
        assert_eq!(c.get(), 2);
    }
}

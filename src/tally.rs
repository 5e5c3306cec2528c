//! Failure bookkeeping backends
//!
//! This module provides the consecutive-failure accounting behind a circuit
//! breaker, plus its monotonic clock:
//! - `MemoryTally`: thread-safe in-memory streak counters
//! - `NullTally`: no-op backend for testing and benchmarking

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

/// Abstract backend for circuit breaker failure accounting
///
/// The streak is consecutive: it grows on every observed failure and is only
/// cleared by `reset`, which the owning breaker calls on each transition into
/// the closed state. A success on its own does not touch the streak.
pub trait TallyBackend: Send + Sync + std::fmt::Debug {
    /// Record one observed failure of the protected action
    fn record_failure(&self, circuit: &str);

    /// Clear the consecutive-failure streak for a circuit
    fn reset(&self, circuit: &str);

    /// Current consecutive-failure streak for a circuit
    fn failure_streak(&self, circuit: &str) -> usize;

    /// Monotonic time in seconds (relative to backend creation)
    fn monotonic_time(&self) -> f64;
}

/// Thread-safe in-memory failure accounting
#[derive(Debug)]
pub struct MemoryTally {
    /// Streaks keyed by circuit name
    streaks: RwLock<HashMap<String, usize>>,
    /// Monotonic time anchor (prevents clock skew issues from NTP)
    start_time: Instant,
}

impl MemoryTally {
    /// Create a new tally instance
    pub fn new() -> Self {
        Self {
            streaks: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }
}

impl Default for MemoryTally {
    fn default() -> Self {
        Self::new()
    }
}

impl TallyBackend for MemoryTally {
    fn record_failure(&self, circuit: &str) {
        let mut streaks = self.streaks.write().unwrap();
        *streaks.entry(circuit.to_string()).or_insert(0) += 1;
    }

    fn reset(&self, circuit: &str) {
        let mut streaks = self.streaks.write().unwrap();
        streaks.remove(circuit);
    }

    fn failure_streak(&self, circuit: &str) -> usize {
        let streaks = self.streaks.read().unwrap();
        streaks.get(circuit).copied().unwrap_or(0)
    }

    fn monotonic_time(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

/// No-op backend for testing and benchmarking
///
/// This backend discards all failures and always reports a zero streak, so a
/// breaker using it never trips on its own. Useful for:
/// - Testing call-path logic without accounting overhead
/// - Benchmarking pure state machine performance
/// - Scenarios where an external system decides when to trip
///
/// # Example
///
/// ```rust
/// use tripswitch::{CircuitBreaker, NullTally};
/// use std::sync::Arc;
///
/// let breaker = CircuitBreaker::builder()
///     .name("test")
///     .tally(Arc::new(NullTally::new()))
///     .build();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct NullTally {
    start_time: Instant,
}

impl NullTally {
    /// Create a new null tally instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for NullTally {
    fn default() -> Self {
        Self::new()
    }
}

impl TallyBackend for NullTally {
    fn record_failure(&self, _circuit: &str) {
        // No-op
    }

    fn reset(&self, _circuit: &str) {
        // No-op
    }

    fn failure_streak(&self, _circuit: &str) -> usize {
        0
    }

    fn monotonic_time(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_tally_record_and_read() {
        let tally = MemoryTally::new();

        tally.record_failure("test_circuit");
        tally.record_failure("test_circuit");
        tally.record_failure("other_circuit");

        assert_eq!(tally.failure_streak("test_circuit"), 2);
        assert_eq!(tally.failure_streak("other_circuit"), 1);
    }

    #[test]
    fn test_memory_tally_reset() {
        let tally = MemoryTally::new();

        tally.record_failure("test_circuit");
        assert_eq!(tally.failure_streak("test_circuit"), 1);

        tally.reset("test_circuit");
        assert_eq!(tally.failure_streak("test_circuit"), 0);
    }

    #[test]
    fn test_memory_tally_unknown_circuit_is_zero() {
        let tally = MemoryTally::new();
        assert_eq!(tally.failure_streak("never_seen"), 0);
    }

    #[test]
    fn test_memory_tally_monotonic_time() {
        let tally = MemoryTally::new();

        let time1 = tally.monotonic_time();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let time2 = tally.monotonic_time();

        assert!(time2 > time1);
    }

    #[test]
    fn test_null_tally_discards_failures() {
        let tally = NullTally::new();

        tally.record_failure("test_circuit");
        tally.record_failure("test_circuit");

        assert_eq!(tally.failure_streak("test_circuit"), 0);
    }

    #[test]
    fn test_null_tally_monotonic_time() {
        let tally = NullTally::new();

        let time1 = tally.monotonic_time();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let time2 = tally.monotonic_time();

        assert!(time2 > time1);
    }

    #[test]
    fn test_null_tally_with_circuit_breaker() {
        use std::sync::Arc;

        let tally = Arc::new(NullTally::new());
        let breaker = crate::CircuitBreaker::builder()
            .name("test")
            .tally(tally)
            .threshold(3)
            .build();

        let _ = breaker.attempt(|| Err::<(), _>("error 1"));
        let _ = breaker.attempt(|| Err::<(), _>("error 2"));
        let _ = breaker.attempt(|| Err::<(), _>("error 3"));

        assert!(breaker.is_closed());
        assert!(!breaker.is_open());
    }
}

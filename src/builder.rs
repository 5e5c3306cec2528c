//! Builder API for ergonomic circuit breaker configuration

use crate::{
    callbacks::Callbacks,
    circuit::{BreakerContext, CircuitBreaker, Config},
    half_open::HalfOpenFilter,
    tally::{MemoryTally, TallyBackend},
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Builder for creating circuit breakers with fluent API
///
/// Unset or zero-valued fields fall back to defaults at `build()` time: a
/// generated unique name, a threshold of 3, a timeout of 3000 ms, unbounded
/// half-open concurrency and no-op listeners.
pub struct CircuitBuilder {
    name: Option<String>,
    config: Config,
    tally: Option<Arc<dyn TallyBackend>>,
    half_open_limit: Option<usize>,
    callbacks: Callbacks,
}

impl CircuitBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            name: None,
            config: Config {
                threshold: 0,
                timeout_millis: 0,
                jitter_factor: 0.0,
            },
            tally: None,
            half_open_limit: None,
            callbacks: Callbacks::new(),
        }
    }

    /// Set the circuit name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the number of consecutive failures that opens the circuit
    pub fn threshold(mut self, threshold: usize) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the open timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_millis = timeout.as_millis() as u64;
        self
    }

    /// Set the open timeout in milliseconds
    pub fn timeout_millis(mut self, millis: u64) -> Self {
        self.config.timeout_millis = millis;
        self
    }

    /// Set the jitter factor (0.0 = exact timeout, 1.0 = full jitter)
    /// Uses chrono-machines formula: timeout * (1 - jitter + rand * jitter)
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.config.jitter_factor = factor;
        self
    }

    /// Bound how many distinct callers may probe while half-open
    ///
    /// Without this, half-open concurrency is unbounded. Re-entrant calls
    /// from an admitted caller never count twice against the limit.
    ///
    /// # Panics
    ///
    /// `build()` panics if `limit` is 0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tripswitch::CircuitBreaker;
    ///
    /// let breaker = CircuitBreaker::builder()
    ///     .name("api")
    ///     .concurrent_half_open_calls(2)
    ///     .build();
    /// ```
    pub fn concurrent_half_open_calls(mut self, limit: usize) -> Self {
        self.half_open_limit = Some(limit);
        self
    }

    /// Set a custom failure accounting backend
    pub fn tally(mut self, tally: Arc<dyn TallyBackend>) -> Self {
        self.tally = Some(tally);
        self
    }

    /// Set the listener for transitions into the open state
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set the listener for transitions into the closed state
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Set the listener for transitions into the half-open state
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Set one listener for every state transition
    ///
    /// Overwrites all three per-state listener slots with the same callback.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.set_all(Arc::new(f));
        self
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker {
        let mut config = self.config;
        if config.threshold == 0 {
            config.threshold = Config::DEFAULT_THRESHOLD;
        }
        if config.timeout_millis == 0 {
            config.timeout_millis = Config::DEFAULT_TIMEOUT_MILLIS;
        }

        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            _ => Uuid::new_v4().to_string(),
        };

        let tally = self.tally.unwrap_or_else(|| Arc::new(MemoryTally::new()));

        let context = BreakerContext {
            name,
            config,
            tally,
        };
        let filter = self.half_open_limit.map(HalfOpenFilter::new);

        CircuitBreaker::with_parts(context, self.callbacks, filter)
    }
}

impl Default for CircuitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    #[test]
    fn test_builder_defaults() {
        let breaker = CircuitBuilder::new().build();

        assert!(breaker.is_closed());
        assert_eq!(breaker.threshold(), 3);
        assert_eq!(breaker.timeout(), Duration::from_millis(3000));
        assert!(!breaker.name().is_empty());
    }

    #[test]
    fn test_builder_generates_unique_names() {
        let first = CircuitBuilder::new().build();
        let second = CircuitBuilder::new().build();

        assert_ne!(first.name(), second.name());
    }

    #[test]
    fn test_builder_empty_name_is_replaced() {
        let breaker = CircuitBuilder::new().name("").build();
        assert!(!breaker.name().is_empty());
    }

    #[test]
    fn test_builder_zero_values_are_substituted() {
        let breaker = CircuitBuilder::new().threshold(0).timeout_millis(0).build();

        assert_eq!(breaker.threshold(), 3);
        assert_eq!(breaker.timeout(), Duration::from_millis(3000));
    }

    #[test]
    fn test_builder_configured_getters_round_trip() {
        let breaker = CircuitBuilder::new()
            .name("foobar")
            .threshold(13)
            .timeout(Duration::from_millis(1337))
            .build();

        assert_eq!(breaker.name(), "foobar");
        assert_eq!(breaker.threshold(), 13);
        assert_eq!(breaker.timeout(), Duration::from_millis(1337));
    }

    #[test]
    fn test_builder_with_callbacks() {
        let opened = Arc::new(AtomicBool::new(false));
        let opened_clone = Arc::clone(&opened);

        let breaker = CircuitBuilder::new()
            .name("test")
            .threshold(2)
            .on_open(move |_name| {
                opened_clone.store(true, Ordering::SeqCst);
            })
            .build();

        // Trigger failures to open circuit
        let _ = breaker.attempt(|| Err::<(), _>("error 1"));
        let _ = breaker.attempt(|| Err::<(), _>("error 2"));

        assert!(opened.load(Ordering::SeqCst));
    }

    #[test]
    fn test_state_change_listener_counts_every_transition() {
        let count = Arc::new(AtomicI32::new(-1));
        let count_clone = Arc::clone(&count);

        let breaker = CircuitBuilder::new()
            .name("test")
            .threshold(1)
            .timeout_millis(50)
            .on_state_change(move |_name| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        // The initial move into closed fires the combined listener.
        assert_eq!(0, count.load(Ordering::SeqCst));

        let _ = breaker.attempt(|| Err::<(), _>("boom"));
        assert!(breaker.is_open());
        assert_eq!(1, count.load(Ordering::SeqCst));

        std::thread::sleep(Duration::from_millis(70));
        assert!(breaker.is_half_open()); // this check performs the transition
        assert_eq!(2, count.load(Ordering::SeqCst));

        let _ = breaker.attempt(|| Ok::<_, String>(3));
        assert!(breaker.is_closed());
        assert_eq!(3, count.load(Ordering::SeqCst));
    }
}

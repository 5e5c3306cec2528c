//! Circuit breaker implementation using state machines
//!
//! This module owns the breaker state machine and the call path that wraps a
//! protected action with admission control and outcome bookkeeping.

use crate::{
    State,
    callbacks::Callbacks,
    errors::{CircuitError, Failure},
    half_open::{HalfOpenFilter, current_caller},
    tally::{MemoryTally, TallyBackend},
};
use state_machines::state_machine;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Consecutive failures while closed required to open the circuit
    pub threshold: usize,

    /// Milliseconds the circuit stays open before a probe may run
    pub timeout_millis: u64,

    /// Jitter factor for the open timeout (0.0 = exact timeout, 1.0 = full jitter)
    /// Uses chrono-machines formula: timeout * (1 - jitter + rand * jitter)
    pub jitter_factor: f64,
}

impl Config {
    /// Threshold substituted by the builder when none is configured
    pub const DEFAULT_THRESHOLD: usize = 3;

    /// Open timeout substituted by the builder when none is configured
    pub const DEFAULT_TIMEOUT_MILLIS: u64 = 3000;
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            timeout_millis: Self::DEFAULT_TIMEOUT_MILLIS,
            jitter_factor: 0.0,
        }
    }
}

/// Breaker context - shared data across all states
#[derive(Clone)]
pub struct BreakerContext {
    pub name: String,
    pub config: Config,
    pub tally: Arc<dyn TallyBackend>,
}

impl Default for BreakerContext {
    fn default() -> Self {
        Self {
            name: String::new(),
            config: Config::default(),
            tally: Arc::new(MemoryTally::new()),
        }
    }
}

impl std::fmt::Debug for BreakerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerContext")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("tally", &"<dyn TallyBackend>")
            .finish()
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    pub opened_at: f64,
}

// Define the breaker state machine with dynamic mode
state_machine! {
    name: Breaker,
    context: BreakerContext,
    dynamic: true,  // Enable dynamic mode for runtime state transitions

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen,
    ],
    events {
        trip {
            guards: [should_open],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        attempt_reset {
            guards: [timeout_elapsed],
            transition: { from: Open, to: HalfOpen }
        }
        probe_succeeded {
            guards: [should_close],
            transition: { from: HalfOpen, to: Closed }
        }
        force_open {
            guards: [manual_override],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        force_close {
            guards: [manual_override],
            transition: { from: [Open, HalfOpen], to: Closed }
        }
    }
}

// Guards for dynamic mode - implemented on typestate machines
impl Breaker<Closed> {
    /// Check if the consecutive-failure streak reached the threshold
    fn should_open(&self, ctx: &BreakerContext) -> bool {
        ctx.tally.failure_streak(&ctx.name) >= ctx.config.threshold
    }

    fn manual_override(&self, _ctx: &BreakerContext) -> bool {
        true
    }
}

impl Breaker<HalfOpen> {
    /// A failing probe always reopens the circuit
    fn should_open(&self, _ctx: &BreakerContext) -> bool {
        true
    }

    /// A single succeeding probe closes the circuit
    fn should_close(&self, _ctx: &BreakerContext) -> bool {
        true
    }

    fn manual_override(&self, _ctx: &BreakerContext) -> bool {
        true
    }
}

impl Breaker<Open> {
    /// Check if the open timeout elapsed for the Open -> HalfOpen transition
    fn timeout_elapsed(&self, ctx: &BreakerContext) -> bool {
        let data = self.state_data_open().expect("Open state must have data");
        let elapsed = ctx.tally.monotonic_time() - data.opened_at;

        // Apply jitter using chrono-machines if jitter_factor > 0
        let timeout_millis = if ctx.config.jitter_factor > 0.0 {
            let policy = chrono_machines::Policy {
                max_attempts: 1,
                base_delay_ms: ctx.config.timeout_millis,
                multiplier: 1.0,
                max_delay_ms: ctx.config.timeout_millis,
            };
            policy.calculate_delay(1, ctx.config.jitter_factor)
        } else {
            ctx.config.timeout_millis
        };

        elapsed * 1000.0 >= timeout_millis as f64
    }

    fn manual_override(&self, _ctx: &BreakerContext) -> bool {
        true
    }
}

/// Mutable breaker internals, all behind one lock
struct Shared {
    machine: DynamicBreaker,
    filter: Option<HalfOpenFilter>,
    last_failure: Option<Failure>,
}

/// Circuit breaker public API
///
/// A breaker is shared by reference across threads; admission decisions and
/// transitions are serialized through its internal lock, while the protected
/// action itself runs without it.
pub struct CircuitBreaker {
    context: BreakerContext,
    callbacks: Callbacks,
    shared: Mutex<Shared>,
}

impl CircuitBreaker {
    /// Create a breaker with explicit parameters (use builder() for more options)
    ///
    /// Fails when `threshold` is zero or `timeout` is below one millisecond.
    pub fn new(
        name: impl Into<String>,
        threshold: usize,
        timeout: Duration,
    ) -> Result<Self, CircuitError> {
        let name = name.into();
        if threshold < 1 {
            return Err(CircuitError::Config {
                circuit: name,
                message: "failure threshold should be greater than 0",
            });
        }
        let timeout_millis = timeout.as_millis() as u64;
        if timeout_millis < 1 {
            return Err(CircuitError::Config {
                circuit: name,
                message: "timeout should be greater than 0",
            });
        }

        let context = BreakerContext {
            name,
            config: Config {
                threshold,
                timeout_millis,
                jitter_factor: 0.0,
            },
            tally: Arc::new(MemoryTally::new()),
        };

        Ok(Self::with_parts(context, Callbacks::new(), None))
    }

    /// Create a breaker from assembled parts (used by the builder)
    pub(crate) fn with_parts(
        context: BreakerContext,
        callbacks: Callbacks,
        filter: Option<HalfOpenFilter>,
    ) -> Self {
        let machine = DynamicBreaker::new(context.clone());

        let breaker = Self {
            context,
            callbacks,
            shared: Mutex::new(Shared {
                machine,
                filter,
                last_failure: None,
            }),
        };

        // Entering the initial closed state runs the same bookkeeping as any
        // other transition into closed.
        breaker.mark_closed();
        breaker
    }

    /// Create a new circuit breaker builder
    pub fn builder() -> crate::builder::CircuitBuilder {
        crate::builder::CircuitBuilder::new()
    }

    /// Execute a protected action with circuit protection
    ///
    /// Returns the action's value on success, `CircuitError::Execution` with
    /// the action's own error when it ran and failed, and
    /// `CircuitError::Open` when the call was rejected without running the
    /// action (circuit open, or half-open with no free probe slot).
    pub fn attempt<T, E>(
        &self,
        action: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, CircuitError>
    where
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        {
            let mut shared = self.shared.lock().unwrap();
            self.run_lazy_reset(&mut shared);

            match shared.machine.current_state() {
                "Open" => return Err(self.rejection(&shared, State::Open)),
                "HalfOpen" => {
                    let admitted = match &mut shared.filter {
                        Some(filter) => filter.enter(current_caller()),
                        None => true,
                    };
                    if !admitted {
                        return Err(self.rejection(&shared, State::HalfOpen));
                    }
                }
                _ => {}
            }

            shared.last_failure = None;
        }

        // The action runs without the lock so slow calls never serialize on
        // the breaker.
        match action() {
            Ok(value) => {
                let mut shared = self.shared.lock().unwrap();
                if shared.machine.current_state() == "HalfOpen" {
                    if let Some(filter) = &mut shared.filter {
                        filter.exit(current_caller());
                    }
                    if shared.machine.handle(BreakerEvent::ProbeSucceeded).is_ok() {
                        self.mark_closed();
                    }
                }
                Ok(value)
            }
            Err(e) => {
                let boxed: Box<dyn Error + Send + Sync + 'static> = e.into();
                let failure: Failure = Arc::from(boxed);

                let mut shared = self.shared.lock().unwrap();
                shared.last_failure = Some(Arc::clone(&failure));
                self.context.tally.record_failure(&self.context.name);

                match shared.machine.current_state() {
                    "HalfOpen" => {
                        if let Some(filter) = &mut shared.filter {
                            filter.exit(current_caller());
                        }
                        if shared.machine.handle(BreakerEvent::Trip).is_ok() {
                            self.mark_open(&mut shared);
                        }
                    }
                    "Closed" => {
                        if shared.machine.handle(BreakerEvent::Trip).is_ok() {
                            self.mark_open(&mut shared);
                        }
                    }
                    _ => {}
                }

                Err(CircuitError::Execution(failure))
            }
        }
    }

    /// Force the circuit open, regardless of current state
    pub fn open(&self) {
        let mut shared = self.shared.lock().unwrap();
        let _ = shared.machine.handle(BreakerEvent::ForceOpen);
        self.mark_open(&mut shared);
    }

    /// Force the circuit closed, regardless of current state
    pub fn close(&self) {
        let mut shared = self.shared.lock().unwrap();
        let _ = shared.machine.handle(BreakerEvent::ForceClose);
        self.mark_closed();
    }

    /// Current state; evaluates the timeout-driven Open -> HalfOpen transition
    pub fn state(&self) -> State {
        let mut shared = self.shared.lock().unwrap();
        self.run_lazy_reset(&mut shared);
        match shared.machine.current_state() {
            "Open" => State::Open,
            "HalfOpen" => State::HalfOpen,
            _ => State::Closed,
        }
    }

    /// Check if circuit is closed
    pub fn is_closed(&self) -> bool {
        self.state() == State::Closed
    }

    /// Check if circuit is half-open
    pub fn is_half_open(&self) -> bool {
        self.state() == State::HalfOpen
    }

    /// Check if circuit is open
    pub fn is_open(&self) -> bool {
        self.state() == State::Open
    }

    /// Circuit name
    pub fn name(&self) -> &str {
        &self.context.name
    }

    /// Configured failure threshold
    pub fn threshold(&self) -> usize {
        self.context.config.threshold
    }

    /// Configured open timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.context.config.timeout_millis)
    }

    /// The error observed by the most recent attempt that reached the action
    ///
    /// Empty after a successful attempt; retained across attempts that were
    /// rejected at admission and never reached the action.
    pub fn failure_from_last_attempt(&self) -> Option<Failure> {
        self.shared.lock().unwrap().last_failure.clone()
    }

    /// Evaluate the lazy timeout-driven Open -> HalfOpen transition
    fn run_lazy_reset(&self, shared: &mut Shared) {
        if shared.machine.current_state() == "Open" {
            let _ = shared.machine.handle(BreakerEvent::AttemptReset);
            if shared.machine.current_state() == "HalfOpen" {
                tracing::debug!(circuit = %self.context.name, "circuit half-open, probing");
                self.callbacks.trigger_half_open(&self.context.name);
            }
        }
    }

    fn rejection(&self, shared: &Shared, state: State) -> CircuitError {
        CircuitError::Open {
            circuit: self.context.name.clone(),
            state,
            cause: shared.last_failure.clone(),
        }
    }

    /// Open-state bookkeeping (timestamp, fresh probe slate, listener)
    fn mark_open(&self, shared: &mut Shared) {
        if let Some(data) = shared.machine.open_data_mut() {
            data.opened_at = self.context.tally.monotonic_time();
        }
        if let Some(filter) = &mut shared.filter {
            filter.reset();
        }
        tracing::warn!(circuit = %self.context.name, "circuit opened");
        self.callbacks.trigger_open(&self.context.name);
    }

    /// Closed-state bookkeeping (streak reset, listener)
    fn mark_closed(&self) {
        self.context.tally.reset(&self.context.name);
        tracing::debug!(circuit = %self.context.name, "circuit closed");
        self.callbacks.trigger_close(&self.context.name);
    }
}

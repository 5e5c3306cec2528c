//! Tripswitch - circuit breaker with observer-driven state transitions
//!
//! This crate guards a caller-supplied fallible operation with the circuit
//! breaker pattern:
//! - Consecutive failures while closed trip the circuit open
//! - An open circuit rejects calls without invoking the protected action
//! - Once the open timeout elapses, the next state query or call moves the
//!   circuit to half-open, where a bounded number of probes test recovery
//! - Transitions are evaluated lazily on access, never by a background timer
//!
//! # Example
//!
//! ```rust
//! use tripswitch::CircuitBreaker;
//!
//! let breaker = CircuitBreaker::builder()
//!     .name("my_service")
//!     .threshold(5)
//!     .timeout(std::time::Duration::from_millis(3000))
//!     .on_open(|name| println!("Circuit {} opened!", name))
//!     .build();
//!
//! // Execute with circuit protection
//! let result = breaker.attempt(|| {
//!     // Your service call here
//!     Ok::<_, String>("success")
//! });
//! assert!(result.is_ok());
//!
//! // Check circuit state
//! if breaker.is_open() {
//!     println!("Circuit is open, skipping call");
//! }
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod errors;
pub mod half_open;
pub mod tally;

pub use builder::CircuitBuilder;
pub use circuit::{CircuitBreaker, Config};
pub use errors::{CircuitError, Failure};
pub use half_open::{CallerId, HalfOpenFilter, current_caller};
pub use tally::{MemoryTally, NullTally, TallyBackend};

/// Circuit breaker state as observed through the public API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Normal operation, calls pass through and failures are counted
    Closed,
    /// Probationary state after the open timeout, limited probes permitted
    HalfOpen,
    /// Tripped state, calls are rejected without running the action
    Open,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::HalfOpen => write!(f, "half-open"),
            State::Open => write!(f, "open"),
        }
    }
}

//! Error types for circuit breaker operations

use crate::State;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Type-erased failure captured from a protected action.
///
/// Shared so the same failure can be returned to the caller, remembered as
/// the breaker's last observed failure, and attached as the cause of a later
/// rejection.
pub type Failure = Arc<dyn Error + Send + Sync + 'static>;

/// Errors that can occur during circuit breaker operations
#[derive(Debug)]
pub enum CircuitError {
    /// Construction was attempted with an invalid threshold or timeout
    Config {
        circuit: String,
        message: &'static str,
    },
    /// The call was rejected without invoking the protected action; `state`
    /// is the breaker state at rejection time (open, or half-open with no
    /// free probe slot) and `cause` the last failure the breaker observed
    Open {
        circuit: String,
        state: State,
        cause: Option<Failure>,
    },
    /// The protected action ran and failed
    Execution(Failure),
}

impl fmt::Display for CircuitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitError::Config { circuit, message } => {
                write!(f, "Circuit '{}' configuration invalid: {}", circuit, message)
            }
            CircuitError::Open { circuit, state, .. } => {
                write!(f, "Circuit '{}' is {}, call not attempted", circuit, state)
            }
            CircuitError::Execution(e) => write!(f, "Circuit execution failed: {}", e),
        }
    }
}

impl Error for CircuitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CircuitError::Open {
                cause: Some(cause), ..
            } => Some(cause.as_ref()),
            CircuitError::Execution(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

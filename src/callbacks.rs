//! Listener hooks for circuit breaker state transitions

use std::sync::Arc;

/// A state-transition listener, invoked with the circuit name.
pub type Listener = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-state transition listeners; every slot defaults to a no-op
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_close: Option<Listener>,
    pub on_half_open: Option<Listener>,
    pub on_open: Option<Listener>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the same listener in all three slots
    pub fn set_all(&mut self, listener: Listener) {
        self.on_close = Some(Arc::clone(&listener));
        self.on_half_open = Some(Arc::clone(&listener));
        self.on_open = Some(listener);
    }

    pub fn trigger_close(&self, circuit: &str) {
        if let Some(ref listener) = self.on_close {
            listener(circuit);
        }
    }

    pub fn trigger_half_open(&self, circuit: &str) {
        if let Some(ref listener) = self.on_half_open {
            listener(circuit);
        }
    }

    pub fn trigger_open(&self, circuit: &str) {
        if let Some(ref listener) = self.on_open {
            listener(circuit);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .field("on_open", &self.on_open.is_some())
            .finish()
    }
}

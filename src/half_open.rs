//! Half-open probe admission
//!
//! This module bounds how many distinct callers may execute the protected
//! action while a circuit is half-open. A recursive call from a caller that
//! was already admitted passes again without taking a second slot.

use std::collections::HashSet;
use std::thread::ThreadId;

/// Identity of the unit of work currently executing a call.
///
/// Thread identity is stable across a recursive call chain, which is what
/// re-entrancy detection relies on.
pub type CallerId = ThreadId;

/// The identity of the calling thread.
pub fn current_caller() -> CallerId {
    std::thread::current().id()
}

/// Identity-keyed admission gate for half-open probe calls
///
/// The filter holds no timing or state logic of its own; the owning breaker
/// consults it under its lock while half-open and resets it whenever the
/// circuit goes open.
#[derive(Debug)]
pub struct HalfOpenFilter {
    /// Maximum number of distinct concurrent callers
    max_concurrent: usize,
    /// Callers currently admitted and not yet exited
    active: HashSet<CallerId>,
}

impl HalfOpenFilter {
    /// Create a filter admitting at most `max_concurrent` distinct callers
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrent` is 0.
    pub fn new(max_concurrent: usize) -> Self {
        assert!(
            max_concurrent > 0,
            "Half-open call limit must be greater than 0"
        );
        Self {
            max_concurrent,
            active: HashSet::new(),
        }
    }

    /// Returns `true` iff `caller` may execute the protected action while the
    /// owning circuit is half-open, recording it as active on admission.
    pub fn enter(&mut self, caller: CallerId) -> bool {
        if self.active.contains(&caller) {
            // A recursive call that already passed the owning breaker.
            return true;
        }

        if self.active.len() < self.max_concurrent {
            self.active.insert(caller);
            true
        } else {
            false
        }
    }

    /// Release the slot held by `caller` once the protected action finished.
    ///
    /// Called exactly once for every admission, on both the success and the
    /// failure path, while the owning circuit is still half-open.
    pub fn exit(&mut self, caller: CallerId) {
        self.active.remove(&caller);
    }

    /// Clear all admitted callers; the owning breaker calls this whenever the
    /// circuit goes into the open state.
    pub fn reset(&mut self) {
        self.active.clear();
    }

    /// Maximum number of distinct concurrent callers
    pub fn limit(&self) -> usize {
        self.max_concurrent
    }

    /// Number of currently admitted callers
    pub fn active(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// A caller identity distinct from the test thread's own
    fn foreign_caller() -> CallerId {
        thread::spawn(current_caller).join().unwrap()
    }

    #[test]
    fn test_filter_basic_enter_exit() {
        let mut filter = HalfOpenFilter::new(3);

        assert_eq!(filter.limit(), 3);
        assert_eq!(filter.active(), 0);

        let caller = current_caller();
        assert!(filter.enter(caller));
        assert_eq!(filter.active(), 1);

        filter.exit(caller);
        assert_eq!(filter.active(), 0);
    }

    #[test]
    fn test_filter_refuses_at_capacity() {
        let mut filter = HalfOpenFilter::new(2);

        let first = foreign_caller();
        let second = foreign_caller();
        let third = foreign_caller();

        assert!(filter.enter(first));
        assert!(filter.enter(second));
        assert!(!filter.enter(third), "third distinct caller must be refused");
        assert_eq!(filter.active(), 2);

        filter.exit(first);
        assert!(filter.enter(third), "freed slot admits a new caller");
    }

    #[test]
    fn test_filter_reentrant_caller_always_admitted() {
        let mut filter = HalfOpenFilter::new(1);

        let caller = current_caller();
        assert!(filter.enter(caller));
        assert!(filter.enter(caller), "re-entrant caller must pass again");
        assert_eq!(filter.active(), 1, "re-entry takes no extra slot");

        assert!(!filter.enter(foreign_caller()));
    }

    #[test]
    fn test_filter_reset_clears_active_callers() {
        let mut filter = HalfOpenFilter::new(2);

        assert!(filter.enter(foreign_caller()));
        assert!(filter.enter(foreign_caller()));
        assert_eq!(filter.active(), 2);

        filter.reset();
        assert_eq!(filter.active(), 0);
        assert!(filter.enter(foreign_caller()));
    }

    #[test]
    fn test_filter_exit_unknown_caller_is_harmless() {
        let mut filter = HalfOpenFilter::new(1);

        filter.exit(foreign_caller());
        assert_eq!(filter.active(), 0);
        assert!(filter.enter(current_caller()));
    }

    #[test]
    fn test_filter_concurrent_admission_is_bounded() {
        let filter = Arc::new(Mutex::new(HalfOpenFilter::new(5)));
        let mut handles = vec![];

        // 10 threads, each with a distinct identity, race for 5 slots
        for _ in 0..10 {
            let filter = Arc::clone(&filter);
            handles.push(thread::spawn(move || {
                filter.lock().unwrap().enter(current_caller())
            }));
        }

        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|admitted| *admitted)
            .count();

        assert_eq!(admitted, 5, "exactly the limit is admitted");
        assert_eq!(filter.lock().unwrap().active(), 5);
    }

    #[test]
    #[should_panic(expected = "Half-open call limit must be greater than 0")]
    fn test_filter_zero_limit() {
        HalfOpenFilter::new(0);
    }
}

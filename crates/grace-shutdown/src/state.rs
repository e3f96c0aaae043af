//! Process-wide shutdown state.
//!
//! Mutated concurrently by every request-handling thread and by the
//! drain task. No transactional guarantees: the flag becomes visible
//! eventually and monotonically, and the counter is approximately
//! accurate at any instant.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};

/// Counts requests currently being handled.
///
/// Never drops below zero, even if `exit` is called more often than `enter`.
#[derive(Debug, Default)]
pub struct InFlightCounter {
    count: AtomicU64,
}

impl InFlightCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A request started.
    pub fn enter(&self) -> u64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// A request finished. Returns `false` if the counter was already zero.
    pub fn exit(&self) -> bool {
        let result = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));
        if result.is_err() {
            debug!("in-flight counter already at zero, ignoring exit");
        }
        result.is_ok()
    }

    /// Current number of in-flight requests.
    pub fn current(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

/// RAII guard that calls [`InFlightCounter::exit`] when dropped.
///
/// Keeps the count accurate even if a handler panics.
#[derive(Debug)]
pub struct RequestGuard<'a> {
    counter: &'a InFlightCounter,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.counter.exit();
    }
}

#[derive(Debug, Default)]
pub struct ShutdownState {
    shutting_down: AtomicBool,
    requests: InFlightCounter,
    /// Endpoints (`host:port`) peers have announced are shutting down.
    announced: RwLock<HashSet<String>>,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the shutdown flag. Returns `true` only for the first caller.
    pub fn begin_shutdown(&self) -> bool {
        let first = !self.shutting_down.swap(true, Ordering::AcqRel);
        if first {
            info!(in_flight = self.requests.current(), "shutdown started");
        }
        first
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn requests(&self) -> &InFlightCounter {
        &self.requests
    }

    /// Count a request for the lifetime of the returned guard.
    pub fn track(&self) -> RequestGuard<'_> {
        self.requests.enter();
        RequestGuard {
            counter: &self.requests,
        }
    }

    /// Record that a peer endpoint is shutting down. Returns `true` if it
    /// was not known before.
    pub fn add_shutdown_endpoint(&self, endpoint: &str) -> bool {
        let added = self.announced.write().insert(endpoint.to_string());
        if added {
            info!(%endpoint, "peer announced shutdown");
        }
        added
    }

    pub fn is_endpoint_shutting_down(&self, endpoint: &str) -> bool {
        self.announced.read().contains(endpoint)
    }

    pub fn announced_endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self.announced.read().iter().cloned().collect();
        endpoints.sort();
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counter_enter_exit() {
        let counter = InFlightCounter::new();
        assert_eq!(counter.enter(), 1);
        assert_eq!(counter.enter(), 2);
        assert!(counter.exit());
        assert_eq!(counter.current(), 1);
    }

    #[test]
    fn counter_floors_at_zero() {
        let counter = InFlightCounter::new();
        assert!(!counter.exit());
        assert_eq!(counter.current(), 0);

        counter.enter();
        assert!(counter.exit());
        assert!(!counter.exit());
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn counter_concurrent_pairs_balance() {
        let state = Arc::new(ShutdownState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        state.requests().enter();
                        state.requests().exit();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(state.requests().current(), 0);
    }

    #[test]
    fn guard_decrements_on_drop() {
        let state = ShutdownState::new();
        let g1 = state.track();
        let g2 = state.track();
        assert_eq!(state.requests().current(), 2);
        drop(g1);
        assert_eq!(state.requests().current(), 1);
        drop(g2);
        assert_eq!(state.requests().current(), 0);
    }

    #[test]
    fn guard_decrements_on_panic() {
        let state = Arc::new(ShutdownState::new());
        let inner = state.clone();
        let result = thread::spawn(move || {
            let _guard = inner.track();
            panic!("handler failed");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(state.requests().current(), 0);
    }

    #[test]
    fn shutdown_flag_is_set_once() {
        let state = ShutdownState::new();
        assert!(!state.is_shutting_down());
        assert!(state.begin_shutdown());
        assert!(!state.begin_shutdown());
        assert!(state.is_shutting_down());
    }

    #[test]
    fn announced_endpoints_are_deduplicated() {
        let state = ShutdownState::new();
        assert!(state.add_shutdown_endpoint("10.0.0.2:8080"));
        assert!(!state.add_shutdown_endpoint("10.0.0.2:8080"));
        assert!(state.add_shutdown_endpoint("10.0.0.1:8080"));

        assert!(state.is_endpoint_shutting_down("10.0.0.1:8080"));
        assert!(!state.is_endpoint_shutting_down("10.0.0.3:8080"));
        assert_eq!(
            state.announced_endpoints(),
            vec!["10.0.0.1:8080", "10.0.0.2:8080"]
        );
    }
}

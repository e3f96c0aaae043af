//! Process-wide lifecycle timestamps.
//!
//! One `LifecycleClock` exists per running process. It is constructed at
//! startup, shared behind an `Arc`, and each event timestamp is written
//! at most once by the collaborator that observes the event. Readers on
//! any thread see either "unset" or the final value.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::time::epoch_millis;

const UNSET: u64 = 0;

#[derive(Debug)]
pub struct LifecycleClock {
    start_time: u64,
    registry_finish_time: AtomicU64,
    second_registry_finish_time: AtomicU64,
    start_warm_up_time: AtomicU64,
}

impl LifecycleClock {
    /// Create a clock whose start instant is `start_ms` (epoch millis).
    pub fn new(start_ms: u64) -> Self {
        Self {
            start_time: start_ms,
            registry_finish_time: AtomicU64::new(UNSET),
            second_registry_finish_time: AtomicU64::new(UNSET),
            start_warm_up_time: AtomicU64::new(UNSET),
        }
    }

    /// Create a clock started at the current wall-clock instant.
    pub fn started_now() -> Self {
        Self::new(epoch_millis())
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn registry_finish_time(&self) -> Option<u64> {
        load(&self.registry_finish_time)
    }

    pub fn second_registry_finish_time(&self) -> Option<u64> {
        load(&self.second_registry_finish_time)
    }

    pub fn start_warm_up_time(&self) -> Option<u64> {
        load(&self.start_warm_up_time)
    }

    /// Record that the primary registry finished registering this instance.
    ///
    /// Returns `false` if the event was already recorded.
    pub fn mark_registry_finished(&self, at_ms: u64) -> bool {
        let set = set_once(&self.registry_finish_time, at_ms);
        if set {
            info!(at_ms, "registry registration finished");
        }
        set
    }

    /// Record that the secondary (migration) registry finished registering.
    pub fn mark_second_registry_finished(&self, at_ms: u64) -> bool {
        let set = set_once(&self.second_registry_finish_time, at_ms);
        if set {
            info!(at_ms, "second registry registration finished");
        }
        set
    }

    /// Record that local warm-up began.
    pub fn mark_warm_up_started(&self, at_ms: u64) -> bool {
        let set = set_once(&self.start_warm_up_time, at_ms);
        if set {
            info!(at_ms, "warm-up started");
        }
        set
    }
}

impl Default for LifecycleClock {
    fn default() -> Self {
        Self::started_now()
    }
}

fn load(slot: &AtomicU64) -> Option<u64> {
    match slot.load(Ordering::Acquire) {
        UNSET => None,
        ts => Some(ts),
    }
}

fn set_once(slot: &AtomicU64, at_ms: u64) -> bool {
    // Zero is the unset sentinel and cannot be recorded.
    if at_ms == UNSET {
        return false;
    }
    let won = slot
        .compare_exchange(UNSET, at_ms, Ordering::AcqRel, Ordering::Acquire)
        .is_ok();
    if !won {
        debug!(at_ms, "lifecycle event already recorded, ignoring");
    }
    won
}

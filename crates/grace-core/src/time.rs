//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds per second.
pub const SEC_DELTA: u64 = 1000;

/// Current Unix time in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Convert a seconds value from config into milliseconds, saturating.
pub fn secs_to_millis(secs: u64) -> u64 {
    secs.saturating_mul(SEC_DELTA)
}

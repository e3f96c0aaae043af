//! Shared vocabulary used across grace crates.
//!
//! Metadata keys and defaults are part of the contract between the
//! instance that publishes warm-up metadata to a registry and the
//! callers that read it back when selecting an instance.

// ── Warm-up metadata ───────────────────────────────────────────────

/// Metadata key: epoch millis at which the instance declared warm-up start.
pub const WARM_KEY_INJECT_TIME: &str = "injectTime";

/// Metadata key: warm-up window in seconds.
pub const WARM_KEY_TIME: &str = "warmUpTime";

/// Metadata key: weight the instance ramps up to.
pub const WARM_KEY_WEIGHT: &str = "warmUpWeight";

/// Metadata key: curve exponent shaping the ramp.
pub const WARM_KEY_CURVE: &str = "warmUpCurve";

/// Warm-up window used when an instance declares none. Zero means no
/// warm-up, so such an instance receives its full weight immediately.
pub const DEFAULT_WARM_UP_TIME_SECS: i64 = 0;

/// Target weight used when an instance declares none.
pub const DEFAULT_WARM_UP_WEIGHT: i32 = 100;

/// Curve exponent used when an instance declares none or a negative one.
pub const DEFAULT_WARM_UP_CURVE: i32 = 2;

/// Injection timestamps newer than `now - gap` are considered not yet
/// stable and are replaced with the observation instant.
pub const DEFAULT_WARM_UP_INJECT_TIME_GAP_MS: u64 = 10 * 60 * 1000;

/// Upper bound on the injection-time cache before a sweep is attempted.
pub const MAX_CACHE_SIZE: usize = 500;

// ── Shutdown propagation headers ───────────────────────────────────

/// Response header announcing the endpoint (`host:port`) that is shutting down.
pub const MARK_SHUTDOWN_SERVICE_ENDPOINT: &str = "x-grace-shutdown-endpoint";

/// Response header naming the service of the instance that is shutting down.
pub const MARK_SHUTDOWN_SERVICE_NAME: &str = "x-grace-shutdown-service";

/// Request header carrying the caller's grace address (`ip:http_server_port`).
pub const GRACE_ADDRESS_HEADER: &str = "x-grace-address";

/// Request header marking the origin of offline notifications.
pub const GRACE_OFFLINE_SOURCE_KEY: &str = "x-grace-offline-source";

/// Value sent with [`GRACE_OFFLINE_SOURCE_KEY`].
pub const GRACE_OFFLINE_SOURCE_VALUE: &str = "grace";

// ── Health endpoint ────────────────────────────────────────────────

/// Path the readiness endpoint is served on.
pub const HEALTH_CHECK_PATH: &str = "/grace/health";

/// Body returned when the instance is ready.
pub const GRACE_HEALTH_OK_MSG: &str = "ok";

/// Body returned when the instance is not ready.
pub const GRACE_FAILURE_MSG: &str = "not ready";

/// Build a `host:port` endpoint string.
pub fn build_endpoint(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_format() {
        assert_eq!(build_endpoint("10.0.0.1", 8080), "10.0.0.1:8080");
    }
}

//! Warm-up metadata exchanged through the service registry.
//!
//! The instance being warmed publishes its settings with
//! [`warm_up_metadata`]; callers read them back per candidate with
//! [`InstanceWarmUpMetadata::from_map`]. Malformed values fall back to the
//! defaults for that field so one bad instance cannot break selection.

use std::collections::HashMap;
use std::str::FromStr;

use tracing::warn;

use grace_core::{
    DEFAULT_WARM_UP_CURVE, DEFAULT_WARM_UP_TIME_SECS, DEFAULT_WARM_UP_WEIGHT, WARM_KEY_CURVE,
    WARM_KEY_INJECT_TIME, WARM_KEY_TIME, WARM_KEY_WEIGHT, WarmUpPolicy,
};

/// Warm-up parameters declared by one candidate instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceWarmUpMetadata {
    /// Declared injection time, verbatim.
    pub injection_timestamp_raw: Option<String>,
    pub warm_up_window_secs: i64,
    pub target_weight: i32,
    pub curve_exponent: i32,
}

impl InstanceWarmUpMetadata {
    pub fn from_map(metadata: &HashMap<String, String>) -> Self {
        let curve = parse_or(metadata, WARM_KEY_CURVE, DEFAULT_WARM_UP_CURVE);
        Self {
            injection_timestamp_raw: metadata.get(WARM_KEY_INJECT_TIME).cloned(),
            warm_up_window_secs: parse_or(metadata, WARM_KEY_TIME, DEFAULT_WARM_UP_TIME_SECS),
            target_weight: parse_or(metadata, WARM_KEY_WEIGHT, DEFAULT_WARM_UP_WEIGHT),
            curve_exponent: if curve < 0 { DEFAULT_WARM_UP_CURVE } else { curve },
        }
    }

    pub fn warm_up_window_ms(&self) -> i64 {
        self.warm_up_window_secs.saturating_mul(1000)
    }
}

impl Default for InstanceWarmUpMetadata {
    fn default() -> Self {
        Self {
            injection_timestamp_raw: None,
            warm_up_window_secs: DEFAULT_WARM_UP_TIME_SECS,
            target_weight: DEFAULT_WARM_UP_WEIGHT,
            curve_exponent: DEFAULT_WARM_UP_CURVE,
        }
    }
}

/// Metadata this instance publishes to its registry so callers can ramp it.
///
/// Empty when warm-up is disabled.
pub fn warm_up_metadata(policy: &WarmUpPolicy, now_ms: u64) -> HashMap<String, String> {
    if !policy.enabled {
        return HashMap::new();
    }
    HashMap::from([
        (WARM_KEY_INJECT_TIME.to_string(), now_ms.to_string()),
        (WARM_KEY_TIME.to_string(), policy.warm_up_secs.to_string()),
        (WARM_KEY_WEIGHT.to_string(), policy.weight.to_string()),
        (WARM_KEY_CURVE.to_string(), policy.curve.to_string()),
    ])
}

fn parse_or<T>(metadata: &HashMap<String, String>, key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match metadata.get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(%key, value = %raw, "malformed warm-up metadata, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn policy(enabled: bool) -> WarmUpPolicy {
        WarmUpPolicy {
            enabled,
            ready_before_warm_up_completes: false,
            warm_up_secs: 10,
            weight: 100,
            curve: 2,
            no_registry_max_wait_secs: 60,
            registry_readiness_wait_secs: 10,
            dual_registry_required: false,
        }
    }

    #[test]
    fn missing_keys_use_defaults() {
        let parsed = InstanceWarmUpMetadata::from_map(&HashMap::new());
        assert_eq!(parsed, InstanceWarmUpMetadata::default());
    }

    #[test]
    fn declared_values_are_parsed() {
        let parsed = InstanceWarmUpMetadata::from_map(&map(&[
            ("injectTime", "1700000000000"),
            ("warmUpTime", "10"),
            ("warmUpWeight", "100"),
            ("warmUpCurve", "2"),
        ]));
        assert_eq!(parsed.injection_timestamp_raw.as_deref(), Some("1700000000000"));
        assert_eq!(parsed.warm_up_window_ms(), 10_000);
        assert_eq!(parsed.target_weight, 100);
        assert_eq!(parsed.curve_exponent, 2);
    }

    #[test]
    fn malformed_fields_fall_back_individually() {
        let parsed = InstanceWarmUpMetadata::from_map(&map(&[
            ("warmUpTime", "ten"),
            ("warmUpWeight", "50"),
            ("warmUpCurve", "steep"),
        ]));
        assert_eq!(parsed.warm_up_window_secs, DEFAULT_WARM_UP_TIME_SECS);
        assert_eq!(parsed.target_weight, 50);
        assert_eq!(parsed.curve_exponent, DEFAULT_WARM_UP_CURVE);
    }

    #[test]
    fn negative_curve_uses_default() {
        let parsed = InstanceWarmUpMetadata::from_map(&map(&[("warmUpCurve", "-4")]));
        assert_eq!(parsed.curve_exponent, DEFAULT_WARM_UP_CURVE);
    }

    #[test]
    fn published_metadata_roundtrips() {
        let published = warm_up_metadata(&policy(true), 1_234);
        let parsed = InstanceWarmUpMetadata::from_map(&published);
        assert_eq!(parsed.injection_timestamp_raw.as_deref(), Some("1234"));
        assert_eq!(parsed.warm_up_window_secs, 10);
    }

    #[test]
    fn disabled_policy_publishes_nothing() {
        assert!(warm_up_metadata(&policy(false), 1_234).is_empty());
    }
}

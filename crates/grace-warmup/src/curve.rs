//! Warm-up weight curve.
//!
//! `weight = round((runtime / window) ^ curve * target)`, clamped to
//! `[1, target]` while the window is open and equal to the target once
//! it has elapsed.

use grace_core::DEFAULT_WARM_UP_CURVE;

/// Weight for an instance that has been warming up for `runtime_ms`.
///
/// A non-positive `window_ms` means warm-up is not configured and the
/// target is returned as-is. A negative `curve` falls back to the default
/// exponent.
///
/// Two cases deliberately do not fall back to the full target weight:
/// - a runtime at or before zero with a positive window is the start of
///   the ramp and yields 1, so an instance whose clock is ahead of ours
///   still ramps;
/// - a non-positive `target` while warming yields 0 rather than 1, since
///   a clamp to `[1, target]` would otherwise exceed the target.
pub fn weight(runtime_ms: i64, window_ms: i64, curve: i32, target: i32) -> i32 {
    if window_ms <= 0 {
        return target;
    }
    let curve = if curve < 0 { DEFAULT_WARM_UP_CURVE } else { curve };

    if runtime_ms >= window_ms {
        return target.max(0);
    }
    if target <= 0 {
        return 0;
    }

    let progress = runtime_ms.max(0) as f64 / window_ms as f64;
    let raw = (progress.powi(curve) * f64::from(target)).round() as i64;
    raw.clamp(1, i64::from(target)) as i32
}

/// Weight for an instance given its injection instant and the current time.
///
/// An injection instant at or before the epoch means the instance never
/// declared one, which is treated the same as no warm-up.
pub fn instance_weight(
    inject_ms: i64,
    now_ms: i64,
    window_ms: i64,
    curve: i32,
    target: i32,
) -> i32 {
    if inject_ms <= 0 {
        return target;
    }
    weight(now_ms - inject_ms, window_ms, curve, target)
}

//! Warm-up aware balancer.
//!
//! Weighs every candidate from its registry metadata and draws one in
//! proportion to its weight. Lock-free apart from the concurrent cache,
//! and safe to share across request-handling threads.

use std::collections::HashMap;

use rand::Rng;
use tracing::debug;

use crate::cache::InjectionTimeCache;
use crate::curve::instance_weight;
use crate::metadata::InstanceWarmUpMetadata;
use crate::selector;

/// A candidate instance as seen by a load-balancing collaborator.
pub trait WarmUpCandidate {
    fn host(&self) -> &str;
    fn port(&self) -> u16;
    fn metadata(&self) -> &HashMap<String, String>;
}

/// A plain candidate instance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Instance {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Instance {
    pub fn new(host: &str, port: u16, metadata: HashMap<String, String>) -> Self {
        Self {
            host: host.to_string(),
            port,
            metadata,
        }
    }

    /// Full address string.
    pub fn endpoint(&self) -> String {
        grace_core::build_endpoint(&self.host, self.port)
    }
}

impl WarmUpCandidate for Instance {
    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}

/// Weight computed for one candidate at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceWeight {
    pub weight: i32,
    /// Whether the candidate's warm-up window has fully elapsed.
    pub warmed_up: bool,
}

/// Picks among candidates, favouring those that have finished warming up.
#[derive(Debug, Default)]
pub struct WarmUpBalancer {
    cache: InjectionTimeCache,
}

impl WarmUpBalancer {
    pub fn new() -> Self {
        Self::with_cache(InjectionTimeCache::new())
    }

    pub fn with_cache(cache: InjectionTimeCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &InjectionTimeCache {
        &self.cache
    }

    /// Compute the current weight of a single candidate.
    pub fn weigh<C: WarmUpCandidate>(&self, candidate: &C, now_ms: u64) -> InstanceWeight {
        let metadata = candidate.metadata();
        let key = InjectionTimeCache::cache_key(candidate.host(), candidate.port(), metadata);
        let inject_ms = self.cache.resolve(&key, metadata, now_ms) as i64;

        let declared = InstanceWarmUpMetadata::from_map(metadata);
        let window_ms = declared.warm_up_window_ms();
        let now = now_ms as i64;

        let weight = instance_weight(
            inject_ms,
            now,
            window_ms,
            declared.curve_exponent,
            declared.target_weight,
        );
        let warmed_up = now - inject_ms > window_ms;
        if !warmed_up {
            debug!(
                host = candidate.host(),
                port = candidate.port(),
                weight,
                "instance is warming up"
            );
        }
        InstanceWeight { weight, warmed_up }
    }

    /// Choose a candidate using the thread-local RNG.
    ///
    /// Returns `None` when the list is empty, when every candidate has
    /// finished warming up, or when no candidate carries positive weight.
    /// The caller then applies its own default selection.
    pub fn choose<'a, C: WarmUpCandidate>(&self, candidates: &'a [C], now_ms: u64) -> Option<&'a C> {
        self.choose_with_rng(candidates, now_ms, &mut rand::thread_rng())
    }

    pub fn choose_with_rng<'a, C, R>(
        &self,
        candidates: &'a [C],
        now_ms: u64,
        rng: &mut R,
    ) -> Option<&'a C>
    where
        C: WarmUpCandidate,
        R: Rng + ?Sized,
    {
        if candidates.is_empty() {
            return None;
        }

        let mut weights = Vec::with_capacity(candidates.len());
        let mut total_weight: i64 = 0;
        let mut all_warmed = true;
        for candidate in candidates {
            let computed = self.weigh(candidate, now_ms);
            all_warmed &= computed.warmed_up;
            total_weight += i64::from(computed.weight.max(0));
            weights.push(computed.weight.max(0));
        }

        if all_warmed {
            return None;
        }
        selector::choose(total_weight, &weights, candidates, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grace_core::{WARM_KEY_CURVE, WARM_KEY_INJECT_TIME, WARM_KEY_TIME, WARM_KEY_WEIGHT};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const T0: u64 = 1_700_000_000_000;
    const GAP: u64 = 60_000;

    fn warm_meta(inject: u64, window: &str, weight: &str, curve: &str) -> HashMap<String, String> {
        HashMap::from([
            (WARM_KEY_INJECT_TIME.to_string(), inject.to_string()),
            (WARM_KEY_TIME.to_string(), window.to_string()),
            (WARM_KEY_WEIGHT.to_string(), weight.to_string()),
            (WARM_KEY_CURVE.to_string(), curve.to_string()),
        ])
    }

    fn balancer() -> WarmUpBalancer {
        WarmUpBalancer::with_cache(InjectionTimeCache::with_limits(500, GAP))
    }

    #[test]
    fn half_window_quadratic_weight() {
        let lb = balancer();
        let instance = Instance::new("10.0.0.1", 8080, warm_meta(T0, "10", "100", "2"));

        // First observation pins the warm-up start to T0.
        let first = lb.weigh(&instance, T0);
        assert!(!first.warmed_up);
        assert_eq!(first.weight, 1);

        let half = lb.weigh(&instance, T0 + 5_000);
        assert_eq!(half.weight, 25);
        assert!(!half.warmed_up);

        let done = lb.weigh(&instance, T0 + 10_001);
        assert_eq!(done.weight, 100);
        assert!(done.warmed_up);
    }

    #[test]
    fn instance_without_metadata_is_warm() {
        let lb = balancer();
        let instance = Instance::new("10.0.0.2", 8080, HashMap::new());
        let w = lb.weigh(&instance, T0);
        assert_eq!(w.weight, 100);
        assert!(w.warmed_up);
    }

    #[test]
    fn all_warm_candidates_defer_to_default() {
        let lb = balancer();
        let candidates = vec![
            Instance::new("10.0.0.1", 8080, HashMap::new()),
            Instance::new("10.0.0.2", 8080, HashMap::new()),
        ];
        assert!(lb.choose(&candidates, T0).is_none());
    }

    #[test]
    fn empty_candidates_return_none() {
        let lb = balancer();
        let candidates: Vec<Instance> = vec![];
        assert!(lb.choose(&candidates, T0).is_none());
    }

    #[test]
    fn warming_instance_receives_less_traffic() {
        let lb = balancer();
        let candidates = vec![
            Instance::new("10.0.0.1", 8080, warm_meta(T0, "100", "100", "1")),
            Instance::new("10.0.0.2", 8080, HashMap::new()),
        ];
        // Pin the warming instance's start, then look 10% into its window.
        lb.weigh(&candidates[0], T0);
        let now = T0 + 10_000;

        let mut rng = StdRng::seed_from_u64(11);
        let warming_picks = (0..5_000)
            .filter_map(|_| lb.choose_with_rng(&candidates, now, &mut rng))
            .filter(|c| c.host == "10.0.0.1")
            .count();
        // Expected share is 10 / 110.
        assert!(warming_picks > 200 && warming_picks < 750, "picked {warming_picks}");
    }

    #[test]
    fn malformed_metadata_does_not_poison_selection() {
        let lb = balancer();
        let mut broken = warm_meta(T0, "10", "100", "2");
        broken.insert(WARM_KEY_TIME.to_string(), "soon".to_string());
        broken.insert(WARM_KEY_INJECT_TIME.to_string(), "garbage".to_string());
        let candidates = vec![
            Instance::new("10.0.0.1", 8080, broken),
            Instance::new("10.0.0.2", 8080, warm_meta(T0, "10", "100", "2")),
        ];

        let mut rng = StdRng::seed_from_u64(5);
        let picked = lb.choose_with_rng(&candidates, T0 + 5_000, &mut rng);
        assert!(picked.is_some());
        assert_eq!(lb.weigh(&candidates[0], T0 + 5_000).weight, 100);
    }

    #[test]
    fn instance_metadata_is_optional_in_json() {
        let instance: Instance =
            serde_json::from_str(r#"{"host":"10.0.0.1","port":8080}"#).unwrap();
        assert!(instance.metadata.is_empty());
    }

    #[test]
    fn endpoint_format() {
        let instance = Instance::new("10.0.0.1", 9090, HashMap::new());
        assert_eq!(instance.endpoint(), "10.0.0.1:9090");
    }
}

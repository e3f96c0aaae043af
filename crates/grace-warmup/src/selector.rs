//! Weighted random selection.
//!
//! Draws `r` uniformly from `[0, total_weight)` and walks the weights in
//! order, subtracting each from `r`; the first index where `r` goes
//! negative wins. O(n) time, O(1) extra space, fresh draw on every call.

use rand::Rng;

/// Choose a candidate with probability proportional to its weight.
///
/// Returns `None` if `total_weight` is not positive, in which case the
/// caller should fall back to its default selection.
pub fn choose<'a, T, R>(
    total_weight: i64,
    weights: &[i32],
    candidates: &'a [T],
    rng: &mut R,
) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    if total_weight <= 0 {
        return None;
    }
    let mut position = rng.gen_range(0..total_weight);
    for (index, weight) in weights.iter().enumerate() {
        position -= i64::from(*weight);
        if position < 0 {
            return candidates.get(index);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn zero_total_weight_returns_none() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(choose(0, &[0, 0], &["a", "b"], &mut rng), None);
        assert_eq!(choose(-3, &[1, 1], &["a", "b"], &mut rng), None);
    }

    #[test]
    fn single_nonzero_weight_always_wins() {
        let candidates = ["a", "b", "c", "d"];
        let weights = [0, 0, 17, 0];
        for seed in 0..500 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(choose(17, &weights, &candidates, &mut rng), Some(&"c"));
        }
    }

    #[test]
    fn draws_are_roughly_proportional() {
        let candidates = ["light", "heavy"];
        let weights = [25, 75];
        let mut rng = StdRng::seed_from_u64(42);

        let heavy = (0..10_000)
            .filter(|_| choose(100, &weights, &candidates, &mut rng) == Some(&"heavy"))
            .count();
        assert!((7_000..8_000).contains(&heavy), "heavy chosen {heavy} times");
    }

    #[test]
    fn total_larger_than_sum_can_miss() {
        // A caller passing an inflated total gets `None` for draws past the last bucket.
        let mut rng = StdRng::seed_from_u64(1);
        let misses = (0..1_000)
            .filter(|_| choose(10, &[1], &["only"], &mut rng).is_none())
            .count();
        assert!(misses > 0);
    }

    #[test]
    fn every_call_draws_fresh() {
        let candidates = ["a", "b"];
        let mut rng = StdRng::seed_from_u64(3);
        let picks: Vec<_> = (0..200)
            .filter_map(|_| choose(2, &[1, 1], &candidates, &mut rng))
            .collect();
        assert!(picks.contains(&&"a"));
        assert!(picks.contains(&&"b"));
    }
}

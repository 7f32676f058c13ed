use rand::Rng;
use rand::seq::SliceRandom;

/// Returns how many of `total` keys an audit samples.
///
/// The size is `floor(total * fraction)`, raised to `min_sample_size` (capped at `total`) so
/// that small domains are not skipped. When that still yields zero on a non empty domain the
/// whole domain is sampled.
pub fn sample_size(total: usize, fraction: f64, min_sample_size: usize) -> usize {
    let fractional = (total as f64 * fraction).floor() as usize;
    let size = fractional.max(min_sample_size).min(total);

    if size == 0 { total } else { size }
}

/// Picks `size` distinct keys uniformly at random, without replacement.
pub fn sample_keys<K: Clone, G: Rng + ?Sized>(keys: &[K], size: usize, rng: &mut G) -> Vec<K> {
    keys.choose_multiple(rng, size).cloned().collect()
}

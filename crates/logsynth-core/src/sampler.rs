use crate::error::ConfigError;
use crate::rank::RankDistribution;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Prefix sums of key weights, built once and read-only afterwards.
///
/// Entry `i` holds `S_i = w_0 + ... + w_i`. A draw picks `u` uniformly in
/// `[0, S_{n-1})` and binary-searches for the smallest `i` with `S_i > u`, so
/// key `i` owns the half-open slice `[S_{i-1}, S_i)` of the total mass.
///
/// Cloning shares the underlying table. The table is `Send + Sync`; the
/// randomness always comes from the caller.
#[derive(Clone, Debug)]
pub struct CumulativeTable {
    sums: Arc<[f64]>,
    /// Highest key with non-zero weight. Draws are clamped here so that
    /// floating-point rounding at the top of the range never selects a
    /// zero-weight key.
    last_live: usize,
}

impl CumulativeTable {
    /// Table over `n` keys weighted by rank.
    pub fn from_rank(n: u64, dist: RankDistribution) -> Result<Self, ConfigError> {
        if n == 0 {
            return Err(ConfigError::EmptyUniverse("key"));
        }
        let len = usize::try_from(n).map_err(|_| ConfigError::UniverseTooLarge {
            name: "key",
            size: n,
            max: usize::MAX as u64,
        })?;

        let mut sums = Vec::with_capacity(len);
        let mut running = 0.0;
        for rank in 0..n {
            running += dist.weight(rank);
            sums.push(running);
        }

        Ok(Self {
            sums: sums.into(),
            last_live: len - 1,
        })
    }

    /// Table over `weights.len()` keys with explicit, unnormalized weights.
    pub fn from_weights(weights: &[f64]) -> Result<Self, ConfigError> {
        if weights.is_empty() {
            return Err(ConfigError::EmptyUniverse("key"));
        }

        let mut sums = Vec::with_capacity(weights.len());
        let mut running = 0.0;
        let mut last_live = None;
        for (key, &w) in weights.iter().enumerate() {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::InvalidWeights(format!(
                    "weight of key {key} is {w}, expected a finite non-negative number"
                )));
            }
            if w > 0.0 {
                last_live = Some(key);
            }
            running += w;
            sums.push(running);
        }

        let last_live = last_live.ok_or_else(|| {
            ConfigError::InvalidWeights("at least one weight must be positive".to_string())
        })?;
        if !running.is_finite() {
            return Err(ConfigError::InvalidWeights(
                "total weight overflows".to_string(),
            ));
        }

        Ok(Self {
            sums: sums.into(),
            last_live,
        })
    }

    /// Number of keys.
    pub fn len(&self) -> u64 {
        self.sums.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Total unnormalized mass `S_{n-1}`.
    pub fn total(&self) -> f64 {
        self.sums[self.sums.len() - 1]
    }

    /// Probability that a draw returns `key`.
    pub fn probability(&self, key: u64) -> f64 {
        let Ok(i) = usize::try_from(key) else {
            return 0.0;
        };
        if i >= self.sums.len() {
            return 0.0;
        }
        let below = if i == 0 { 0.0 } else { self.sums[i - 1] };
        (self.sums[i] - below) / self.total()
    }

    /// Draw one key in O(log n).
    #[inline]
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let u = rng.gen::<f64>() * self.total();
        let key = self.sums.partition_point(|&s| s <= u);
        key.min(self.last_live) as u64
    }
}

impl Distribution<u64> for CumulativeTable {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        self.draw(rng)
    }
}

/// Draws integer keys in `0..n` with probability proportional to their weight
/// and renders them as plain base-10 text.
///
/// Each sampler owns its random source, so seeding that source makes the
/// whole draw sequence reproducible.
pub struct WeightedKeySampler<R = StdRng> {
    table: CumulativeTable,
    skew: Option<f64>,
    rng: R,
}

impl<R: Rng> WeightedKeySampler<R> {
    /// Rank-biased sampler over `n` keys: `P(i) ∝ (i + 1)^(-alpha)`.
    pub fn new(n: u64, alpha: f64, rng: R) -> Result<Self, ConfigError> {
        let dist = RankDistribution::new(alpha)?;
        let table = CumulativeTable::from_rank(n, dist)?;
        tracing::debug!(keys = n, skew = alpha, "built rank sampler");
        Ok(Self {
            table,
            skew: Some(alpha),
            rng,
        })
    }

    /// Sampler over `weights.len()` keys with explicit weights.
    pub fn from_weights(weights: &[f64], rng: R) -> Result<Self, ConfigError> {
        let table = CumulativeTable::from_weights(weights)?;
        tracing::debug!(keys = weights.len(), "built weighted sampler");
        Ok(Self {
            table,
            skew: None,
            rng,
        })
    }

    /// Reuse an existing table with a fresh random source.
    pub fn with_table(table: CumulativeTable, rng: R) -> Self {
        Self {
            table,
            skew: None,
            rng,
        }
    }

    /// Next key as an integer.
    #[inline]
    pub fn sample_key(&mut self) -> u64 {
        self.table.draw(&mut self.rng)
    }

    /// Next key as its decimal text form.
    pub fn sample(&mut self) -> String {
        self.sample_key().to_string()
    }

    pub fn len(&self) -> u64 {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Skew the sampler was built with, `None` for explicit weights.
    pub fn skew(&self) -> Option<f64> {
        self.skew
    }

    pub fn probability(&self, key: u64) -> f64 {
        self.table.probability(key)
    }

    pub fn table(&self) -> &CumulativeTable {
        &self.table
    }

    /// Mutable access to the owned random source, for callers that draw
    /// other quantities from the same stream.
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}

impl WeightedKeySampler<StdRng> {
    /// Rank-biased sampler with a deterministic `StdRng`.
    pub fn seeded(n: u64, alpha: f64, seed: u64) -> Result<Self, ConfigError> {
        Self::new(n, alpha, StdRng::seed_from_u64(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{chi_squared, histogram, relative_entropy};
    use std::thread;

    fn counts(sampler: &mut WeightedKeySampler, samples: usize) -> Vec<u64> {
        let n = sampler.len() as usize;
        let keys: Vec<u64> = (0..samples).map(|_| sampler.sample_key()).collect();
        histogram(&keys, n)
    }

    fn tolerance(n: usize) -> f64 {
        n as f64 + 6.0 * (2.0 * n as f64).sqrt()
    }

    #[test]
    fn single_key_universe_always_returns_zero() {
        for alpha in [0.0, 0.3, 1.0] {
            let mut sampler = WeightedKeySampler::seeded(1, alpha, 7).unwrap();
            for _ in 0..1000 {
                assert_eq!(sampler.sample(), "0");
            }
        }
    }

    #[test]
    fn invalid_parameters_fail_at_construction() {
        assert!(matches!(
            WeightedKeySampler::seeded(10, 1.2, 1),
            Err(ConfigError::InvalidSkew(_))
        ));
        assert!(matches!(
            WeightedKeySampler::seeded(10, -0.5, 1),
            Err(ConfigError::InvalidSkew(_))
        ));
        assert!(matches!(
            WeightedKeySampler::seeded(0, 0.5, 1),
            Err(ConfigError::EmptyUniverse(_))
        ));
    }

    #[test]
    fn keys_render_as_plain_decimal() {
        let mut sampler = WeightedKeySampler::seeded(50_000, 0.2, 3).unwrap();
        for _ in 0..10_000 {
            let text = sampler.sample();
            let key: u64 = text.parse().unwrap();
            assert!(key < 50_000);
            assert_eq!(text, key.to_string());
        }
    }

    #[test]
    fn uniform_when_skew_is_zero() {
        let n = 1000;
        let mut sampler = WeightedKeySampler::seeded(n, 0.0, 42).unwrap();
        let counts = counts(&mut sampler, 100_000);
        let p = vec![1.0 / n as f64; n as usize];

        let chi2 = chi_squared(&counts, &p);
        assert!(chi2 < tolerance(n as usize), "chi2 = {chi2}");
        assert!(counts.iter().all(|&c| c > 0));
    }

    #[test]
    fn matches_rank_distribution() {
        let n = 1000;
        for (seed, alpha) in [(1, 0.5), (2, 1.0), (3, 0.3)] {
            let mut sampler = WeightedKeySampler::seeded(n, alpha, seed).unwrap();
            let counts = counts(&mut sampler, 100_000);
            let p = RankDistribution::new(alpha).unwrap().probabilities(n);

            let chi2 = chi_squared(&counts, &p);
            assert!(chi2 < tolerance(n as usize), "alpha = {alpha}, chi2 = {chi2}");
        }
    }

    #[test]
    fn relative_entropy_shrinks_with_more_samples() {
        let n = 100;
        let p = RankDistribution::new(0.8).unwrap().probabilities(n);

        let mut sampler = WeightedKeySampler::seeded(n, 0.8, 11).unwrap();
        let small = relative_entropy(&counts(&mut sampler, 10_000), &p);
        let large = relative_entropy(&counts(&mut sampler, 200_000), &p);

        assert!(large < small, "small = {small}, large = {large}");
        assert!(large < 0.002);
    }

    #[test]
    fn head_dominates_under_skew() {
        let mut sampler = WeightedKeySampler::seeded(10_000, 1.0, 5).unwrap();
        let counts = counts(&mut sampler, 50_000);
        let head: u64 = counts[..10].iter().sum();
        let tail: u64 = counts[5000..5010].iter().sum();
        assert!(head > 20 * tail.max(1));
    }

    #[test]
    fn explicit_weights_skip_zero_keys() {
        let mut sampler =
            WeightedKeySampler::from_weights(&[0.0, 3.0, 0.0, 1.0, 0.0], StdRng::seed_from_u64(9))
                .unwrap();
        assert_eq!(sampler.skew(), None);
        assert_eq!(sampler.probability(1), 0.75);
        assert_eq!(sampler.probability(4), 0.0);

        let counts = counts(&mut sampler, 20_000);
        assert_eq!(counts[0], 0);
        assert_eq!(counts[2], 0);
        assert_eq!(counts[4], 0);
        let ratio = counts[1] as f64 / counts[3] as f64;
        assert!((ratio - 3.0).abs() < 0.3, "ratio = {ratio}");
    }

    #[test]
    fn explicit_weights_are_validated() {
        let rng = || StdRng::seed_from_u64(0);
        assert!(WeightedKeySampler::from_weights(&[], rng()).is_err());
        assert!(WeightedKeySampler::from_weights(&[0.0, 0.0], rng()).is_err());
        assert!(WeightedKeySampler::from_weights(&[1.0, -1.0], rng()).is_err());
        assert!(WeightedKeySampler::from_weights(&[1.0, f64::NAN], rng()).is_err());
        assert!(WeightedKeySampler::from_weights(&[f64::MAX, f64::MAX], rng()).is_err());
    }

    #[test]
    fn same_seed_same_draws() {
        let mut a = WeightedKeySampler::seeded(30_000, 0.9, 1234).unwrap();
        let mut b = WeightedKeySampler::seeded(30_000, 0.9, 1234).unwrap();
        let xs: Vec<String> = (0..500).map(|_| a.sample()).collect();
        let ys: Vec<String> = (0..500).map(|_| b.sample()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn table_is_shareable_across_threads() {
        let table = CumulativeTable::from_rank(500, RankDistribution::new(0.6).unwrap()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|seed| {
                let table = table.clone();
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    (0..1000).map(|_| table.draw(&mut rng)).max().unwrap()
                })
            })
            .collect();

        for h in handles {
            assert!(h.join().unwrap() < 500);
        }
    }

    #[test]
    fn probability_matches_rank_weights() {
        let table = CumulativeTable::from_rank(4, RankDistribution::new(1.0).unwrap()).unwrap();
        let total = 1.0 + 0.5 + 1.0 / 3.0 + 0.25;
        assert!((table.total() - total).abs() < 1e-12);
        assert!((table.probability(0) - 1.0 / total).abs() < 1e-12);
        assert!((table.probability(3) - 0.25 / total).abs() < 1e-12);
        assert_eq!(table.probability(4), 0.0);
    }

    #[test]
    fn works_as_rand_distribution() {
        let table = CumulativeTable::from_rank(10, RankDistribution::uniform()).unwrap();
        let rng = StdRng::seed_from_u64(99);
        let keys: Vec<u64> = table.sample_iter(rng).take(100).collect();
        assert!(keys.iter().all(|&k| k < 10));
    }
}

use crate::error::ConfigError;

/// Rank-biased power-law weighting.
///
/// The key at rank `r` (0-based) gets the unnormalized weight `(r + 1)^(-alpha)`.
/// `alpha = 0` weights every rank equally, `alpha = 1` is classic Zipf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankDistribution {
    alpha: f64,
}

impl RankDistribution {
    pub fn new(alpha: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&alpha) {
            // NaN fails `contains` as well
            return Err(ConfigError::InvalidSkew(alpha));
        }
        Ok(Self { alpha })
    }

    /// Uniform weighting (`alpha = 0`).
    pub fn uniform() -> Self {
        Self { alpha: 0.0 }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[inline]
    pub fn weight(&self, rank: u64) -> f64 {
        if self.alpha == 0.0 {
            return 1.0;
        }
        (rank as f64 + 1.0).powf(-self.alpha)
    }

    /// Sum of the weights of ranks `0..n`.
    pub fn total_weight(&self, n: u64) -> f64 {
        (0..n).map(|rank| self.weight(rank)).sum()
    }

    /// Normalized probability of `rank` in a universe of `n` keys.
    pub fn probability(&self, rank: u64, n: u64) -> f64 {
        if rank >= n {
            return 0.0;
        }
        self.weight(rank) / self.total_weight(n)
    }

    /// Normalized probabilities of every rank in a universe of `n` keys.
    pub fn probabilities(&self, n: u64) -> Vec<f64> {
        let weights: Vec<f64> = (0..n).map(|rank| self.weight(rank)).collect();
        let total: f64 = weights.iter().sum();
        weights.into_iter().map(|w| w / total).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_skew_outside_unit_interval() {
        assert_eq!(
            RankDistribution::new(-0.1),
            Err(ConfigError::InvalidSkew(-0.1))
        );
        assert_eq!(RankDistribution::new(1.5), Err(ConfigError::InvalidSkew(1.5)));
        assert!(RankDistribution::new(f64::NAN).is_err());
        assert!(RankDistribution::new(0.0).is_ok());
        assert!(RankDistribution::new(1.0).is_ok());
    }

    #[test]
    fn zero_skew_is_uniform() {
        let dist = RankDistribution::uniform();
        assert_eq!(dist.weight(0), 1.0);
        assert_eq!(dist.weight(999), 1.0);
        assert!((dist.probability(7, 10) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn weights_follow_power_law() {
        let dist = RankDistribution::new(1.0).unwrap();
        assert_eq!(dist.weight(0), 1.0);
        assert!((dist.weight(1) - 0.5).abs() < 1e-12);
        assert!((dist.weight(3) - 0.25).abs() < 1e-12);

        let half = RankDistribution::new(0.5).unwrap();
        assert!((half.weight(3) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let dist = RankDistribution::new(0.7).unwrap();
        let total: f64 = dist.probabilities(1000).iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(dist.probability(1000, 1000), 0.0);
    }
}

//! Goodness-of-fit helpers for checking sampled key frequencies against the
//! distribution they were drawn from.

use crate::sampler::CumulativeTable;
use rand::Rng;
use serde::Serialize;
use std::ops::Neg;

/// Count occurrences of each key in `0..n`. Keys outside the range are ignored.
pub fn histogram(keys: &[u64], n: usize) -> Vec<u64> {
    let mut counts = vec![0u64; n];
    for &key in keys {
        if let Some(slot) = usize::try_from(key).ok().and_then(|k| counts.get_mut(k)) {
            *slot += 1;
        }
    }
    counts
}

/// Pearson's chi-squared statistic of observed `counts` against expected
/// `probabilities`.
///
/// For a correct sampler the statistic has mean `n - 1`, so `chi2 / n` should
/// hover near one regardless of the sample count. Keys with zero expected
/// probability contribute nothing.
///
/// # Panics
///
/// Panics if `counts` and `probabilities` differ in length.
pub fn chi_squared(counts: &[u64], probabilities: &[f64]) -> f64 {
    assert_eq!(
        counts.len(),
        probabilities.len(),
        "counts and probabilities must have the same length"
    );
    let total: u64 = counts.iter().sum();
    let total = total as f64;

    counts
        .iter()
        .zip(probabilities)
        .filter(|&(_, &p)| p > 0.0)
        .map(|(&observed, &p)| {
            let expected = p * total;
            let deviation = observed as f64 - expected;
            deviation * deviation / expected
        })
        .sum()
}

/// Relative entropy (Kullback-Leibler divergence, in nats) of the empirical
/// distribution in `counts` from `probabilities`.
///
/// Shrinks toward zero as the sample count grows, roughly as `(n - 1) / 2N`.
///
/// # Panics
///
/// Panics if `counts` and `probabilities` differ in length.
pub fn relative_entropy(counts: &[u64], probabilities: &[f64]) -> f64 {
    assert_eq!(
        counts.len(),
        probabilities.len(),
        "counts and probabilities must have the same length"
    );
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;

    counts
        .iter()
        .zip(probabilities)
        .filter(|&(&c, _)| c > 0)
        .map(|(&c, &p)| {
            let observed = c as f64 / total;
            observed * (observed / p).ln()
        })
        .sum()
}

/// Shannon entropy in bits.
pub fn entropy(probabilities: &[f64]) -> f64 {
    probabilities
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.log2())
        .sum::<f64>()
        .neg()
}

/// Result of drawing from a table and comparing against its own weights.
#[derive(Debug, Clone, Serialize)]
pub struct GoodnessOfFit {
    pub keys: u64,
    pub samples: u64,
    pub chi_squared: f64,
    /// `chi_squared / (keys - 1)`; near one for a correct sampler.
    pub chi_squared_ratio: f64,
    pub relative_entropy: f64,
    pub entropy_bits: f64,
}

/// Draw `samples` keys from `table` and measure how well they fit.
pub fn goodness_of_fit<R: Rng + ?Sized>(
    table: &CumulativeTable,
    rng: &mut R,
    samples: u64,
) -> GoodnessOfFit {
    let n = table.len() as usize;
    let mut counts = vec![0u64; n];
    for _ in 0..samples {
        counts[table.draw(rng) as usize] += 1;
    }
    let probabilities: Vec<f64> = (0..n as u64).map(|k| table.probability(k)).collect();

    let chi2 = chi_squared(&counts, &probabilities);
    let dof = (n.max(2) - 1) as f64;
    GoodnessOfFit {
        keys: n as u64,
        samples,
        chi_squared: chi2,
        chi_squared_ratio: chi2 / dof,
        relative_entropy: relative_entropy(&counts, &probabilities),
        entropy_bits: entropy(&probabilities),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::RankDistribution;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_histogram() {
        assert_eq!(histogram(&[0, 2, 2, 9, 1, 2], 3), vec![1, 1, 3]);
    }

    #[test]
    fn test_chi_squared_of_exact_fit_is_zero() {
        let counts = [25, 25, 50];
        let p = [0.25, 0.25, 0.5];
        assert_eq!(chi_squared(&counts, &p), 0.0);
    }

    #[test]
    fn test_chi_squared() {
        // (60-50)^2/50 + (40-50)^2/50
        let counts = [60, 40];
        assert!((chi_squared(&counts, &[0.5, 0.5]) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_relative_entropy() {
        assert_eq!(relative_entropy(&[5, 5], &[0.5, 0.5]), 0.0);
        let d = relative_entropy(&[10, 0], &[0.5, 0.5]);
        assert!((d - std::f64::consts::LN_2).abs() < 1e-12);
        assert_eq!(relative_entropy(&[0, 0], &[0.5, 0.5]), 0.0);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_chi_squared_length_mismatch() {
        chi_squared(&[1, 2, 3], &[0.5, 0.5]);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_relative_entropy_length_mismatch() {
        relative_entropy(&[1], &[0.5, 0.5]);
    }

    #[test]
    fn test_entropy() {
        let p = [0.3, 0.3, 0.4];
        assert_eq!("1.57", format!("{:.2}", entropy(&p)));
    }

    #[test]
    fn test_goodness_of_fit_on_uniform_table() {
        let table = CumulativeTable::from_rank(200, RankDistribution::uniform()).unwrap();
        let mut rng = StdRng::seed_from_u64(17);
        let fit = goodness_of_fit(&table, &mut rng, 200_000);

        assert_eq!(fit.keys, 200);
        assert_eq!(fit.samples, 200_000);
        assert!(fit.chi_squared_ratio < 1.5, "ratio = {}", fit.chi_squared_ratio);
        assert!((fit.entropy_bits - 200f64.log2()).abs() < 1e-9);
    }
}

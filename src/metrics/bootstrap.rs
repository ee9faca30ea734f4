//! Percentile bootstrap confidence intervals.
//!
//! The random source is always passed in. Production callers seed a
//! `ChaCha8Rng` so a report can be regenerated bit-for-bit; tests can pass
//! any `Rng`, including scripted ones.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

pub const DEFAULT_RESAMPLES: usize = 10_000;
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Two-sided `(1 - alpha)` interval around a point estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub point: f64,
}

/// Resampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub resamples: usize,
    pub alpha: f64,
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            resamples: DEFAULT_RESAMPLES,
            alpha: DEFAULT_ALPHA,
            seed: 42,
        }
    }
}

impl BootstrapConfig {
    pub fn validate(&self) -> Result<(), BootstrapError> {
        if self.resamples == 0 {
            return Err(BootstrapError::ZeroResamples);
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(BootstrapError::InvalidAlpha(self.alpha));
        }
        Ok(())
    }

    /// Mean CI with this config's seeded generator.
    pub fn mean_ci(&self, data: &[f64]) -> Result<ConfidenceInterval, BootstrapError> {
        bootstrap_mean_ci(data, self.resamples, self.alpha, self.seed)
    }
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().mean()
}

/// Bootstrap CI of `statistic` over `data`.
///
/// Draws `resamples` samples of `data.len()` elements, uniformly with
/// replacement from `rng`, evaluates `statistic` on each, sorts the results
/// and reads the bounds at ranks `floor(alpha/2 * resamples)` and
/// `floor((1 - alpha/2) * resamples)`. The point estimate is `statistic`
/// on the original data. Empty `data` yields an all-zero interval.
pub fn bootstrap_ci<R, F>(
    data: &[f64],
    statistic: F,
    resamples: usize,
    alpha: f64,
    rng: &mut R,
) -> Result<ConfidenceInterval, BootstrapError>
where
    R: Rng + ?Sized,
    F: Fn(&[f64]) -> f64,
{
    BootstrapConfig {
        resamples,
        alpha,
        seed: 0,
    }
    .validate()?;

    if data.is_empty() {
        return Ok(ConfidenceInterval::default());
    }

    let point = statistic(data);
    let n = data.len();

    let mut sample = vec![0.0; n];
    let mut stats = Vec::with_capacity(resamples);
    for _ in 0..resamples {
        for slot in sample.iter_mut() {
            *slot = data[rng.gen_range(0..n)];
        }
        stats.push(statistic(&sample));
    }

    stats.sort_by(|a, b| a.total_cmp(b));

    let last = resamples - 1;
    let lower_idx = ((alpha / 2.0) * resamples as f64).floor() as usize;
    let upper_idx = ((1.0 - alpha / 2.0) * resamples as f64).floor() as usize;

    Ok(ConfidenceInterval {
        lower: stats[lower_idx.min(last)],
        upper: stats[upper_idx.min(last)],
        point,
    })
}

/// Bootstrap CI of the mean using a `ChaCha8Rng` seeded with `seed`.
pub fn bootstrap_mean_ci(
    data: &[f64],
    resamples: usize,
    alpha: f64,
    seed: u64,
) -> Result<ConfidenceInterval, BootstrapError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    bootstrap_ci(data, mean, resamples, alpha, &mut rng)
}

/// Invalid resampling parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BootstrapError {
    ZeroResamples,
    InvalidAlpha(f64),
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroResamples => write!(f, "bootstrap needs at least one resample"),
            Self::InvalidAlpha(a) => write!(f, "alpha must be in (0, 1), got {}", a),
        }
    }
}

impl std::error::Error for BootstrapError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_empty_data_is_zero() {
        let ci = bootstrap_mean_ci(&[], 100, 0.05, 1).unwrap();
        assert_eq!(ci, ConfidenceInterval::default());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert_eq!(
            bootstrap_mean_ci(&[1.0], 0, 0.05, 1).unwrap_err(),
            BootstrapError::ZeroResamples
        );
        assert!(matches!(
            bootstrap_mean_ci(&[1.0], 10, 1.0, 1),
            Err(BootstrapError::InvalidAlpha(_))
        ));
        assert!(matches!(
            bootstrap_mean_ci(&[1.0], 10, f64::NAN, 1),
            Err(BootstrapError::InvalidAlpha(_))
        ));
    }

    #[test]
    fn test_point_is_plain_statistic() {
        let data = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        for resamples in [1, 7, 250] {
            let ci = bootstrap_mean_ci(&data, resamples, 0.05, 9).unwrap();
            assert_eq!(ci.point, mean(&data));
        }
    }

    #[test]
    fn test_constant_data_has_degenerate_interval() {
        let ci = bootstrap_mean_ci(&[5.0; 6], 200, 0.1, 3).unwrap();
        assert_eq!((ci.lower, ci.point, ci.upper), (5.0, 5.0, 5.0));
    }

    #[test]
    fn test_scripted_draws_give_exact_distribution() {
        // Draws alternate 0, 2^63, 0, ... which map to indices 0, 1, 0, ...
        // of a two-element slice, so every resample is [data[0], data[1]].
        let mut rng = StepRng::new(0, 1 << 63);
        let first = |s: &[f64]| s[0];
        let ci = bootstrap_ci(&[10.0, 20.0], first, 4, 0.5, &mut rng).unwrap();
        assert_eq!(ci, ConfidenceInterval { lower: 10.0, upper: 10.0, point: 10.0 });
    }

    #[test]
    fn test_matches_replayed_draws() {
        let data = [2.0, 7.0, 1.0, 8.0, 2.0, 8.0];
        let resamples = 40;
        let alpha = 0.1;

        let ci = bootstrap_mean_ci(&data, resamples, alpha, 77).unwrap();

        // Replay the same generator by hand.
        let mut rng = ChaCha8Rng::seed_from_u64(77);
        let mut stats: Vec<f64> = (0..resamples)
            .map(|_| {
                let s: Vec<f64> = (0..data.len()).map(|_| data[rng.gen_range(0..data.len())]).collect();
                mean(&s)
            })
            .collect();
        stats.sort_by(|a, b| a.total_cmp(b));

        assert_eq!(ci.lower, stats[2]); // floor(0.05 * 40)
        assert_eq!(ci.upper, stats[38]); // floor(0.95 * 40)
        assert!(ci.lower <= ci.point && ci.point <= ci.upper);
    }

    #[test]
    fn test_same_seed_same_interval() {
        let data: Vec<f64> = (0..30).map(|i| (i % 7) as f64).collect();
        let a = bootstrap_mean_ci(&data, 500, 0.05, 1234).unwrap();
        let b = bootstrap_mean_ci(&data, 500, 0.05, 1234).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_coverage_across_seeded_runs() {
        // Uniform(0, 1) samples; true mean 0.5.
        let runs = 100;
        let mut covered = 0;
        for seed in 0..runs {
            let mut data_rng = ChaCha8Rng::seed_from_u64(10_000 + seed);
            let data: Vec<f64> = (0..60).map(|_| data_rng.gen::<f64>()).collect();
            let ci = bootstrap_mean_ci(&data, 400, 0.05, seed).unwrap();
            assert!(ci.lower <= ci.upper);
            if ci.lower <= 0.5 && 0.5 <= ci.upper {
                covered += 1;
            }
        }
        let coverage = covered as f64 / runs as f64;
        assert!(coverage >= 0.8, "coverage {coverage} too low for a 95% interval");
    }
}

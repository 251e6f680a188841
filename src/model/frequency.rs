//! Recency-weighted threshold frequencies with small-sample smoothing.

use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, Binomial, ContinuousCDF, Discrete};

use super::confidence::{Confidence, ConfidenceClassifier};
use super::weights::{check_alpha, recency_weights};
use crate::error::EstimationError;

/// z for a two-sided 95% interval
const Z_95: f64 = 1.959_963_984_540_054;

/// p-values below this are reported as significant.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Pseudo-counts added before computing the smoothed estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaPrior {
  pub successes: f64,
  pub failures: f64,
}

impl BetaPrior {
  /// Beta(1, 1): one pseudo-success and one pseudo-failure.
  pub const UNIFORM: BetaPrior = BetaPrior {
    successes: 1.0,
    failures: 1.0,
  };

  /// Posterior mean after `successes` out of `trials`.
  pub fn posterior_mean(&self, successes: usize, trials: usize) -> f64 {
    (successes as f64 + self.successes) / (trials as f64 + self.successes + self.failures)
  }

  /// Posterior summary after `successes` out of `trials`.
  pub fn smooth(&self, successes: usize, trials: usize) -> SmoothedEstimate {
    let alpha = self.successes + successes as f64;
    let beta = self.failures + trials.saturating_sub(successes) as f64;
    let effective_sample_size = alpha + beta;

    let credible_interval = Beta::new(alpha, beta)
      .ok()
      .map(|posterior| Interval {
        lower: posterior.inverse_cdf(0.025),
        upper: posterior.inverse_cdf(0.975),
      })
      .unwrap_or(Interval {
        lower: 0.0,
        upper: 1.0,
      });

    SmoothedEstimate {
      probability: alpha / effective_sample_size,
      credible_interval,
      effective_sample_size,
      shrinkage_factor: (self.successes + self.failures) / effective_sample_size,
    }
  }
}

impl Default for BetaPrior {
  fn default() -> Self {
    Self::UNIFORM
  }
}

/// Tunables for [`FrequencyEstimator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorParams {
  /// Recency factor in (0, 1]; 1 weights every game equally
  pub alpha: f64,
  /// Smoothed estimates are reported below this many observations
  pub small_sample_threshold: usize,
  pub prior: BetaPrior,
}

impl Default for EstimatorParams {
  fn default() -> Self {
    Self {
      alpha: 0.85,
      small_sample_threshold: 10,
      prior: BetaPrior::UNIFORM,
    }
  }
}

/// Lower and upper bound of a proportion interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
  pub lower: f64,
  pub upper: f64,
}

/// Beta-binomial posterior for a small sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedEstimate {
  /// Posterior mean
  pub probability: f64,
  /// 95% equal-tailed credible interval
  pub credible_interval: Interval,
  /// Posterior alpha + beta
  pub effective_sample_size: f64,
  /// Share of the effective sample contributed by the prior
  pub shrinkage_factor: f64,
}

/// One (stat, threshold) estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
  pub threshold: f64,
  /// Plain fraction of games at or above the threshold
  pub frequency: f64,
  /// Same fraction under recency weights
  pub weighted_frequency: f64,
  /// Same fraction under career-phase decay weights, when enabled
  pub career_weighted_frequency: Option<f64>,
  /// Beta-prior posterior, reported for small samples only
  pub smoothed: Option<SmoothedEstimate>,
  pub n_exceeds: usize,
  pub n_total: usize,
  /// 95% Wilson score interval for `frequency`
  pub interval: Interval,
  /// Two-sided binomial test of `frequency` against even odds
  pub p_value: f64,
  pub significant: bool,
  pub confidence: Confidence,
}

impl ThresholdResult {
  pub fn smoothed_frequency(&self) -> Option<f64> {
    self.smoothed.map(|s| s.probability)
  }

  /// The number to show: smoothed, else career-weighted, else recency-weighted.
  pub fn probability(&self) -> f64 {
    self
      .smoothed_frequency()
      .or(self.career_weighted_frequency)
      .unwrap_or(self.weighted_frequency)
  }

  /// Chance of falling short of the threshold, from the plain frequency.
  pub fn inverse_probability(&self) -> f64 {
    1.0 - self.frequency
  }

  pub fn weighted_inverse_probability(&self) -> f64 {
    1.0 - self.weighted_frequency
  }

  pub fn career_weighted_inverse_probability(&self) -> Option<f64> {
    self.career_weighted_frequency.map(|f| 1.0 - f)
  }
}

/// Estimates how often a stat line meets each threshold.
///
/// Observations are taken in the order given (oldest first); the weighting
/// depends on position, so callers must not hand in unsorted games.
#[derive(Debug, Clone, Default)]
pub struct FrequencyEstimator {
  params: EstimatorParams,
  classifier: ConfidenceClassifier,
}

impl FrequencyEstimator {
  pub fn new(
    params: EstimatorParams,
    classifier: ConfidenceClassifier,
  ) -> Result<Self, EstimationError> {
    check_alpha(params.alpha)?;
    Ok(Self { params, classifier })
  }

  pub fn params(&self) -> &EstimatorParams {
    &self.params
  }

  /// Estimate every threshold with recency weights only.
  pub fn estimate(
    &self,
    observations: &[f64],
    thresholds: &[f64],
  ) -> Result<Vec<ThresholdResult>, EstimationError> {
    self.estimate_with_career(observations, thresholds, None)
  }

  /// Estimate every threshold, also reporting the frequency under
  /// `career_weights` when supplied (one normalized weight per observation).
  ///
  /// Thresholds are deduplicated and sorted ascending; non-finite thresholds
  /// are dropped.
  pub fn estimate_with_career(
    &self,
    observations: &[f64],
    thresholds: &[f64],
    career_weights: Option<&[f64]>,
  ) -> Result<Vec<ThresholdResult>, EstimationError> {
    let n = observations.len();
    if n == 0 {
      return Err(EstimationError::NoObservations);
    }
    if let Some(weights) = career_weights {
      if weights.len() != n {
        return Err(EstimationError::WeightLengthMismatch {
          weights: weights.len(),
          observations: n,
        });
      }
    }

    let recency = recency_weights(n, self.params.alpha)?;

    Ok(
      normalize_thresholds(thresholds)
        .into_iter()
        .map(|threshold| self.estimate_one(observations, threshold, &recency, career_weights))
        .collect(),
    )
  }

  fn estimate_one(
    &self,
    observations: &[f64],
    threshold: f64,
    recency: &[f64],
    career_weights: Option<&[f64]>,
  ) -> ThresholdResult {
    let n = observations.len();
    let hits: Vec<bool> = observations.iter().map(|x| *x >= threshold).collect();
    let n_exceeds = hits.iter().filter(|hit| **hit).count();

    let frequency = n_exceeds as f64 / n as f64;
    let weighted_frequency = weighted_share(&hits, recency);
    let career_weighted_frequency = career_weights.map(|w| weighted_share(&hits, w));
    let smoothed = (n < self.params.small_sample_threshold)
      .then(|| self.params.prior.smooth(n_exceeds, n));
    let p_value = binomial_test(n_exceeds, n, 0.5);

    ThresholdResult {
      threshold,
      frequency,
      weighted_frequency,
      career_weighted_frequency,
      smoothed,
      n_exceeds,
      n_total: n,
      interval: wilson_interval(n_exceeds, n),
      p_value,
      significant: p_value < SIGNIFICANCE_LEVEL,
      confidence: self.classifier.classify(n_exceeds),
    }
  }
}

/// Sorted, deduplicated, finite thresholds.
pub fn normalize_thresholds(thresholds: &[f64]) -> Vec<f64> {
  let mut sorted: Vec<f64> = thresholds.iter().copied().filter(|t| t.is_finite()).collect();
  sorted.sort_by(f64::total_cmp);
  sorted.dedup();
  sorted
}

/// 95% Wilson score interval for `successes / trials`.
pub fn wilson_interval(successes: usize, trials: usize) -> Interval {
  if trials == 0 {
    return Interval {
      lower: 0.0,
      upper: 0.0,
    };
  }

  let n = trials as f64;
  let p = successes as f64 / n;
  let z2 = Z_95 * Z_95;

  let denominator = 1.0 + z2 / n;
  let center = (p + z2 / (2.0 * n)) / denominator;
  let margin = Z_95 * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denominator;

  Interval {
    lower: (center - margin).max(0.0),
    upper: (center + margin).min(1.0),
  }
}

/// Exact two-sided binomial test of `successes / trials` against `p0`.
///
/// Sums the probability of every outcome no more likely than the observed
/// one. No trials, or an unusable `p0`, gives 1.
pub fn binomial_test(successes: usize, trials: usize, p0: f64) -> f64 {
  if trials == 0 || successes > trials {
    return 1.0;
  }
  let Ok(dist) = Binomial::new(p0, trials as u64) else {
    return 1.0;
  };

  let observed = dist.pmf(successes as u64) * (1.0 + 1e-7);
  let p_value: f64 = (0..=trials as u64)
    .map(|k| dist.pmf(k))
    .filter(|p| *p <= observed)
    .sum();
  p_value.clamp(0.0, 1.0)
}

fn weighted_share(hits: &[bool], weights: &[f64]) -> f64 {
  let share: f64 = hits
    .iter()
    .zip(weights)
    .filter(|(hit, _)| **hit)
    .map(|(_, w)| w)
    .sum();
  share.clamp(0.0, 1.0)
}

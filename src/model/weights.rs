//! Observation weighting schemes. All weights are normalized to sum to 1.

use crate::error::EstimationError;

/// Geometric recency weights: `w[i] ∝ alpha^(n-1-i)`, newest last.
///
/// `alpha = 1` gives equal weights.
pub fn recency_weights(n: usize, alpha: f64) -> Result<Vec<f64>, EstimationError> {
  check_alpha(alpha)?;
  if n == 0 {
    return Err(EstimationError::NoObservations);
  }

  let raw: Vec<f64> = (0..n).map(|i| alpha.powi((n - 1 - i) as i32)).collect();
  Ok(normalize(raw))
}

/// Exponential decay weights: `w[i] ∝ exp(-lambda * (T - t[i]))`, where `T`
/// is the time of the last observation.
pub fn decay_weights(times: &[f64], lambda: f64) -> Result<Vec<f64>, EstimationError> {
  if !lambda.is_finite() || lambda <= 0.0 {
    return Err(EstimationError::InvalidDecayRate(lambda));
  }
  let Some(&latest) = times.last() else {
    return Err(EstimationError::NoObservations);
  };

  let raw: Vec<f64> = times
    .iter()
    .map(|t| (-lambda * (latest - t)).exp())
    .collect();
  Ok(normalize(raw))
}

pub(crate) fn check_alpha(alpha: f64) -> Result<(), EstimationError> {
  if alpha > 0.0 && alpha <= 1.0 {
    Ok(())
  } else {
    Err(EstimationError::InvalidAlpha(alpha))
  }
}

fn normalize(raw: Vec<f64>) -> Vec<f64> {
  let total: f64 = raw.iter().sum();
  if total > 0.0 && total.is_finite() {
    raw.into_iter().map(|w| w / total).collect()
  } else {
    // Degenerate input (e.g. every weight underflowed); fall back to uniform.
    let n = raw.len() as f64;
    raw.into_iter().map(|_| 1.0 / n).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_sums_to_one(weights: &[f64]) {
    let total: f64 = weights.iter().sum();
    assert!((total - 1.0).abs() < 1e-12, "sum was {total}");
  }

  #[test]
  fn test_recency_weights_favor_newest() {
    let w = recency_weights(5, 0.85).unwrap();
    assert_sums_to_one(&w);
    assert!(w.windows(2).all(|pair| pair[0] < pair[1]));
    assert!((w[3] / w[4] - 0.85).abs() < 1e-12);
  }

  #[test]
  fn test_alpha_one_is_uniform() {
    let w = recency_weights(4, 1.0).unwrap();
    for weight in w {
      assert!((weight - 0.25).abs() < 1e-15);
    }
  }

  #[test]
  fn test_alpha_out_of_range_rejected() {
    for alpha in [0.0, -0.5, 1.01, f64::NAN, f64::INFINITY] {
      assert!(matches!(
        recency_weights(3, alpha),
        Err(EstimationError::InvalidAlpha(_))
      ));
    }
  }

  #[test]
  fn test_empty_rejected() {
    assert_eq!(recency_weights(0, 0.85), Err(EstimationError::NoObservations));
    assert_eq!(decay_weights(&[], 0.05), Err(EstimationError::NoObservations));
  }

  #[test]
  fn test_decay_weights_by_index() {
    let times: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let early = decay_weights(&times, 0.02).unwrap();
    let late = decay_weights(&times, 0.08).unwrap();
    assert_sums_to_one(&early);
    assert_sums_to_one(&late);
    assert!(early[9] > early[0]);
    assert!(late[9] / late[0] > early[9] / early[0]);
  }

  #[test]
  fn test_decay_weights_follow_time_gaps() {
    // A long layoff before the last game shrinks everything before it.
    let w = decay_weights(&[0.0, 1.0, 30.0], 0.05).unwrap();
    assert!((w[1] / w[0] - (0.05f64).exp()).abs() < 1e-12);
    assert!(w[2] > 0.6);
  }

  #[test]
  fn test_decay_rate_must_be_positive() {
    assert_eq!(
      decay_weights(&[0.0, 1.0], 0.0),
      Err(EstimationError::InvalidDecayRate(0.0))
    );
  }
}

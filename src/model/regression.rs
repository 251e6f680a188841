//! Regression-to-the-mean signals layered on top of the threshold frequencies.
//!
//! Three checks look at the same game log from different angles: a hot
//! scoring stretch (fatigue), a falling minutes load, and a shift in the
//! stat's baseline (non-stationarity). Each becomes a multiplier on the
//! recency-weighted chance of falling short of a threshold.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::nba::types::{GameRecord, StatCategory};

/// Composite regression probabilities never exceed this.
pub const MAX_REGRESSION_PROBABILITY: f64 = 0.95;

/// Weight of the fatigue regression risk in its multiplier.
const FATIGUE_WEIGHT: f64 = 0.3;
/// Minutes slope (per game) below which a decline counts.
const DECLINE_SLOPE: f64 = -0.5;
const DECLINE_P_VALUE: f64 = 0.1;
const MIN_MINUTES_FACTOR: f64 = 0.3;
/// Shift of the recent mean, in full-period deviations, that marks a regime change.
const REGIME_CHANGE_Z: f64 = 1.5;
const REGIME_CHANGE_FACTOR: f64 = 0.7;

/// Window sizes for the three checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionParams {
  /// Recent games compared with the whole log for the fatigue check
  pub fatigue_window: usize,
  /// Recent games the minutes trend is fitted on
  pub minutes_window: usize,
  /// Recent games compared with the whole log for the baseline check
  pub stationarity_lookback: usize,
}

impl Default for RegressionParams {
  fn default() -> Self {
    Self {
      fatigue_window: 10,
      minutes_window: 10,
      stationarity_lookback: 20,
    }
  }
}

impl RegressionParams {
  /// The minutes fit needs three points for a p-value; the others need two.
  pub fn validate(&self) -> Result<(), ConfigError> {
    for (name, value, min) in [
      ("fatigue_window", self.fatigue_window, 2),
      ("minutes_window", self.minutes_window, 3),
      ("stationarity_lookback", self.stationarity_lookback, 2),
    ] {
      if value < min {
        return Err(ConfigError::InvalidWindow { name, value, min });
      }
    }
    Ok(())
  }
}

/// Whether a recent scoring run sits far enough above the long-term mean
/// to be expected to cool off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueAnalysis {
  /// Logistic in the z-score of the recent mean, centred at one deviation
  pub regression_risk: f64,
  pub sustainability_factor: f64,
  pub recent_mean: Option<f64>,
  pub long_term_mean: Option<f64>,
  pub z_score: f64,
}

impl FatigueAnalysis {
  fn neutral() -> Self {
    Self {
      regression_risk: 0.0,
      sustainability_factor: 1.0,
      recent_mean: None,
      long_term_mean: None,
      z_score: 0.0,
    }
  }

  /// Analyze `points` (oldest first) over the last `window` games.
  pub fn analyze(points: &[f64], window: usize) -> Self {
    if window == 0 || points.len() < window {
      return Self::neutral();
    }

    let recent_mean = mean(&points[points.len() - window..]);
    let long_term_mean = mean(points);
    let std = population_std(points);

    let (z_score, regression_risk) = if std > 0.0 {
      let z = (recent_mean - long_term_mean) / std;
      (z, 1.0 / (1.0 + (-1.5 * (z - 1.0)).exp()))
    } else {
      (0.0, 0.0)
    };

    Self {
      regression_risk,
      sustainability_factor: 1.0 - regression_risk,
      recent_mean: Some(recent_mean),
      long_term_mean: Some(long_term_mean),
      z_score,
    }
  }

  pub fn is_above_mean(&self) -> bool {
    matches!((self.recent_mean, self.long_term_mean), (Some(r), Some(l)) if r > l)
  }

  pub fn multiplier(&self) -> f64 {
    1.0 + self.regression_risk * FATIGUE_WEIGHT
  }
}

/// Linear trend of minutes played across the most recent games.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinutesTrend {
  pub declining: bool,
  /// Minutes gained (or lost) per game
  pub slope: f64,
  pub sustainability_factor: f64,
  pub correlation: Option<f64>,
  pub p_value: Option<f64>,
  pub recent_average: Option<f64>,
}

impl MinutesTrend {
  fn neutral() -> Self {
    Self {
      declining: false,
      slope: 0.0,
      sustainability_factor: 1.0,
      correlation: None,
      p_value: None,
      recent_average: None,
    }
  }

  /// Fit the last `window` entries of `minutes` (oldest first).
  ///
  /// A decline needs a slope below -0.5 minutes per game with p < 0.1.
  pub fn analyze(minutes: &[f64], window: usize) -> Self {
    if window == 0 || minutes.len() < window {
      return Self::neutral();
    }
    let recent = &minutes[minutes.len() - window..];
    let Some(fit) = LinearFit::fit(recent) else {
      return Self::neutral();
    };

    let declining =
      fit.slope < DECLINE_SLOPE && fit.p_value.is_some_and(|p| p < DECLINE_P_VALUE);
    let sustainability_factor = if declining {
      (1.0 + fit.slope / 10.0).max(MIN_MINUTES_FACTOR)
    } else {
      1.0
    };

    Self {
      declining,
      slope: fit.slope,
      sustainability_factor,
      correlation: fit.correlation,
      p_value: fit.p_value,
      recent_average: Some(mean(recent)),
    }
  }

  pub fn multiplier(&self) -> f64 {
    2.0 - self.sustainability_factor
  }
}

/// Recent window against the whole log for one stat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationarityAdjustment {
  pub recent_mean: f64,
  pub recent_std: f64,
  pub full_mean: f64,
  pub full_std: f64,
  pub regime_change: bool,
  /// Shift of the recent mean in full-period deviations
  pub magnitude: f64,
  pub adjustment_factor: f64,
}

impl StationarityAdjustment {
  /// `None` when there are fewer than `lookback` values.
  pub fn analyze(values: &[f64], lookback: usize) -> Option<Self> {
    if lookback == 0 || values.len() < lookback {
      return None;
    }
    let recent = &values[values.len() - lookback..];
    let (recent_mean, recent_std) = (mean(recent), population_std(recent));
    let (full_mean, full_std) = (mean(values), population_std(values));

    let magnitude = if full_std > 0.0 {
      (recent_mean - full_mean).abs() / full_std
    } else {
      0.0
    };
    let regime_change = magnitude > REGIME_CHANGE_Z;

    Some(Self {
      recent_mean,
      recent_std,
      full_mean,
      full_std,
      regime_change,
      magnitude,
      adjustment_factor: if regime_change { REGIME_CHANGE_FACTOR } else { 1.0 },
    })
  }
}

/// All regression signals for one game log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionAnalysis {
  pub fatigue: FatigueAnalysis,
  pub minutes: MinutesTrend,
  pub stationarity: BTreeMap<StatCategory, StationarityAdjustment>,
}

impl RegressionAnalysis {
  /// Run every check over `games`, which must be ordered oldest first.
  pub fn from_games(games: &[GameRecord], params: &RegressionParams) -> Self {
    let series = |stat: StatCategory| -> Vec<f64> {
      games.iter().filter_map(|game| game.stat(stat)).collect()
    };

    let stationarity = [StatCategory::Points, StatCategory::Rebounds, StatCategory::Assists]
      .into_iter()
      .filter_map(|stat| {
        StationarityAdjustment::analyze(&series(stat), params.stationarity_lookback)
          .map(|adjustment| (stat, adjustment))
      })
      .collect();

    Self {
      fatigue: FatigueAnalysis::analyze(&series(StatCategory::Points), params.fatigue_window),
      minutes: MinutesTrend::analyze(&series(StatCategory::Minutes), params.minutes_window),
      stationarity,
    }
  }

  /// Combine the signals with the recency-weighted inverse probability of
  /// one threshold of `stat`.
  pub fn adjust(&self, stat: StatCategory, weighted_inverse_probability: f64) -> RegressionAdjustment {
    let fatigue_multiplier = self.fatigue.multiplier();
    let minutes_multiplier = self.minutes.multiplier();
    let stationarity_multiplier = self
      .stationarity
      .get(&stat)
      .map_or(1.0, |s| s.adjustment_factor);

    let composite = (weighted_inverse_probability
      * fatigue_multiplier
      * minutes_multiplier
      * stationarity_multiplier)
      .clamp(0.0, MAX_REGRESSION_PROBABILITY);

    RegressionAdjustment {
      fatigue_multiplier,
      minutes_multiplier,
      stationarity_multiplier,
      composite_regression_probability: composite,
      final_sustainability_score: 1.0 - composite,
    }
  }
}

/// Regression-adjusted view of one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionAdjustment {
  pub fatigue_multiplier: f64,
  pub minutes_multiplier: f64,
  pub stationarity_multiplier: f64,
  /// Chance of falling short once every signal is applied, capped at 0.95
  pub composite_regression_probability: f64,
  pub final_sustainability_score: f64,
}

/// Least-squares line through `values` against 0, 1, 2, ...
#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearFit {
  slope: f64,
  correlation: Option<f64>,
  /// Two-sided t-test of a zero slope
  p_value: Option<f64>,
}

impl LinearFit {
  fn fit(values: &[f64]) -> Option<Self> {
    if values.len() < 2 {
      return None;
    }
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = mean(values);

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
      let dx = i as f64 - mean_x;
      let dy = y - mean_y;
      sxx += dx * dx;
      sxy += dx * dy;
      syy += dy * dy;
    }

    let slope = sxy / sxx;
    if !slope.is_finite() {
      return None;
    }
    if syy == 0.0 {
      return Some(Self {
        slope,
        correlation: None,
        p_value: None,
      });
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = values.len() - 2;
    let p_value = if df == 0 {
      None
    } else if 1.0 - r * r <= f64::EPSILON {
      Some(0.0)
    } else {
      let t = r * (df as f64 / (1.0 - r * r)).sqrt();
      StudentsT::new(0.0, 1.0, df as f64)
        .ok()
        .map(|dist| (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
    };

    Some(Self {
      slope,
      correlation: Some(r),
      p_value,
    })
  }
}

fn mean(values: &[f64]) -> f64 {
  values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
  let m = mean(values);
  (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Days, NaiveDate};

  const EPS: f64 = 1e-9;

  fn log(points: &[f64], minutes: &[f64]) -> Vec<GameRecord> {
    let start = NaiveDate::from_ymd_opt(2023, 11, 1).unwrap();
    points
      .iter()
      .zip(minutes)
      .enumerate()
      .map(|(i, (pts, min))| GameRecord {
        id: i as u64,
        date: start + Days::new(i as u64),
        season: 2023,
        postseason: false,
        home_team_id: 1,
        visitor_team_id: 2,
        team_id: Some(1),
        pts: *pts,
        reb: 6.0,
        ast: 5.0,
        fg3m: 1.0,
        min: *min,
        fg_pct: None,
      })
      .collect()
  }

  #[test]
  fn test_fatigue_one_deviation_above_is_even_odds() {
    let points: Vec<f64> = [20.0; 10].into_iter().chain([30.0; 10]).collect();
    let fatigue = FatigueAnalysis::analyze(&points, 10);
    assert!((fatigue.z_score - 1.0).abs() < EPS);
    assert!((fatigue.regression_risk - 0.5).abs() < EPS);
    assert!((fatigue.sustainability_factor - 0.5).abs() < EPS);
    assert!((fatigue.multiplier() - 1.15).abs() < EPS);
    assert!(fatigue.is_above_mean());
  }

  #[test]
  fn test_fatigue_neutral_when_short_or_flat() {
    assert_eq!(FatigueAnalysis::analyze(&[30.0; 5], 10).regression_risk, 0.0);
    let flat = FatigueAnalysis::analyze(&[25.0; 12], 10);
    assert_eq!(flat.regression_risk, 0.0);
    assert_eq!(flat.multiplier(), 1.0);
    assert!(!flat.is_above_mean());
  }

  #[test]
  fn test_minutes_decline_detected() {
    let minutes: Vec<f64> = (0..10).map(|i| 36.0 - i as f64).collect();
    let trend = MinutesTrend::analyze(&minutes, 10);
    assert!(trend.declining);
    assert!((trend.slope + 1.0).abs() < EPS);
    assert_eq!(trend.p_value, Some(0.0));
    assert!((trend.sustainability_factor - 0.9).abs() < EPS);
    assert!((trend.multiplier() - 1.1).abs() < EPS);
  }

  #[test]
  fn test_minutes_noise_is_not_a_decline() {
    let minutes = [34.0, 30.0, 35.0, 29.0, 33.0, 31.0, 34.0, 28.0, 33.0, 30.0];
    let trend = MinutesTrend::analyze(&minutes, 10);
    assert!(!trend.declining);
    assert!(trend.p_value.unwrap() > 0.1);
    assert_eq!(trend.multiplier(), 1.0);

    let steady = MinutesTrend::analyze(&[32.0; 10], 10);
    assert_eq!(steady.slope, 0.0);
    assert_eq!(steady.p_value, None);
    assert!(!steady.declining);
  }

  #[test]
  fn test_steep_decline_factor_floored() {
    let minutes: Vec<f64> = (0..10).map(|i| 40.0 - 9.0 * i as f64 + (i % 2) as f64).collect();
    let trend = MinutesTrend::analyze(&minutes, 10);
    assert!(trend.declining);
    assert_eq!(trend.sustainability_factor, 0.3);
  }

  #[test]
  fn test_regime_change() {
    let values: Vec<f64> = [10.0; 80].into_iter().chain([30.0; 20]).collect();
    let shift = StationarityAdjustment::analyze(&values, 20).unwrap();
    assert!((shift.full_mean - 14.0).abs() < EPS);
    assert!((shift.full_std - 8.0).abs() < EPS);
    assert!((shift.magnitude - 2.0).abs() < EPS);
    assert!(shift.regime_change);
    assert_eq!(shift.adjustment_factor, 0.7);

    assert!(StationarityAdjustment::analyze(&values[..19], 20).is_none());
    let steady = StationarityAdjustment::analyze(&[12.0; 25], 20).unwrap();
    assert!(!steady.regime_change);
    assert_eq!(steady.adjustment_factor, 1.0);
  }

  #[test]
  fn test_composite_combines_multipliers() {
    let points: Vec<f64> = [20.0; 10].into_iter().chain([30.0; 10]).collect();
    let minutes: Vec<f64> = (0..20).map(|i| if i < 10 { 35.0 } else { 45.0 - i as f64 }).collect();
    let analysis = RegressionAnalysis::from_games(&log(&points, &minutes), &RegressionParams::default());

    assert!(analysis.minutes.declining);
    assert!(analysis.stationarity.contains_key(&StatCategory::Points));

    let adjusted = analysis.adjust(StatCategory::Points, 0.4);
    let expected = 0.4 * 1.15 * 1.1;
    assert!((adjusted.composite_regression_probability - expected).abs() < EPS);
    assert!((adjusted.final_sustainability_score - (1.0 - expected)).abs() < EPS);
    assert_eq!(adjusted.stationarity_multiplier, 1.0);

    let capped = analysis.adjust(StatCategory::Points, 0.9);
    assert_eq!(capped.composite_regression_probability, MAX_REGRESSION_PROBABILITY);
  }

  #[test]
  fn test_short_log_is_neutral() {
    let analysis =
      RegressionAnalysis::from_games(&log(&[22.0, 18.0], &[30.0, 31.0]), &RegressionParams::default());
    assert!(analysis.stationarity.is_empty());
    let adjusted = analysis.adjust(StatCategory::Rebounds, 0.35);
    assert!((adjusted.composite_regression_probability - 0.35).abs() < EPS);
  }

  #[test]
  fn test_windows_validated() {
    assert_eq!(RegressionParams::default().validate(), Ok(()));
    let params = RegressionParams {
      minutes_window: 2,
      ..RegressionParams::default()
    };
    assert_eq!(
      params.validate(),
      Err(ConfigError::InvalidWindow {
        name: "minutes_window",
        value: 2,
        min: 3
      })
    );
  }
}

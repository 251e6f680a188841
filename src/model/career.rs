//! Career-phase classification and the decay weights that go with it.
//!
//! A player is placed in a coarse phase from their points-per-game trend
//! across seasons. Each phase has its own exponential decay rate; later
//! phases forget old games faster, so `early < peak < late` must hold.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::weights::decay_weights;
use crate::error::{ConfigError, EstimationError};
use crate::nba::types::{GameRecord, SeasonAverage};

/// Where in a career trajectory the current data falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CareerPhase {
  Early,
  Rising,
  Peak,
  Late,
  Unknown,
}

impl fmt::Display for CareerPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      CareerPhase::Early => "early",
      CareerPhase::Rising => "rising",
      CareerPhase::Peak => "peak",
      CareerPhase::Late => "late",
      CareerPhase::Unknown => "unknown",
    };
    f.write_str(name)
  }
}

/// Decay rate (lambda) per career phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayRates {
  pub early: f64,
  pub rising: f64,
  pub peak: f64,
  pub late: f64,
}

impl Default for DecayRates {
  fn default() -> Self {
    Self {
      early: 0.02,
      rising: 0.03,
      peak: 0.05,
      late: 0.08,
    }
  }
}

impl DecayRates {
  /// Every rate finite and positive, and `early < peak < late`.
  pub fn validate(&self) -> Result<(), ConfigError> {
    for (phase, value) in [
      ("early", self.early),
      ("rising", self.rising),
      ("peak", self.peak),
      ("late", self.late),
    ] {
      if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidLambda { phase, value });
      }
    }

    if !(self.early < self.peak && self.peak < self.late) {
      return Err(ConfigError::InvalidLambdaOrdering {
        early: self.early,
        peak: self.peak,
        late: self.late,
      });
    }
    Ok(())
  }

  /// Rate for `phase`; an unknown phase uses the peak rate.
  pub fn rate_for(&self, phase: CareerPhase) -> f64 {
    match phase {
      CareerPhase::Early => self.early,
      CareerPhase::Rising => self.rising,
      CareerPhase::Peak | CareerPhase::Unknown => self.peak,
      CareerPhase::Late => self.late,
    }
  }
}

/// Heuristic cut-offs for [`classify_career`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseRules {
  /// Fewer seasons than this is "unknown"
  pub min_seasons: usize,
  /// Up to this many seasons with points data is "early"
  pub early_max_seasons: usize,
  /// "Late" needs at least this many seasons...
  pub late_min_seasons: usize,
  /// ...and a points-per-season slope below this
  pub late_slope: f64,
  /// A slope above this is "rising"
  pub rising_slope: f64,
}

impl Default for PhaseRules {
  fn default() -> Self {
    Self {
      min_seasons: 2,
      early_max_seasons: 3,
      late_min_seasons: 10,
      late_slope: -0.5,
      rising_slope: 0.5,
    }
  }
}

/// Classify a career from its season averages (any order).
pub fn classify_career(seasons: &[SeasonAverage], rules: &PhaseRules) -> CareerPhase {
  if seasons.len() < rules.min_seasons {
    return CareerPhase::Unknown;
  }

  let mut sorted: Vec<&SeasonAverage> = seasons.iter().collect();
  sorted.sort_by_key(|s| s.season);
  let points: Vec<f64> = sorted
    .iter()
    .filter_map(|s| s.pts)
    .filter(|p| p.is_finite())
    .collect();

  if points.len() <= rules.early_max_seasons {
    return CareerPhase::Early;
  }

  let Some(slope) = trend_slope(&points) else {
    return CareerPhase::Unknown;
  };

  if points.len() >= rules.late_min_seasons && slope < rules.late_slope {
    CareerPhase::Late
  } else if slope > rules.rising_slope {
    CareerPhase::Rising
  } else {
    CareerPhase::Peak
  }
}

/// Ordinary least-squares slope of `values` against 0, 1, 2, ...
pub fn trend_slope(values: &[f64]) -> Option<f64> {
  if values.len() < 2 {
    return None;
  }

  let n = values.len() as f64;
  let mean_x = (n - 1.0) / 2.0;
  let mean_y = values.iter().sum::<f64>() / n;

  let (mut sxy, mut sxx) = (0.0, 0.0);
  for (i, y) in values.iter().enumerate() {
    let dx = i as f64 - mean_x;
    sxy += dx * (y - mean_y);
    sxx += dx * dx;
  }

  Some(sxy / sxx)
}

/// Time axis used for career decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayAxis {
  /// One unit per game played
  #[default]
  Games,
  /// One unit per calendar day
  Days,
}

impl DecayAxis {
  /// Times for each game, oldest first.
  pub fn times(&self, games: &[&GameRecord]) -> Vec<f64> {
    match self {
      DecayAxis::Games => (0..games.len()).map(|i| i as f64).collect(),
      DecayAxis::Days => games
        .iter()
        .map(|g| g.date.num_days_from_ce() as f64)
        .collect(),
    }
  }
}

/// Produces career-phase decay weights for a run of games.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CareerAdjuster {
  rates: DecayRates,
  axis: DecayAxis,
}

impl CareerAdjuster {
  pub fn new(rates: DecayRates, axis: DecayAxis) -> Result<Self, ConfigError> {
    rates.validate()?;
    Ok(Self { rates, axis })
  }

  pub fn rates(&self) -> &DecayRates {
    &self.rates
  }

  /// Normalized weights for `games` (oldest first) under `phase`.
  pub fn weights(
    &self,
    phase: CareerPhase,
    games: &[&GameRecord],
  ) -> Result<Vec<f64>, EstimationError> {
    decay_weights(&self.axis.times(games), self.rates.rate_for(phase))
  }
}

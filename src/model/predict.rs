//! Ties the estimators together: game log in, per-stat threshold report out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::career::{CareerAdjuster, CareerPhase};
use super::frequency::{normalize_thresholds, FrequencyEstimator, ThresholdResult};
use super::regression::{RegressionAdjustment, RegressionAnalysis, RegressionParams};
use super::zscore::{dynamic_thresholds, DynamicThresholds, LadderStep};
use crate::error::EstimationError;
use crate::nba::types::{GameRecord, SeasonAverage, StatCategory};

/// Thresholds to evaluate, per stat category.
///
/// Deserialized entries go through [`ThresholdSet::insert`], so config files
/// get the same sorting and empty-list handling as the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<StatCategory, Vec<f64>>")]
pub struct ThresholdSet(BTreeMap<StatCategory, Vec<f64>>);

impl ThresholdSet {
  pub fn empty() -> Self {
    Self(BTreeMap::new())
  }

  /// Common betting lines for the counting stats.
  pub fn defaults() -> Self {
    let mut set = Self::empty();
    set.insert(StatCategory::Points, vec![10.0, 15.0, 20.0, 25.0, 30.0]);
    set.insert(StatCategory::Rebounds, vec![4.0, 6.0, 8.0, 10.0, 12.0]);
    set.insert(StatCategory::Assists, vec![4.0, 6.0, 8.0, 10.0, 12.0]);
    set.insert(StatCategory::ThreesMade, vec![2.0, 3.0, 4.0, 5.0]);
    set
  }

  /// Replace the thresholds for `category`; they are sorted and deduplicated.
  pub fn insert(&mut self, category: StatCategory, thresholds: Vec<f64>) {
    let thresholds = normalize_thresholds(&thresholds);
    if thresholds.is_empty() {
      self.0.remove(&category);
    } else {
      self.0.insert(category, thresholds);
    }
  }

  pub fn get(&self, category: StatCategory) -> Option<&[f64]> {
    self.0.get(&category).map(Vec::as_slice)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (StatCategory, &[f64])> {
    self.0.iter().map(|(category, t)| (*category, t.as_slice()))
  }

  /// Parse a `stat=t1,t2,...` argument, e.g. `pts=20,25.5`.
  pub fn parse_entry(raw: &str) -> Result<(StatCategory, Vec<f64>), String> {
    let (stat, values) = raw
      .split_once('=')
      .ok_or_else(|| format!("expected `stat=value[,value...]`, got `{raw}`"))?;
    let category: StatCategory = stat.parse()?;

    let thresholds = values
      .split(',')
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(|v| {
        v.parse::<f64>()
          .ok()
          .filter(|t| t.is_finite())
          .ok_or_else(|| format!("invalid threshold `{v}` for {category}"))
      })
      .collect::<Result<Vec<f64>, String>>()?;

    if thresholds.is_empty() {
      return Err(format!("no thresholds given for {category}"));
    }
    Ok((category, thresholds))
  }
}

impl Default for ThresholdSet {
  fn default() -> Self {
    Self::defaults()
  }
}

impl From<BTreeMap<StatCategory, Vec<f64>>> for ThresholdSet {
  fn from(raw: BTreeMap<StatCategory, Vec<f64>>) -> Self {
    raw.into_iter().collect()
  }
}

impl FromIterator<(StatCategory, Vec<f64>)> for ThresholdSet {
  fn from_iter<I: IntoIterator<Item = (StatCategory, Vec<f64>)>>(iter: I) -> Self {
    let mut set = Self::empty();
    for (category, thresholds) in iter {
      set.insert(category, thresholds);
    }
    set
  }
}

/// One threshold's estimate, or `None` when there was nothing to estimate from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
  pub threshold: f64,
  pub result: Option<ThresholdResult>,
  pub regression: Option<RegressionAdjustment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatPrediction {
  pub stat: StatCategory,
  pub n_observations: usize,
  pub outcomes: Vec<ThresholdOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
  pub n_games: usize,
  pub career_phase: Option<CareerPhase>,
  /// Regression signals for the log; `None` without games
  pub regression: Option<RegressionAnalysis>,
  pub stats: Vec<StatPrediction>,
}

/// One rung of a season-average threshold ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicOutcome {
  pub step: LadderStep,
  pub threshold: f64,
  pub result: ThresholdResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicPrediction {
  pub stat: StatCategory,
  pub ladder: DynamicThresholds,
  pub n_observations: usize,
  pub outcomes: Vec<DynamicOutcome>,
}

/// Frequencies at the mean and one to three deviations above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicReport {
  pub season: i32,
  pub stats: Vec<DynamicPrediction>,
}

/// Runs the frequency estimator over a game log for every configured stat.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
  estimator: FrequencyEstimator,
  career: Option<CareerAdjuster>,
  regression: RegressionParams,
}

impl Predictor {
  pub fn new(estimator: FrequencyEstimator, career: Option<CareerAdjuster>) -> Self {
    Self {
      estimator,
      career,
      regression: RegressionParams::default(),
    }
  }

  pub fn with_regression(mut self, params: RegressionParams) -> Self {
    self.regression = params;
    self
  }

  pub fn regression(&self) -> &RegressionParams {
    &self.regression
  }

  pub fn estimator(&self) -> &FrequencyEstimator {
    &self.estimator
  }

  /// Turn off career-phase weighting.
  pub fn without_career(mut self) -> Self {
    self.career = None;
    self
  }

  /// Build the report for `games`, which must be ordered oldest first.
  ///
  /// Career weights are added only when both an adjuster is configured and
  /// a `phase` is supplied. A stat with no usable observations yields
  /// outcomes whose `result` is `None`.
  pub fn predict(
    &self,
    games: &[GameRecord],
    thresholds: &ThresholdSet,
    phase: Option<CareerPhase>,
  ) -> Result<PredictionReport, EstimationError> {
    let career = self.career.as_ref().zip(phase);
    let regression =
      (!games.is_empty()).then(|| RegressionAnalysis::from_games(games, &self.regression));

    let stats = thresholds
      .iter()
      .map(|(stat, levels)| self.predict_stat(games, stat, levels, career, regression.as_ref()))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(PredictionReport {
      n_games: games.len(),
      career_phase: career.map(|(_, phase)| phase),
      regression,
      stats,
    })
  }

  /// Estimate over the ladder built from `season` (usually the current
  /// season's averages). Stats without an average or without observations
  /// in `games` are left out.
  pub fn predict_dynamic(
    &self,
    games: &[GameRecord],
    season: &SeasonAverage,
  ) -> Result<DynamicReport, EstimationError> {
    let mut stats = Vec::new();

    for (stat, ladder) in dynamic_thresholds(season) {
      let observations: Vec<f64> = games.iter().filter_map(|game| game.stat(stat)).collect();
      if observations.is_empty() {
        debug!(%stat, "no observations for dynamic thresholds");
        continue;
      }

      let mut outcomes = Vec::with_capacity(4);
      // One rung at a time: rungs collapse onto the same value when the spread is zero.
      for (step, threshold) in ladder.steps() {
        for result in self.estimator.estimate(&observations, &[threshold])? {
          outcomes.push(DynamicOutcome {
            step,
            threshold,
            result,
          });
        }
      }

      stats.push(DynamicPrediction {
        stat,
        ladder,
        n_observations: observations.len(),
        outcomes,
      });
    }

    Ok(DynamicReport {
      season: season.season,
      stats,
    })
  }

  fn predict_stat(
    &self,
    games: &[GameRecord],
    stat: StatCategory,
    levels: &[f64],
    career: Option<(&CareerAdjuster, CareerPhase)>,
    regression: Option<&RegressionAnalysis>,
  ) -> Result<StatPrediction, EstimationError> {
    let (used, observations): (Vec<&GameRecord>, Vec<f64>) = games
      .iter()
      .filter_map(|game| game.stat(stat).map(|value| (game, value)))
      .unzip();

    let weights = match career {
      Some((adjuster, phase)) if !used.is_empty() => Some(adjuster.weights(phase, &used)?),
      _ => None,
    };

    let outcomes = match self
      .estimator
      .estimate_with_career(&observations, levels, weights.as_deref())
    {
      Ok(results) => results
        .into_iter()
        .map(|r| ThresholdOutcome {
          threshold: r.threshold,
          regression: regression.map(|a| a.adjust(stat, r.weighted_inverse_probability())),
          result: Some(r),
        })
        .collect(),
      Err(EstimationError::NoObservations) => {
        debug!(%stat, "no observations, reporting insufficient data");
        normalize_thresholds(levels)
          .into_iter()
          .map(|threshold| ThresholdOutcome {
            threshold,
            result: None,
            regression: None,
          })
          .collect()
      }
      Err(e) => return Err(e),
    };

    Ok(StatPrediction {
      stat,
      n_observations: observations.len(),
      outcomes,
    })
  }
}

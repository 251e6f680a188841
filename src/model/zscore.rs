//! League-relative normalization and helpers derived from season figures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::nba::types::{GameRecord, SeasonAverage, StatCategory};

/// Standard score of `x`, or `None` when the spread is zero or not finite.
pub fn normalize(x: f64, league_mean: f64, league_std: f64) -> Option<f64> {
  if league_std == 0.0 || !league_std.is_finite() {
    return None;
  }
  let z = (x - league_mean) / league_std;
  z.is_finite().then_some(z)
}

/// Population mean and standard deviation for one stat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
  pub mean: f64,
  pub std: f64,
}

impl MeanStd {
  pub const fn new(mean: f64, std: f64) -> Self {
    Self { mean, std }
  }

  pub fn z(&self, x: f64) -> Option<f64> {
    normalize(x, self.mean, self.std)
  }
}

/// Reference league figures used for z-scores.
///
/// The defaults are approximate per-player-game numbers for a recent
/// season; callers with a real aggregate feed should pass their own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueAverages {
  pub pts: MeanStd,
  pub reb: MeanStd,
  pub ast: MeanStd,
  pub fg_pct: MeanStd,
  pub min: MeanStd,
}

impl Default for LeagueAverages {
  fn default() -> Self {
    Self {
      pts: MeanStd::new(11.5, 8.5),
      reb: MeanStd::new(4.2, 3.2),
      ast: MeanStd::new(2.8, 2.9),
      fg_pct: MeanStd::new(0.462, 0.087),
      min: MeanStd::new(20.5, 9.8),
    }
  }
}

impl LeagueAverages {
  pub fn get(&self, category: StatCategory) -> Option<MeanStd> {
    match category {
      StatCategory::Points => Some(self.pts),
      StatCategory::Rebounds => Some(self.reb),
      StatCategory::Assists => Some(self.ast),
      StatCategory::FieldGoalPct => Some(self.fg_pct),
      StatCategory::Minutes => Some(self.min),
      StatCategory::ThreesMade => None,
    }
  }

  /// Z-score of every stat in `game` that has a league reference.
  pub fn z_scores(&self, game: &GameRecord) -> BTreeMap<StatCategory, f64> {
    StatCategory::ALL
      .into_iter()
      .filter_map(|category| {
        let reference = self.get(category)?;
        let z = reference.z(game.stat(category)?)?;
        Some((category, z))
      })
      .collect()
  }
}

/// Minutes played as a decimal, from `"MM:SS"` or a plain number.
///
/// Empty or unparseable input is 0.
pub fn parse_minutes(raw: &str) -> f64 {
  let raw = raw.trim();
  if raw.is_empty() {
    return 0.0;
  }
  if let Ok(minutes) = raw.parse::<f64>() {
    return if minutes.is_finite() { minutes } else { 0.0 };
  }

  let Some((minutes, seconds)) = raw.split_once(':') else {
    return 0.0;
  };
  match (minutes.trim().parse::<u32>(), seconds.trim().parse::<u32>()) {
    (Ok(m), Ok(s)) => m as f64 + s as f64 / 60.0,
    _ => 0.0,
  }
}

/// Typical game-to-game coefficient of variation for a stat.
pub fn typical_cv(category: StatCategory) -> f64 {
  match category {
    StatCategory::Rebounds => 0.40,
    StatCategory::Assists => 0.50,
    _ => 0.35,
  }
}

/// Rung of a [`DynamicThresholds`] ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LadderStep {
  #[serde(rename = "mean")]
  Mean,
  #[serde(rename = "plus_1_std")]
  Plus1Std,
  #[serde(rename = "plus_2_std")]
  Plus2Std,
  #[serde(rename = "plus_3_std")]
  Plus3Std,
}

impl fmt::Display for LadderStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      LadderStep::Mean => "mean",
      LadderStep::Plus1Std => "mean+1sd",
      LadderStep::Plus2Std => "mean+2sd",
      LadderStep::Plus3Std => "mean+3sd",
    };
    f.write_str(label)
  }
}

/// Threshold ladder at the mean and one to three deviations above it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicThresholds {
  pub mean: f64,
  pub std: f64,
  pub plus_1_std: f64,
  pub plus_2_std: f64,
  pub plus_3_std: f64,
}

impl DynamicThresholds {
  pub fn from_mean(category: StatCategory, mean: f64) -> Self {
    let std = mean * typical_cv(category);
    Self {
      mean,
      std,
      plus_1_std: mean + std,
      plus_2_std: mean + 2.0 * std,
      plus_3_std: mean + 3.0 * std,
    }
  }

  pub fn steps(&self) -> [(LadderStep, f64); 4] {
    [
      (LadderStep::Mean, self.mean),
      (LadderStep::Plus1Std, self.plus_1_std),
      (LadderStep::Plus2Std, self.plus_2_std),
      (LadderStep::Plus3Std, self.plus_3_std),
    ]
  }
}

/// Dynamic thresholds for points, rebounds and assists from season averages.
pub fn dynamic_thresholds(season: &SeasonAverage) -> BTreeMap<StatCategory, DynamicThresholds> {
  [
    (StatCategory::Points, season.pts),
    (StatCategory::Rebounds, season.reb),
    (StatCategory::Assists, season.ast),
  ]
  .into_iter()
  .filter_map(|(category, mean)| {
    let mean = mean.filter(|m| m.is_finite())?;
    Some((category, DynamicThresholds::from_mean(category, mean)))
  })
  .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;

  #[test]
  fn test_normalize() {
    assert_eq!(normalize(20.0, 11.5, 8.5), Some(1.0));
    assert_eq!(normalize(11.5, 11.5, 8.5), Some(0.0));
    assert_eq!(normalize(20.0, 11.5, 0.0), None);
    assert_eq!(normalize(20.0, 11.5, f64::NAN), None);
  }

  #[test]
  fn test_parse_minutes() {
    assert_eq!(parse_minutes("34:30"), 34.5);
    assert_eq!(parse_minutes("12"), 12.0);
    assert_eq!(parse_minutes("27.5"), 27.5);
    assert_eq!(parse_minutes(""), 0.0);
    assert_eq!(parse_minutes("  "), 0.0);
    assert_eq!(parse_minutes("DNP"), 0.0);
    assert_eq!(parse_minutes("ab:cd"), 0.0);
  }

  #[test]
  fn test_z_scores_skip_missing_reference() {
    let game = GameRecord {
      id: 1,
      date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
      season: 2023,
      postseason: false,
      home_team_id: 1,
      visitor_team_id: 2,
      team_id: Some(1),
      pts: 28.5,
      reb: 4.2,
      ast: 2.8,
      fg3m: 4.0,
      min: 30.3,
      fg_pct: None,
    };
    let z = LeagueAverages::default().z_scores(&game);
    assert!((z[&StatCategory::Points] - 2.0).abs() < 1e-12);
    assert!(z[&StatCategory::Rebounds].abs() < 1e-12);
    assert!((z[&StatCategory::Minutes] - 1.0).abs() < 1e-12);
    assert!(!z.contains_key(&StatCategory::ThreesMade));
    assert!(!z.contains_key(&StatCategory::FieldGoalPct));
  }

  #[test]
  fn test_dynamic_thresholds() {
    let season = SeasonAverage {
      player_id: 7,
      season: 2023,
      games_played: 60,
      pts: Some(20.0),
      reb: Some(10.0),
      ast: None,
      min: Some(33.0),
    };
    let ladders = dynamic_thresholds(&season);
    assert_eq!(ladders.len(), 2);

    let pts = ladders[&StatCategory::Points].steps();
    for ((_, got), want) in pts.iter().zip([20.0, 27.0, 34.0, 41.0]) {
      assert!((got - want).abs() < 1e-9);
    }
    assert_eq!(pts[2].0, LadderStep::Plus2Std);
    assert!((ladders[&StatCategory::Rebounds].std - 4.0).abs() < 1e-12);
  }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One completed game's stat line for a player.
///
/// Serialized flat, so cached payloads can be checked field by field before
/// they are decoded back into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
  /// Game identifier
  pub id: u64,
  pub date: NaiveDate,
  pub season: i32,
  #[serde(default)]
  pub postseason: bool,
  pub home_team_id: u64,
  pub visitor_team_id: u64,
  /// The player's own team, when the source reports it
  #[serde(default)]
  pub team_id: Option<u64>,
  pub pts: f64,
  pub reb: f64,
  pub ast: f64,
  pub fg3m: f64,
  /// Decimal minutes (34:30 is 34.5)
  pub min: f64,
  /// Missing when the player took no field-goal attempts
  #[serde(default)]
  pub fg_pct: Option<f64>,
}

impl GameRecord {
  pub fn stat(&self, category: StatCategory) -> Option<f64> {
    match category {
      StatCategory::Points => Some(self.pts),
      StatCategory::Rebounds => Some(self.reb),
      StatCategory::Assists => Some(self.ast),
      StatCategory::ThreesMade => Some(self.fg3m),
      StatCategory::Minutes => Some(self.min),
      StatCategory::FieldGoalPct => self.fg_pct,
    }
    .filter(|v| v.is_finite())
  }

  /// The other team in this game, if the player's team is known.
  pub fn opponent_id(&self) -> Option<u64> {
    let team = self.team_id?;
    if team == self.home_team_id {
      Some(self.visitor_team_id)
    } else if team == self.visitor_team_id {
      Some(self.home_team_id)
    } else {
      None
    }
  }

  pub fn is_home(&self) -> Option<bool> {
    self.team_id.map(|team| team == self.home_team_id)
  }
}

/// Per-season averages, the input to career-phase classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonAverage {
  pub player_id: u64,
  pub season: i32,
  #[serde(default)]
  pub games_played: u32,
  #[serde(default)]
  pub pts: Option<f64>,
  #[serde(default)]
  pub reb: Option<f64>,
  #[serde(default)]
  pub ast: Option<f64>,
  #[serde(default)]
  pub min: Option<f64>,
}

/// Player search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
  pub id: u64,
  pub first_name: String,
  pub last_name: String,
  pub position: Option<String>,
  pub team: Option<String>,
}

impl Player {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

/// Stat categories a threshold can be set on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatCategory {
  #[serde(rename = "pts")]
  Points,
  #[serde(rename = "reb")]
  Rebounds,
  #[serde(rename = "ast")]
  Assists,
  #[serde(rename = "fg3m")]
  ThreesMade,
  #[serde(rename = "min")]
  Minutes,
  #[serde(rename = "fg_pct")]
  FieldGoalPct,
}

impl StatCategory {
  pub const ALL: [StatCategory; 6] = [
    StatCategory::Points,
    StatCategory::Rebounds,
    StatCategory::Assists,
    StatCategory::ThreesMade,
    StatCategory::Minutes,
    StatCategory::FieldGoalPct,
  ];

  /// Short field name used by the API and in threshold specs.
  pub fn key(&self) -> &'static str {
    match self {
      StatCategory::Points => "pts",
      StatCategory::Rebounds => "reb",
      StatCategory::Assists => "ast",
      StatCategory::ThreesMade => "fg3m",
      StatCategory::Minutes => "min",
      StatCategory::FieldGoalPct => "fg_pct",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      StatCategory::Points => "Points",
      StatCategory::Rebounds => "Rebounds",
      StatCategory::Assists => "Assists",
      StatCategory::ThreesMade => "3PM",
      StatCategory::Minutes => "Minutes",
      StatCategory::FieldGoalPct => "FG%",
    }
  }
}

impl fmt::Display for StatCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.key())
  }
}

impl FromStr for StatCategory {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let needle = s.trim().to_lowercase();
    StatCategory::ALL
      .into_iter()
      .find(|c| c.key() == needle || c.label().to_lowercase() == needle)
      .ok_or_else(|| format!("unknown stat category `{}`", s.trim()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(team_id: Option<u64>) -> GameRecord {
    GameRecord {
      id: 1,
      date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
      season: 2023,
      postseason: false,
      home_team_id: 10,
      visitor_team_id: 20,
      team_id,
      pts: 27.0,
      reb: 8.0,
      ast: 6.0,
      fg3m: 3.0,
      min: 35.5,
      fg_pct: None,
    }
  }

  #[test]
  fn test_opponent_resolution() {
    assert_eq!(record(Some(10)).opponent_id(), Some(20));
    assert_eq!(record(Some(20)).opponent_id(), Some(10));
    assert_eq!(record(Some(99)).opponent_id(), None);
    assert_eq!(record(None).opponent_id(), None);
  }

  #[test]
  fn test_missing_fg_pct_is_no_observation() {
    let r = record(None);
    assert_eq!(r.stat(StatCategory::FieldGoalPct), None);
    assert_eq!(r.stat(StatCategory::Points), Some(27.0));
  }

  #[test]
  fn test_stat_category_parse() {
    assert_eq!("pts".parse::<StatCategory>(), Ok(StatCategory::Points));
    assert_eq!(" FG3M ".parse::<StatCategory>(), Ok(StatCategory::ThreesMade));
    assert_eq!("rebounds".parse::<StatCategory>(), Ok(StatCategory::Rebounds));
    assert!("steals".parse::<StatCategory>().is_err());
  }

  #[test]
  fn test_record_serializes_flat() {
    let value = serde_json::to_value(record(Some(10))).unwrap();
    assert_eq!(value["date"], "2024-01-05");
    assert_eq!(value["home_team_id"], 10);
    assert_eq!(value["visitor_team_id"], 20);
  }
}

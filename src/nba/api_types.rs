//! Serde-deserializable types matching balldontlie API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::{GameRecord, Player, SeasonAverage};
use crate::model::parse_minutes;

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPage<T> {
  #[serde(default = "Vec::new")]
  pub data: Vec<T>,
  #[serde(default)]
  pub meta: ApiMeta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiMeta {
  pub next_cursor: Option<u64>,
  pub per_page: Option<u32>,
}

// ============================================================================
// Nested types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTeam {
  pub id: u64,
  pub abbreviation: Option<String>,
  pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiGame {
  pub id: u64,
  #[serde(deserialize_with = "game_date")]
  pub date: NaiveDate,
  pub season: i32,
  #[serde(default)]
  pub postseason: bool,
  pub home_team_id: u64,
  pub visitor_team_id: u64,
}

// ============================================================================
// Stats endpoint (one row per player per game)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiStatLine {
  pub id: u64,
  #[serde(default, deserialize_with = "minutes")]
  pub min: f64,
  pub pts: Option<f64>,
  pub reb: Option<f64>,
  pub ast: Option<f64>,
  pub fg3m: Option<f64>,
  pub fga: Option<f64>,
  pub fg_pct: Option<f64>,
  pub game: ApiGame,
  pub team: Option<ApiTeam>,
}

impl ApiStatLine {
  /// Convert to a game record; `None` when the player did not get on the floor.
  pub fn into_record(self) -> Option<GameRecord> {
    if self.min <= 0.0 {
      return None;
    }

    // fg_pct is reported as 0 with no attempts; that is not a 0% game.
    let fg_pct = match self.fga {
      Some(attempts) if attempts <= 0.0 => None,
      _ => self.fg_pct,
    };

    Some(GameRecord {
      id: self.game.id,
      date: self.game.date,
      season: self.game.season,
      postseason: self.game.postseason,
      home_team_id: self.game.home_team_id,
      visitor_team_id: self.game.visitor_team_id,
      team_id: self.team.map(|t| t.id),
      pts: self.pts.unwrap_or(0.0),
      reb: self.reb.unwrap_or(0.0),
      ast: self.ast.unwrap_or(0.0),
      fg3m: self.fg3m.unwrap_or(0.0),
      min: self.min,
      fg_pct,
    })
  }
}

// ============================================================================
// Season averages endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiSeasonAverage {
  pub player_id: u64,
  pub season: i32,
  #[serde(default)]
  pub games_played: u32,
  pub pts: Option<f64>,
  pub reb: Option<f64>,
  pub ast: Option<f64>,
  #[serde(default, deserialize_with = "minutes")]
  pub min: f64,
}

impl From<ApiSeasonAverage> for SeasonAverage {
  fn from(api: ApiSeasonAverage) -> Self {
    SeasonAverage {
      player_id: api.player_id,
      season: api.season,
      games_played: api.games_played,
      pts: api.pts,
      reb: api.reb,
      ast: api.ast,
      min: (api.min > 0.0).then_some(api.min),
    }
  }
}

// ============================================================================
// Players endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPlayer {
  pub id: u64,
  pub first_name: String,
  pub last_name: String,
  pub position: Option<String>,
  pub team: Option<ApiTeam>,
}

impl From<ApiPlayer> for Player {
  fn from(api: ApiPlayer) -> Self {
    Player {
      id: api.id,
      first_name: api.first_name,
      last_name: api.last_name,
      position: api.position.filter(|p| !p.trim().is_empty()),
      team: api
        .team
        .and_then(|t| t.full_name.or(t.abbreviation)),
    }
  }
}

// ============================================================================
// Field helpers
// ============================================================================

/// Minutes come as `"34:30"`, `"34"`, a bare number, or null.
fn minutes<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Value::deserialize(deserializer)? {
    Value::String(s) => parse_minutes(&s),
    Value::Number(n) => n.as_f64().filter(|m| m.is_finite()).unwrap_or(0.0),
    _ => 0.0,
  })
}

/// Dates come either bare (`2024-01-05`) or as a UTC timestamp.
fn game_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(deserializer)?;
  let day = raw.get(..10).unwrap_or(&raw);
  NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
  use super::*;

  const STATS_PAGE: &str = r#"{
    "data": [
      {
        "id": 9001, "min": "34:30", "pts": 31, "reb": 7, "ast": 9, "fg3m": 4,
        "fga": 22, "fg_pct": 0.545,
        "game": {
          "id": 15, "date": "2024-01-05T00:00:00.000Z", "season": 2023,
          "postseason": false, "home_team_id": 14, "visitor_team_id": 2
        },
        "team": { "id": 14, "abbreviation": "LAL", "full_name": "Los Angeles Lakers" },
        "player": { "id": 237, "first_name": "LeBron", "last_name": "James" }
      },
      {
        "id": 9002, "min": "00", "pts": 0, "reb": 0, "ast": 0, "fg3m": 0,
        "fga": 0, "fg_pct": 0,
        "game": {
          "id": 16, "date": "2024-01-07", "season": 2023,
          "home_team_id": 3, "visitor_team_id": 14
        },
        "team": { "id": 14 }
      },
      {
        "id": 9003, "min": 12, "pts": null, "reb": 2, "ast": 1, "fg3m": 0,
        "fga": 0, "fg_pct": 0,
        "game": {
          "id": 17, "date": "2024-01-09", "season": 2023,
          "home_team_id": 3, "visitor_team_id": 14
        },
        "team": null
      }
    ],
    "meta": { "next_cursor": 555, "per_page": 100 }
  }"#;

  #[test]
  fn test_stats_page_parse() {
    let page: ApiPage<ApiStatLine> = serde_json::from_str(STATS_PAGE).unwrap();
    assert_eq!(page.meta.next_cursor, Some(555));

    let records: Vec<GameRecord> = page.data.into_iter().filter_map(ApiStatLine::into_record).collect();
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.id, 15);
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    assert_eq!(first.min, 34.5);
    assert_eq!(first.pts, 31.0);
    assert_eq!(first.fg_pct, Some(0.545));
    assert_eq!(first.opponent_id(), Some(2));

    let bench = &records[1];
    assert_eq!(bench.pts, 0.0);
    assert_eq!(bench.fg_pct, None);
    assert_eq!(bench.team_id, None);
  }

  #[test]
  fn test_season_average_parse() {
    let page: ApiPage<ApiSeasonAverage> = serde_json::from_str(
      r#"{"data":[{"player_id":237,"season":2022,"games_played":55,"pts":28.9,"reb":8.3,"ast":6.8,"min":"35:32"}]}"#,
    )
    .unwrap();
    let average: SeasonAverage = page.data.into_iter().next().unwrap().into();
    assert_eq!(average.season, 2022);
    assert_eq!(average.pts, Some(28.9));
    assert!((average.min.unwrap() - (35.0 + 32.0 / 60.0)).abs() < 1e-12);
  }

  #[test]
  fn test_player_parse() {
    let page: ApiPage<ApiPlayer> = serde_json::from_str(
      r#"{"data":[{"id":237,"first_name":"LeBron","last_name":"James","position":"",
        "team":{"id":14,"abbreviation":"LAL","full_name":"Los Angeles Lakers"}}],
        "meta":{"per_page":25}}"#,
    )
    .unwrap();
    let player: Player = page.data.into_iter().next().unwrap().into();
    assert_eq!(player.full_name(), "LeBron James");
    assert_eq!(player.position, None);
    assert_eq!(player.team.as_deref(), Some("Los Angeles Lakers"));
  }

  #[test]
  fn test_bad_date_rejected() {
    let result: Result<ApiGame, _> = serde_json::from_str(
      r#"{"id":1,"date":"Jan 5","season":2023,"home_team_id":1,"visitor_team_id":2}"#,
    );
    assert!(result.is_err());
  }
}

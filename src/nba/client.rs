use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::nba::api_types::{ApiPage, ApiPlayer, ApiSeasonAverage, ApiStatLine};
use crate::nba::types::{GameRecord, Player, SeasonAverage};

/// Safety cap on cursor pagination for a single season's game log.
const MAX_STAT_PAGES: usize = 10;

/// balldontlie API client wrapper
#[derive(Clone)]
pub struct NbaClient {
  http: reqwest::Client,
  base_url: Url,
  api_key: Option<String>,
  per_page: u32,
}

impl NbaClient {
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key();
    if api_key.is_none() {
      debug!("no API key set, requests will be unauthenticated");
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: base_url(&config.api.base_url)?,
      api_key,
      per_page: config.api.per_page.clamp(1, 100),
    })
  }

  /// Search for players by name
  pub async fn search_players(&self, query: &str) -> Result<Vec<Player>> {
    let page: ApiPage<ApiPlayer> = self
      .get(
        "players",
        &[
          ("search", query.to_string()),
          ("per_page", self.per_page.to_string()),
        ],
      )
      .await?;

    Ok(page.data.into_iter().map(Player::from).collect())
  }

  /// Every game a player appeared in during `season`, in API order.
  pub async fn season_games(&self, player_id: u64, season: i32) -> Result<Vec<GameRecord>> {
    let mut records = Vec::new();
    let mut cursor: Option<u64> = None;

    for _ in 0..MAX_STAT_PAGES {
      let mut query = vec![
        ("player_ids[]", player_id.to_string()),
        ("seasons[]", season.to_string()),
        ("per_page", self.per_page.to_string()),
      ];
      if let Some(c) = cursor {
        query.push(("cursor", c.to_string()));
      }

      let page: ApiPage<ApiStatLine> = self.get("stats", &query).await?;
      records.extend(page.data.into_iter().filter_map(ApiStatLine::into_record));

      match page.meta.next_cursor {
        Some(next) => cursor = Some(next),
        None => break,
      }
    }

    info!(player_id, season, games = records.len(), "fetched game log");
    Ok(records)
  }

  /// Season averages for one player and season, if the player played.
  pub async fn season_average(&self, player_id: u64, season: i32) -> Result<Option<SeasonAverage>> {
    let page: ApiPage<ApiSeasonAverage> = self
      .get(
        "season_averages",
        &[
          ("season", season.to_string()),
          ("player_ids[]", player_id.to_string()),
        ],
      )
      .await?;

    Ok(page.data.into_iter().next().map(SeasonAverage::from))
  }

  async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
    let url = self
      .base_url
      .join(endpoint)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", endpoint, e))?;

    let mut request = self.http.get(url).query(query);
    if let Some(key) = &self.api_key {
      request = request.bearer_auth(key);
    }

    debug!(endpoint, "requesting");
    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", endpoint, e))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| eyre!("Failed to read {} response: {}", endpoint, e))?;

    if !status.is_success() {
      return Err(eyre!("{} returned {}: {}", endpoint, status, truncate(&body, 200)));
    }

    serde_json::from_str(&body).map_err(|e| eyre!("Failed to parse {} response: {}", endpoint, e))
  }
}

/// Parse the configured base URL, making sure relative joins keep its path.
fn base_url(raw: &str) -> Result<Url> {
  let mut normalized = raw.trim().to_string();
  if !normalized.ends_with('/') {
    normalized.push('/');
  }
  Url::parse(&normalized).map_err(|e| eyre!("Invalid API base URL {}: {}", raw, e))
}

fn truncate(text: &str, max_chars: usize) -> &str {
  match text.char_indices().nth(max_chars) {
    Some((idx, _)) => &text[..idx],
    None => text,
  }
}

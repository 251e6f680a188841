//! Cached NBA client that wraps NbaClient with transparent caching.

use color_eyre::Result;
use futures::future::join_all;
use std::ops::RangeInclusive;
use tracing::{debug, warn};

use crate::cache::{CacheLayer, CacheStore, QueryParams, Schema, SqliteStore};
use crate::config::Config;

use super::client::NbaClient;
use super::types::{GameRecord, Player, SeasonAverage};

pub const GAMES_NAMESPACE: &str = "balldontlie:stats";
pub const SEASON_AVERAGES_NAMESPACE: &str = "balldontlie:season_averages";

/// NBA client with transparent caching support.
///
/// This wraps the underlying NbaClient and routes game logs and season
/// averages through a [`CacheLayer`]. Player search is not cached.
pub struct CachedNbaClient<S: CacheStore = SqliteStore> {
  inner: NbaClient,
  cache: CacheLayer<S>,
}

impl<S: CacheStore> Clone for CachedNbaClient<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
    }
  }
}

impl CachedNbaClient<SqliteStore> {
  /// Create a client backed by the configured SQLite cache.
  ///
  /// A cache file that cannot be opened is replaced by a throwaway
  /// in-memory database, so requests still reach the network.
  pub fn new(config: &Config) -> Result<Self> {
    let path = config.cache_path();
    let store = match SqliteStore::open(&path) {
      Ok(store) => store,
      Err(err) => {
        warn!(path = %path.display(), error = %err, "cache unavailable, continuing without it");
        SqliteStore::in_memory()?
      }
    }
    .with_max_payload_bytes(config.cache.max_payload_bytes);
    let cache = CacheLayer::new(store).with_ttl_policy(config.ttl_policy());
    Ok(Self::with_cache(NbaClient::new(config)?, cache))
  }
}

impl<S: CacheStore> CachedNbaClient<S> {
  pub fn with_cache(inner: NbaClient, cache: CacheLayer<S>) -> Self {
    Self { inner, cache }
  }

  pub fn cache(&self) -> &CacheLayer<S> {
    &self.cache
  }

  /// Search for players by name (not cached - results are small and rarely repeated).
  pub async fn search_players(&self, query: &str) -> Result<Vec<Player>> {
    self.inner.search_players(query).await
  }

  /// The player's last `limit` games of `season`, oldest first.
  pub async fn recent_games(
    &self,
    player_id: u64,
    season: i32,
    limit: usize,
  ) -> Result<Vec<GameRecord>> {
    let params = QueryParams::new()
      .with("player_id", player_id)
      .with("season", season);

    let result = self
      .cache
      .fetch_records(GAMES_NAMESPACE, &params, &Schema::games(), || {
        let inner = self.inner.clone();
        async move { inner.season_games(player_id, season).await }
      })
      .await?;

    debug!(
      player_id,
      season,
      cached = result.is_cached(),
      "game log ready"
    );
    Ok(latest_games(result.data, limit))
  }

  /// The player's averages for one season, `None` if they did not play.
  pub async fn season_average(&self, player_id: u64, season: i32) -> Result<Option<SeasonAverage>> {
    let params = QueryParams::new()
      .with("player_id", player_id)
      .with("season", season);
    let result = self
      .cache
      .fetch_records(
        SEASON_AVERAGES_NAMESPACE,
        &params,
        &Schema::season_averages(),
        || {
          let inner = self.inner.clone();
          async move {
            let found = inner.season_average(player_id, season).await?;
            Ok::<Vec<SeasonAverage>, color_eyre::Report>(found.into_iter().collect())
          }
        },
      )
      .await?;
    Ok(result.data.into_iter().next())
  }

  /// Season averages for every season in `seasons` the player appeared in,
  /// oldest first. Seasons that fail to load are skipped with a warning.
  pub async fn career_averages(
    &self,
    player_id: u64,
    seasons: RangeInclusive<i32>,
  ) -> Result<Vec<SeasonAverage>> {
    let lookups = seasons.map(|season| async move {
      (season, self.season_average(player_id, season).await)
    });

    let mut averages = Vec::new();
    for (season, result) in join_all(lookups).await {
      match result {
        Ok(found) => averages.extend(found),
        Err(err) => warn!(player_id, season, error = %err, "season averages unavailable"),
      }
    }

    averages.sort_by_key(|a| a.season);
    Ok(averages)
  }
}

/// Sort oldest first and keep the last `limit` games.
pub fn latest_games(mut games: Vec<GameRecord>, limit: usize) -> Vec<GameRecord> {
  games.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
  let skip = games.len().saturating_sub(limit);
  games.split_off(skip)
}

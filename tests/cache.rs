use chrono::{Duration, TimeZone, Utc};
use hoopstat::cache::{
  compute_key, CacheLayer, CacheSource, CacheStore, QueryParams, Schema, SqliteStore, TtlPolicy,
};
use hoopstat::error::ValidationError;
use hoopstat::nba::{GameRecord, GAMES_NAMESPACE};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

fn params(player_id: u64, season: i32) -> QueryParams {
  QueryParams::new()
    .with("player_id", player_id)
    .with("season", season)
}

fn sample_game() -> GameRecord {
  serde_json::from_value(json!({
    "id": 15, "date": "2024-01-05", "season": 2023,
    "home_team_id": 14, "visitor_team_id": 2, "team_id": 14,
    "pts": 31.0, "reb": 7.0, "ast": 9.0, "fg3m": 4.0, "min": 34.5, "fg_pct": 0.545
  }))
  .unwrap()
}

#[test]
fn keys_ignore_parameter_order() {
  let a = QueryParams::new().with("season", 2023).with("player_id", 237);
  let b = QueryParams::new().with("player_id", 237).with("season", 2023);
  assert_eq!(
    compute_key(GAMES_NAMESPACE, &a, "games:v2"),
    compute_key(GAMES_NAMESPACE, &b, "games:v2")
  );
  assert_ne!(
    compute_key(GAMES_NAMESPACE, &a, "games:v2"),
    compute_key(GAMES_NAMESPACE, &a, "games:v3")
  );
  assert_ne!(
    compute_key(GAMES_NAMESPACE, &a, "games:v2"),
    compute_key(GAMES_NAMESPACE, &params(237, 2022), "games:v2")
  );
}

#[test]
fn ttl_boundary_on_disk() {
  let dir = tempfile::tempdir().unwrap();
  let store = SqliteStore::open(&dir.path().join("cache.db")).unwrap();
  let key = compute_key(GAMES_NAMESPACE, &params(237, 2023), "games:v2");
  let ttl = Duration::hours(6);
  let written = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();

  store
    .set_at(&key, &json!([{"id": 1}]), "games:v2", written)
    .unwrap();

  let just_inside = written + ttl - Duration::seconds(1);
  let just_outside = written + ttl + Duration::seconds(1);
  assert!(store.get_at(&key, "games:v2", ttl, just_inside).is_some());
  assert!(store.get_at(&key, "games:v2", ttl, written + ttl).is_none());
  assert!(store.get_at(&key, "games:v2", ttl, just_outside).is_none());
}

#[test]
fn schema_tag_must_match() {
  let store = SqliteStore::in_memory().unwrap();
  let key = compute_key(GAMES_NAMESPACE, &params(237, 2023), "v1");
  store.set(&key, &json!([{"id": 1}]), "v1").unwrap();

  assert!(store.get(&key, "v1", Duration::hours(1)).is_some());
  assert!(store.get(&key, "v2", Duration::hours(1)).is_none());
}

#[tokio::test]
async fn layer_serves_second_call_from_cache() {
  let layer = CacheLayer::new(SqliteStore::in_memory().unwrap());
  let calls = AtomicUsize::new(0);
  let schema = Schema::games();

  for expected in [CacheSource::Network, CacheSource::Cache] {
    let result = layer
      .fetch_records(GAMES_NAMESPACE, &params(237, 2023), &schema, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, color_eyre::Report>(vec![sample_game()])
      })
      .await
      .unwrap();
    assert_eq!(result.source, expected);
    assert_eq!(result.data, vec![sample_game()]);
  }
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_batch_is_reported_and_never_cached() {
  let layer = CacheLayer::new(SqliteStore::in_memory().unwrap());
  let schema = Schema::new("rows:v1", ["id", "date"]);

  let err = layer
    .fetch_records("rows", &QueryParams::new(), &schema, || async {
      Ok::<_, color_eyre::Report>(vec![json!({"id": 1, "date": "2024-01-01"}), json!({"id": 2})])
    })
    .await
    .unwrap_err();
  assert_eq!(
    err.downcast_ref::<ValidationError>(),
    Some(&ValidationError::MissingField {
      index: 1,
      field: "date".to_string()
    })
  );
  assert!(layer.store().schema_counts().unwrap().is_empty());
}

#[tokio::test]
async fn clear_and_purge_through_layer() {
  let layer = CacheLayer::new(SqliteStore::in_memory().unwrap())
    .with_ttl_policy(TtlPolicy::new(Duration::hours(1)));
  let old = Utc::now() - Duration::hours(3);

  let stale = compute_key("balldontlie:stats", &params(1, 2020), "games:v2");
  let fresh = compute_key("balldontlie:season_averages", &params(1, 2020), "season_averages:v1");
  layer
    .store()
    .set_at(&stale, &json!([]), "games:v2", old)
    .unwrap();
  layer
    .store()
    .set(&fresh, &json!([]), "season_averages:v1")
    .unwrap();

  assert_eq!(layer.purge_expired().unwrap(), 1);
  assert_eq!(layer.invalidate("balldontlie:").unwrap(), 1);
  assert!(layer.store().schema_counts().unwrap().is_empty());
}

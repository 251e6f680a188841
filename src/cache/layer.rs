//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{Duration, Utc};
use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::key::{compute_key, QueryParams};
use super::schema::Schema;
use super::storage::CacheStore;
use super::traits::CacheResult;
use crate::error::StorageError;

/// Time-to-live per cache namespace.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
  default: Duration,
  overrides: HashMap<String, Duration>,
}

impl TtlPolicy {
  pub fn new(default: Duration) -> Self {
    Self {
      default,
      overrides: HashMap::new(),
    }
  }

  pub fn with_namespace(mut self, namespace: impl Into<String>, ttl: Duration) -> Self {
    self.overrides.insert(namespace.into(), ttl);
    self
  }

  pub fn ttl_for(&self, namespace: &str) -> Duration {
    self
      .overrides
      .get(namespace)
      .copied()
      .unwrap_or(self.default)
  }

  /// The longest TTL any namespace uses.
  pub fn max_ttl(&self) -> Duration {
    self
      .overrides
      .values()
      .copied()
      .fold(self.default, |longest, ttl| longest.max(ttl))
  }
}

impl Default for TtlPolicy {
  /// Six hours for game logs, a day for slow-changing reference data.
  fn default() -> Self {
    Self::new(Duration::hours(6))
      .with_namespace("balldontlie:teams", Duration::hours(24))
      .with_namespace("balldontlie:season_averages", Duration::hours(24))
  }
}

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the application and the network client. Fetched
/// records are validated against a [`Schema`] before they are written, and
/// cached records are only served when the schema tag and TTL both check out.
pub struct CacheLayer<S: CacheStore> {
  store: Arc<S>,
  ttl: TtlPolicy,
}

impl<S: CacheStore> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(store: S) -> Self {
    Self {
      store: Arc::new(store),
      ttl: TtlPolicy::default(),
    }
  }

  pub fn with_ttl_policy(mut self, ttl: TtlPolicy) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn ttl_policy(&self) -> &TtlPolicy {
    &self.ttl
  }

  /// Fetch a list of records with cache-first strategy.
  ///
  /// 1. Derive the key from namespace, params and schema version
  /// 2. If a valid entry decodes cleanly, return it
  /// 3. Otherwise run the fetcher
  /// 4. Validate the fetched records; invalid batches are returned as an
  ///    error and never cached
  /// 5. Store the batch (a failed write is logged, not returned)
  pub async fn fetch_records<T, F, Fut>(
    &self,
    namespace: &str,
    params: &QueryParams,
    schema: &Schema,
    fetcher: F,
  ) -> Result<CacheResult<Vec<T>>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let key = compute_key(namespace, params, &schema.version);
    let ttl = self.ttl.ttl_for(namespace);

    // Check cache first
    if let Some(payload) = self.store.get(&key, &schema.version, ttl) {
      match decode_records::<T>(payload, schema) {
        Ok(records) => return Ok(CacheResult::from_cache(records)),
        Err(err) => {
          warn!(namespace, key = %key, error = %err, "cached records rejected, refetching");
        }
      }
    }

    // No usable cache, must fetch from network
    let records = fetcher().await?;
    let payload = serde_json::to_value(&records)?;
    schema.validate_payload(&payload)?;

    match self.store.set(&key, &payload, &schema.version) {
      Ok(()) => debug!(namespace, key = %key, count = records.len(), "cached fetched records"),
      Err(err) => warn!(namespace, key = %key, error = %err, "cache write failed"),
    }

    Ok(CacheResult::from_network(records))
  }

  /// Drop cached entries for namespaces starting with `prefix`.
  pub fn invalidate(&self, prefix: &str) -> std::result::Result<usize, StorageError> {
    let removed = self.store.invalidate(prefix)?;
    info!(prefix, removed, "cache cleared");
    Ok(removed)
  }

  /// Delete rows older than the longest TTL; none of them can be served again.
  pub fn purge_expired(&self) -> std::result::Result<usize, StorageError> {
    let cutoff = Utc::now() - self.ttl.max_ttl();
    let removed = self.store.purge_older_than(cutoff)?;
    info!(removed, "purged expired cache rows");
    Ok(removed)
  }
}

impl<S: CacheStore> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      ttl: self.ttl.clone(),
    }
  }
}

fn decode_records<T: DeserializeOwned>(payload: Value, schema: &Schema) -> Result<Vec<T>> {
  schema.validate_payload(&payload)?;
  Ok(serde_json::from_value(payload)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::{FailingStore, MemoryStore};
  use crate::cache::traits::CacheSource;
  use crate::error::ValidationError;
  use color_eyre::eyre::eyre;
  use serde::Deserialize;
  use serde_json::json;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Row {
    id: u64,
    date: String,
    home_team_id: u64,
    visitor_team_id: u64,
  }

  #[derive(Debug, Clone, Serialize, Deserialize)]
  struct PartialRow {
    id: u64,
    date: String,
  }

  fn rows() -> Vec<Row> {
    vec![Row {
      id: 1,
      date: "2024-01-01".to_string(),
      home_team_id: 10,
      visitor_team_id: 20,
    }]
  }

  async fn fetch_rows(calls: &AtomicUsize) -> Result<Vec<Row>> {
    calls.fetch_add(1, Ordering::SeqCst);
    Ok(rows())
  }

  fn params() -> QueryParams {
    QueryParams::new().with("player_id", 237).with("season", 2024)
  }

  #[tokio::test]
  async fn test_second_fetch_served_from_cache() {
    let layer = CacheLayer::new(MemoryStore::new());
    let calls = AtomicUsize::new(0);
    let schema = Schema::games();

    for expected in [false, true] {
      let result = layer
        .fetch_records("balldontlie:stats", &params(), &schema, || fetch_rows(&calls))
        .await
        .unwrap();
      assert_eq!(result.is_cached(), expected);
      assert_eq!(result.data, rows());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_invalid_batch_not_cached() {
    let layer = CacheLayer::new(MemoryStore::new());
    let schema = Schema::games();

    let err = layer
      .fetch_records("balldontlie:stats", &params(), &schema, || async {
        Ok::<_, color_eyre::Report>(vec![PartialRow {
          id: 1,
          date: "2024-01-01".to_string(),
        }])
      })
      .await
      .unwrap_err();

    assert!(matches!(
      err.downcast_ref::<ValidationError>(),
      Some(ValidationError::MissingField { index: 0, .. })
    ));
    assert!(layer.store().is_empty());
  }

  #[tokio::test]
  async fn test_schema_bump_forces_refetch() {
    let layer = CacheLayer::new(MemoryStore::new());
    let calls = AtomicUsize::new(0);
    let v1 = Schema::new("games:v1", ["id", "date"]);

    for schema in [&v1, &Schema::games()] {
      let result = layer
        .fetch_records("balldontlie:stats", &params(), schema, || fetch_rows(&calls))
        .await
        .unwrap();
      assert!(!result.is_cached());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_fetch_error_propagates() {
    let layer = CacheLayer::new(MemoryStore::new());
    let result: Result<CacheResult<Vec<Row>>> = layer
      .fetch_records("balldontlie:stats", &params(), &Schema::games(), || async {
        Err::<Vec<Row>, _>(eyre!("network down"))
      })
      .await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_undecodable_cache_refetches() {
    let layer = CacheLayer::new(MemoryStore::new());
    let schema = Schema::games();
    let key = compute_key("balldontlie:stats", &params(), &schema.version);
    layer
      .store()
      .set(
        &key,
        &json!([{"id": "x", "date": 1, "home_team_id": 1, "visitor_team_id": 2}]),
        &schema.version,
      )
      .unwrap();

    let result = layer
      .fetch_records("balldontlie:stats", &params(), &schema, || async { Ok::<_, color_eyre::Report>(rows()) })
      .await
      .unwrap();
    assert!(!result.is_cached());
    assert_eq!(result.data, rows());
  }

  #[tokio::test]
  async fn test_broken_store_still_serves_network() {
    let layer = CacheLayer::new(FailingStore);
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      let result = layer
        .fetch_records("balldontlie:stats", &params(), &Schema::games(), || fetch_rows(&calls))
        .await
        .unwrap();
      assert_eq!(result.source, CacheSource::Network);
      assert_eq!(result.data, rows());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(layer.invalidate("").is_err());
  }

  #[test]
  fn test_ttl_policy_lookup() {
    let policy = TtlPolicy::default();
    assert_eq!(policy.ttl_for("balldontlie:stats"), Duration::hours(6));
    assert_eq!(policy.ttl_for("balldontlie:teams"), Duration::hours(24));
    assert_eq!(policy.max_ttl(), Duration::hours(24));
  }
}

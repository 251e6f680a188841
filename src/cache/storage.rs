//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::key::CacheKey;
use crate::error::StorageError;

/// Largest serialized payload accepted by `set`.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 5_000_000;

/// One row of the cache table.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  pub key: CacheKey,
  /// Serialized JSON payload
  pub payload: String,
  pub updated_at: DateTime<Utc>,
  pub schema_version: String,
}

impl CacheEntry {
  /// Younger than `ttl` at `now`. An entry aged exactly `ttl` is expired.
  pub fn is_fresh_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(self.updated_at) < ttl
  }
}

/// Trait for cache storage backends.
///
/// Backends implement the raw row operations; the validity policy (schema tag,
/// TTL, fail-open reads, payload size limit) lives in the provided methods so
/// every backend behaves the same.
pub trait CacheStore: Send + Sync {
  /// Read the raw row for `key`, if any.
  fn load_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError>;

  /// Upsert a raw row.
  fn store_entry(&self, entry: &CacheEntry) -> Result<(), StorageError>;

  /// Delete every row whose namespace starts with `prefix`. Returns rows removed.
  fn remove_namespace_prefix(&self, prefix: &str) -> Result<usize, StorageError>;

  /// Delete rows last written before `cutoff`. Returns rows removed.
  fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError>;

  /// Row counts grouped by schema version.
  fn schema_counts(&self) -> Result<BTreeMap<String, usize>, StorageError>;

  fn max_payload_bytes(&self) -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
  }

  /// Cached payload for `key`, or `None` on any kind of miss.
  fn get(&self, key: &CacheKey, schema_version: &str, ttl: Duration) -> Option<Value> {
    self.get_at(key, schema_version, ttl, Utc::now())
  }

  /// Like [`CacheStore::get`], evaluated at `now`.
  ///
  /// Absent rows, expired rows, schema mismatches, undecodable payloads and
  /// storage failures all come back as `None`.
  fn get_at(
    &self,
    key: &CacheKey,
    schema_version: &str,
    ttl: Duration,
    now: DateTime<Utc>,
  ) -> Option<Value> {
    let entry = match self.load_entry(key) {
      Ok(Some(entry)) => entry,
      Ok(None) => {
        debug!(namespace = key.namespace(), key = %key, "cache miss: absent");
        return None;
      }
      Err(err) => {
        warn!(namespace = key.namespace(), key = %key, error = %err, "cache read failed, treating as miss");
        return None;
      }
    };

    if entry.schema_version != schema_version {
      debug!(
        namespace = key.namespace(),
        cached = %entry.schema_version,
        expected = schema_version,
        "cache miss: schema version mismatch"
      );
      return None;
    }

    if !entry.is_fresh_at(ttl, now) {
      debug!(namespace = key.namespace(), key = %key, "cache miss: expired");
      return None;
    }

    match serde_json::from_str(&entry.payload) {
      Ok(payload) => {
        debug!(namespace = key.namespace(), key = %key, "cache hit");
        Some(payload)
      }
      Err(err) => {
        warn!(namespace = key.namespace(), key = %key, error = %err, "cached payload undecodable, treating as miss");
        None
      }
    }
  }

  /// Store `payload` under `key`, stamped with the current time.
  fn set(&self, key: &CacheKey, payload: &Value, schema_version: &str) -> Result<(), StorageError> {
    self.set_at(key, payload, schema_version, Utc::now())
  }

  /// Like [`CacheStore::set`], stamped with `updated_at`.
  fn set_at(
    &self,
    key: &CacheKey,
    payload: &Value,
    schema_version: &str,
    updated_at: DateTime<Utc>,
  ) -> Result<(), StorageError> {
    let serialized = serde_json::to_string(payload)?;
    let limit = self.max_payload_bytes();
    if serialized.len() > limit {
      return Err(StorageError::PayloadTooLarge {
        size: serialized.len(),
        limit,
      });
    }

    self.store_entry(&CacheEntry {
      key: key.clone(),
      payload: serialized,
      updated_at: truncate_to_secs(updated_at),
      schema_version: schema_version.to_string(),
    })
  }

  /// Drop every entry in namespaces starting with `prefix` (empty clears all).
  fn invalidate(&self, prefix: &str) -> Result<usize, StorageError> {
    let removed = self.remove_namespace_prefix(prefix)?;
    debug!(prefix, removed, "cache invalidated");
    Ok(removed)
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStore;

impl CacheStore for NoopStore {
  fn load_entry(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
    Ok(None) // Always miss
  }

  fn store_entry(&self, _entry: &CacheEntry) -> Result<(), StorageError> {
    Ok(()) // Discard
  }

  fn remove_namespace_prefix(&self, _prefix: &str) -> Result<usize, StorageError> {
    Ok(0)
  }

  fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
    Ok(0)
  }

  fn schema_counts(&self) -> Result<BTreeMap<String, usize>, StorageError> {
    Ok(BTreeMap::new())
  }
}

/// In-process map, mostly for tests.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().map(|e| e.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl CacheStore for MemoryStore {
  fn load_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
    let entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
    Ok(entries.get(key.as_str()).cloned())
  }

  fn store_entry(&self, entry: &CacheEntry) -> Result<(), StorageError> {
    let mut entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
    entries.insert(entry.key.as_str().to_string(), entry.clone());
    Ok(())
  }

  fn remove_namespace_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
    let mut entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
    let before = entries.len();
    entries.retain(|_, e| !e.key.namespace().starts_with(prefix));
    Ok(before - entries.len())
  }

  fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
    let mut entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
    let before = entries.len();
    entries.retain(|_, e| e.updated_at >= cutoff);
    Ok(before - entries.len())
  }

  fn schema_counts(&self) -> Result<BTreeMap<String, usize>, StorageError> {
    let entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
    let mut counts = BTreeMap::new();
    for entry in entries.values() {
      *counts.entry(entry.schema_version.clone()).or_insert(0) += 1;
    }
    Ok(counts)
  }
}

/// Backend whose every primitive fails.
#[cfg(test)]
pub(crate) struct FailingStore;

#[cfg(test)]
impl CacheStore for FailingStore {
  fn load_entry(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
    Err(StorageError::LockPoisoned)
  }

  fn store_entry(&self, _entry: &CacheEntry) -> Result<(), StorageError> {
    Err(StorageError::LockPoisoned)
  }

  fn remove_namespace_prefix(&self, _prefix: &str) -> Result<usize, StorageError> {
    Err(StorageError::LockPoisoned)
  }

  fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
    Err(StorageError::LockPoisoned)
  }

  fn schema_counts(&self) -> Result<BTreeMap<String, usize>, StorageError> {
    Err(StorageError::LockPoisoned)
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  max_payload_bytes: usize,
}

/// Schema for the cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS http_cache (
    key TEXT PRIMARY KEY,
    namespace TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    schema_ver TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_http_cache_updated ON http_cache(updated_at);
CREATE INDEX IF NOT EXISTS idx_http_cache_schema ON http_cache(schema_ver);
CREATE INDEX IF NOT EXISTS idx_http_cache_namespace ON http_cache(namespace);
"#;

impl SqliteStore {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }

    let conn = Connection::open(path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    let mode: String =
      conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!(path = %path.display(), journal_mode = %mode, "opened cache database");

    Self::with_connection(conn)
  }

  /// Open the cache at the default location.
  pub fn open_default() -> Result<Self, StorageError> {
    Self::open(&Self::default_path())
  }

  /// A private, non-persistent database.
  pub fn in_memory() -> Result<Self, StorageError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  /// Get the default database path.
  pub fn default_path() -> PathBuf {
    dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .unwrap_or_else(|| PathBuf::from("."))
      .join("hoopstat")
      .join("cache.db")
  }

  pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
    self.max_payload_bytes = limit;
    self
  }

  fn with_connection(conn: Connection) -> Result<Self, StorageError> {
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
      max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
    })
  }

  fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
    self.conn.lock().map_err(|_| StorageError::LockPoisoned)
  }
}

impl CacheStore for SqliteStore {
  fn load_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
    let conn = self.conn()?;
    let row: Option<(String, String, i64, String)> = conn
      .query_row(
        "SELECT namespace, payload, updated_at, schema_ver FROM http_cache WHERE key = ?1",
        params![key.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()?;

    Ok(row.map(|(namespace, payload, updated_at, schema_version)| CacheEntry {
      key: CacheKey::from_parts(namespace, key.as_str().to_string()),
      payload,
      updated_at: from_unix(updated_at),
      schema_version,
    }))
  }

  fn store_entry(&self, entry: &CacheEntry) -> Result<(), StorageError> {
    let conn = self.conn()?;
    conn.execute(
      "INSERT OR REPLACE INTO http_cache (key, namespace, payload, updated_at, schema_ver)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      params![
        entry.key.as_str(),
        entry.key.namespace(),
        entry.payload,
        entry.updated_at.timestamp(),
        entry.schema_version
      ],
    )?;
    Ok(())
  }

  fn remove_namespace_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
    let conn = self.conn()?;
    let removed = conn.execute(
      "DELETE FROM http_cache WHERE substr(namespace, 1, ?1) = ?2",
      params![prefix.chars().count() as i64, prefix],
    )?;
    if removed > 0 {
      // Reclaim space after bulk clears
      conn.execute_batch("VACUUM")?;
    }
    Ok(removed)
  }

  fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
    let conn = self.conn()?;
    let removed = conn.execute(
      "DELETE FROM http_cache WHERE updated_at < ?1",
      params![cutoff.timestamp()],
    )?;
    Ok(removed)
  }

  fn schema_counts(&self) -> Result<BTreeMap<String, usize>, StorageError> {
    let conn = self.conn()?;
    let mut stmt =
      conn.prepare("SELECT schema_ver, COUNT(*) FROM http_cache GROUP BY schema_ver")?;
    let rows = stmt.query_map([], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = BTreeMap::new();
    for row in rows {
      let (schema, count) = row?;
      counts.insert(schema, count.max(0) as usize);
    }
    Ok(counts)
  }

  fn max_payload_bytes(&self) -> usize {
    self.max_payload_bytes
  }
}

/// Unreadable timestamps decode as the distant past, which reads as expired.
fn from_unix(secs: i64) -> DateTime<Utc> {
  Utc
    .timestamp_opt(secs, 0)
    .single()
    .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Rows store whole seconds; stamp entries the same way in every backend.
fn truncate_to_secs(at: DateTime<Utc>) -> DateTime<Utc> {
  from_unix(at.timestamp())
}

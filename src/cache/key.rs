//! Deterministic cache keys.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Query parameters in canonical (sorted) order.
///
/// Insertion order never affects the derived key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(BTreeMap<String, Value>);

impl QueryParams {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a parameter, replacing any previous value under the same name.
  pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.insert(name, value);
    self
  }

  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
    self.0.insert(name.into(), value.into());
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Compact JSON with keys sorted, e.g. `{"player_id":237,"season":2024}`.
  pub fn canonical_json(&self) -> String {
    // BTreeMap<String, Value> serializes with sorted keys and cannot fail.
    serde_json::to_string(&self.0).unwrap_or_else(|_| String::from("{}"))
  }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for QueryParams {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut params = QueryParams::new();
    for (k, v) in iter {
      params.insert(k, v);
    }
    params
  }
}

/// A derived cache key: the namespace it belongs to plus its hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  namespace: String,
  digest: String,
}

impl CacheKey {
  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  /// 64-character lowercase SHA-256 hex digest.
  pub fn as_str(&self) -> &str {
    &self.digest
  }

  /// Rebuild a key from parts previously read back from storage.
  pub(crate) fn from_parts(namespace: String, digest: String) -> Self {
    Self { namespace, digest }
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.digest)
  }
}

/// Derive the key for `namespace` + `params` + `schema_version`.
///
/// The hashed input is `"{namespace}|{schema_version}|{canonical params}"`.
pub fn compute_key(namespace: &str, params: &QueryParams, schema_version: &str) -> CacheKey {
  let canonical = format!(
    "{}|{}|{}",
    namespace,
    schema_version,
    params.canonical_json()
  );

  // SHA256 hash for stable, fixed-length keys
  let mut hasher = Sha256::new();
  hasher.update(canonical.as_bytes());
  let result = hasher.finalize();

  CacheKey {
    namespace: namespace.to_string(),
    digest: hex::encode(result),
  }
}

//! Typed errors for the cache, validator, estimator, and configuration.
//!
//! Application-level plumbing (HTTP, CLI, config file I/O) reports through
//! `color_eyre::Result`; these types cover the outcomes a caller is expected
//! to match on.

use thiserror::Error;

/// A payload failed the required-field check and must not be cached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
  #[error("CACHE_SCHEMA_MISMATCH: record {index} missing field `{field}`")]
  MissingField { index: usize, field: String },

  #[error("CACHE_SCHEMA_MISMATCH: record {index} is not an object")]
  NotAnObject { index: usize },

  #[error("CACHE_SCHEMA_MISMATCH: payload is not a list of records")]
  NotAList,
}

/// The estimator could not produce a probability.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum EstimationError {
  #[error("no observations to estimate from")]
  NoObservations,

  #[error("recency alpha must be in (0, 1], got {0}")]
  InvalidAlpha(f64),

  #[error("decay rate must be finite and positive, got {0}")]
  InvalidDecayRate(f64),

  #[error("{weights} weights supplied for {observations} observations")]
  WeightLengthMismatch { weights: usize, observations: usize },
}

/// Failure inside a cache backing store.
///
/// Reads convert these into a cache miss; writes hand them back to the caller.
#[derive(Error, Debug)]
pub enum StorageError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("payload serialization failed: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("payload of {size} bytes exceeds cache limit of {limit} bytes")]
  PayloadTooLarge { size: usize, limit: usize },

  #[error("cache lock poisoned")]
  LockPoisoned,

  #[error("cache directory error: {0}")]
  Io(#[from] std::io::Error),
}

/// A configuration value that would make the model or cache misbehave.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("decay rates must satisfy early < peak < late (got {early} / {peak} / {late})")]
  InvalidLambdaOrdering { early: f64, peak: f64, late: f64 },

  #[error("decay rate for {phase} must be finite and positive, got {value}")]
  InvalidLambda { phase: &'static str, value: f64 },

  #[error("recency alpha must be in (0, 1], got {0}")]
  InvalidAlpha(f64),

  #[error("ttl for `{namespace}` must be between one second and ten years")]
  InvalidTtl { namespace: String },

  #[error("prior pseudo-counts must be finite and positive (got {successes} / {failures})")]
  InvalidPrior { successes: f64, failures: f64 },

  #[error("{name} must be at least {min}, got {value}")]
  InvalidWindow {
    name: &'static str,
    value: usize,
    min: usize,
  },
}

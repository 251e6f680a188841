//! Schema-versioned key-value cache for fetched records.
//!
//! This module provides a source-agnostic caching mechanism that:
//! - Derives deterministic keys from namespace + parameters + schema version
//! - Serves an entry only while it is younger than its namespace TTL and its
//!   schema tag matches the reader's
//! - Refuses to store payloads that fail the required-field check
//! - Treats storage failures on read as a plain miss

mod key;
mod layer;
mod schema;
mod storage;
mod traits;

pub use key::{compute_key, CacheKey, QueryParams};
pub use layer::{CacheLayer, TtlPolicy};
pub use schema::{validate, Schema};
pub use storage::{CacheEntry, CacheStore, MemoryStore, NoopStore, SqliteStore, DEFAULT_MAX_PAYLOAD_BYTES};
pub use traits::{CacheResult, CacheSource};

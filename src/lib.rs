//! Recency-weighted probabilities that an NBA player reaches a stat line,
//! with a schema-versioned SQLite cache in front of the stats API.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod nba;

//! Payload shape checks that gate writes into the cache.
//!
//! A [`Schema`] pairs a version tag with the fields every cached record must
//! carry. Whenever the required field set changes, the version must change
//! too, so entries written under the old contract stop matching on read.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::ValidationError;

/// Version tag plus required field set for one cached record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
  pub version: String,
  pub required_fields: BTreeSet<String>,
}

impl Schema {
  pub fn new<I, S>(version: impl Into<String>, required_fields: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      version: version.into(),
      required_fields: required_fields.into_iter().map(Into::into).collect(),
    }
  }

  /// Per-player game logs.
  pub fn games() -> Self {
    Self::new("games:v2", ["id", "date", "home_team_id", "visitor_team_id"])
  }

  /// Per-season averages used for career-phase classification.
  pub fn season_averages() -> Self {
    Self::new("season_averages:v1", ["player_id", "season"])
  }

  /// Check a JSON payload that should be a list of records.
  pub fn validate_payload(&self, payload: &Value) -> Result<(), ValidationError> {
    match payload {
      Value::Array(records) => self.validate(records),
      _ => Err(ValidationError::NotAList),
    }
  }

  pub fn validate(&self, records: &[Value]) -> Result<(), ValidationError> {
    validate(records, &self.required_fields)
  }
}

/// Check that every record carries every required field with a non-null value.
///
/// Fields are checked in sorted order, so the reported field is the first
/// missing one alphabetically within the first failing record.
pub fn validate(records: &[Value], required_fields: &BTreeSet<String>) -> Result<(), ValidationError> {
  for (index, record) in records.iter().enumerate() {
    let Value::Object(fields) = record else {
      return Err(ValidationError::NotAnObject { index });
    };

    for field in required_fields {
      match fields.get(field) {
        Some(Value::Null) | None => {
          return Err(ValidationError::MissingField {
            index,
            field: field.clone(),
          });
        }
        Some(_) => {}
      }
    }
  }

  Ok(())
}

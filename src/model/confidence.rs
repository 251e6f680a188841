use serde::{Deserialize, Serialize};
use std::fmt;

/// Games meeting the threshold needed for a "High" label.
pub const DEFAULT_CONFIDENCE_CUTOFF: usize = 5;

/// Confidence label attached to a threshold estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
  High,
  Low,
}

impl fmt::Display for Confidence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Confidence::High => f.write_str("High"),
      Confidence::Low => f.write_str("Low"),
    }
  }
}

/// Labels an estimate by how many games actually met the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceClassifier {
  cutoff: usize,
}

impl ConfidenceClassifier {
  pub fn new(cutoff: usize) -> Self {
    Self { cutoff }
  }

  pub fn cutoff(&self) -> usize {
    self.cutoff
  }

  pub fn classify(&self, n_exceeds: usize) -> Confidence {
    if n_exceeds >= self.cutoff {
      Confidence::High
    } else {
      Confidence::Low
    }
  }
}

impl Default for ConfidenceClassifier {
  fn default() -> Self {
    Self::new(DEFAULT_CONFIDENCE_CUTOFF)
  }
}

/// Classify with the default cutoff of 5.
pub fn classify(n_exceeds: usize) -> Confidence {
  ConfidenceClassifier::default().classify(n_exceeds)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_boundary() {
    assert_eq!(classify(5), Confidence::High);
    assert_eq!(classify(4), Confidence::Low);
    assert_eq!(classify(0), Confidence::Low);
    assert_eq!(classify(40), Confidence::High);
  }

  #[test]
  fn test_custom_cutoff() {
    let classifier = ConfidenceClassifier::new(3);
    assert_eq!(classifier.classify(3), Confidence::High);
    assert_eq!(classifier.classify(2), Confidence::Low);
  }

  #[test]
  fn test_display() {
    assert_eq!(Confidence::High.to_string(), "High");
    assert_eq!(Confidence::Low.to_string(), "Low");
  }
}

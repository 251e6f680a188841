use chrono::Duration;
use color_eyre::{
  eyre::{eyre, WrapErr},
  Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cache::{SqliteStore, TtlPolicy, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::error::ConfigError;
use crate::model::{
  BetaPrior, CareerAdjuster, ConfidenceClassifier, DecayAxis, DecayRates, EstimatorParams,
  FrequencyEstimator, PhaseRules, Predictor, RegressionParams, ThresholdSet,
  DEFAULT_CONFIDENCE_CUTOFF,
};

/// Upper bound on any cache TTL.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
  pub model: ModelConfig,
  pub logging: LoggingConfig,
  /// Thresholds evaluated when none are given on the command line
  pub thresholds: ThresholdSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  pub timeout_secs: u64,
  /// Page size for list endpoints (the API caps this at 100)
  pub per_page: u32,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.balldontlie.io/v1".to_string(),
      timeout_secs: 30,
      per_page: 100,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Set to false to always hit the network
  pub enabled: bool,
  /// Database file (defaults to the platform cache directory)
  pub path: Option<PathBuf>,
  pub ttl_secs: u64,
  /// Per-namespace TTL overrides, in seconds
  pub namespaces: BTreeMap<String, u64>,
  pub max_payload_bytes: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let day = 24 * 60 * 60;
    Self {
      enabled: true,
      path: None,
      ttl_secs: 6 * 60 * 60,
      namespaces: BTreeMap::from([
        ("balldontlie:teams".to_string(), day),
        ("balldontlie:season_averages".to_string(), day),
      ]),
      max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
  pub alpha: f64,
  pub small_sample_threshold: usize,
  pub prior: BetaPrior,
  pub confidence_cutoff: usize,
  /// Add career-phase decay weights to every estimate
  pub career_weighting: bool,
  pub decay: DecayRates,
  pub decay_axis: DecayAxis,
  pub phase_rules: PhaseRules,
  /// Windows for the fatigue, minutes and baseline-shift checks
  pub regression: RegressionParams,
}

impl Default for ModelConfig {
  fn default() -> Self {
    let params = EstimatorParams::default();
    Self {
      alpha: params.alpha,
      small_sample_threshold: params.small_sample_threshold,
      prior: params.prior,
      confidence_cutoff: DEFAULT_CONFIDENCE_CUTOFF,
      career_weighting: true,
      decay: DecayRates::default(),
      decay_axis: DecayAxis::default(),
      phase_rules: PhaseRules::default(),
      regression: RegressionParams::default(),
    }
  }
}

impl ModelConfig {
  pub fn estimator_params(&self) -> EstimatorParams {
    EstimatorParams {
      alpha: self.alpha,
      small_sample_threshold: self.small_sample_threshold,
      prior: self.prior,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Also write a daily-rotated log file here
  pub directory: Option<PathBuf>,
  /// Filter directive used when neither HOOPSTAT_LOG nor RUST_LOG is set
  pub filter: Option<String>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./hoopstat.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/hoopstat/config.yaml
  ///
  /// With no file found the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        debug!("no configuration file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("hoopstat.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("hoopstat").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  pub fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::parse(&contents)
      .wrap_err_with(|| format!("Invalid config file {}", path.display()))?;
    debug!(path = %path.display(), "loaded configuration");

    Ok(config)
  }

  /// Parse and validate YAML configuration text.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  /// Check the values a typo could make nonsensical.
  pub fn validate(&self) -> std::result::Result<(), ConfigError> {
    let model = &self.model;
    if !(model.alpha > 0.0 && model.alpha <= 1.0) {
      return Err(ConfigError::InvalidAlpha(model.alpha));
    }

    let BetaPrior { successes, failures } = model.prior;
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(successes) || !positive(failures) {
      return Err(ConfigError::InvalidPrior { successes, failures });
    }

    model.decay.validate()?;
    model.regression.validate()?;

    let ttls = std::iter::once(("default", self.cache.ttl_secs)).chain(
      self
        .cache
        .namespaces
        .iter()
        .map(|(namespace, secs)| (namespace.as_str(), *secs)),
    );
    for (namespace, secs) in ttls {
      if secs == 0 || secs > MAX_TTL_SECS {
        return Err(ConfigError::InvalidTtl {
          namespace: namespace.to_string(),
        });
      }
    }

    Ok(())
  }

  /// TTLs per namespace, from the cache section.
  pub fn ttl_policy(&self) -> TtlPolicy {
    self.cache.namespaces.iter().fold(
      TtlPolicy::new(seconds(self.cache.ttl_secs)),
      |policy, (namespace, secs)| policy.with_namespace(namespace.clone(), seconds(*secs)),
    )
  }

  pub fn cache_path(&self) -> PathBuf {
    self
      .cache
      .path
      .clone()
      .unwrap_or_else(SqliteStore::default_path)
  }

  /// Build the predictor described by the model section.
  pub fn predictor(&self) -> Result<Predictor> {
    let estimator = FrequencyEstimator::new(
      self.model.estimator_params(),
      ConfidenceClassifier::new(self.model.confidence_cutoff),
    )?;

    let career = if self.model.career_weighting {
      Some(CareerAdjuster::new(self.model.decay, self.model.decay_axis)?)
    } else {
      None
    };

    Ok(Predictor::new(estimator, career).with_regression(self.model.regression))
  }

  /// Get the API key from environment variables.
  ///
  /// Checks HOOPSTAT_API_KEY first, then NBA_API_KEY as fallback.
  pub fn get_api_key() -> Option<String> {
    std::env::var("HOOPSTAT_API_KEY")
      .or_else(|_| std::env::var("NBA_API_KEY"))
      .ok()
      .filter(|key| !key.trim().is_empty())
  }
}

fn seconds(secs: u64) -> Duration {
  Duration::seconds(secs.min(MAX_TTL_SECS) as i64)
}

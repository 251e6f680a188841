//! Probability model over a player's game log.

pub mod career;
pub mod confidence;
pub mod frequency;
pub mod predict;
pub mod regression;
pub mod weights;
pub mod zscore;

pub use career::{classify_career, CareerAdjuster, CareerPhase, DecayAxis, DecayRates, PhaseRules};
pub use confidence::{classify, Confidence, ConfidenceClassifier, DEFAULT_CONFIDENCE_CUTOFF};
pub use frequency::{
  binomial_test, wilson_interval, BetaPrior, EstimatorParams, FrequencyEstimator, Interval,
  SmoothedEstimate, ThresholdResult, SIGNIFICANCE_LEVEL,
};
pub use predict::{
  DynamicOutcome, DynamicPrediction, DynamicReport, PredictionReport, Predictor, StatPrediction,
  ThresholdOutcome, ThresholdSet,
};
pub use regression::{
  FatigueAnalysis, MinutesTrend, RegressionAdjustment, RegressionAnalysis, RegressionParams,
  StationarityAdjustment,
};
pub use weights::{decay_weights, recency_weights};
pub use zscore::{
  dynamic_thresholds, normalize, parse_minutes, DynamicThresholds, LadderStep, LeagueAverages,
};

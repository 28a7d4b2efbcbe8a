//! tierlift — Adaptive quality escalation for tiered pipeline stages
//!
//! A transcription pipeline has stages that can run at several cost tiers:
//! audio extraction profiles, speech model sizes. This library picks the
//! cheapest tier whose output is good enough:
//!
//! - `TierCatalog`: ordered tiers with per-tier thresholds and costs
//! - `QualityMetricsExtractor`: confidence, consistency, coverage and
//!   penalty scores folded into one `overall_score`
//! - `DecisionMatrix`: accept or escalate, with a machine-readable reason
//! - `InitialTierSelector`: skip the cheapest tier for obviously hard input
//! - `CostModel`: savings versus always running the top tier
//! - `EscalationController`: the loop, its guards and the audit trail
//!
//! # Usage
//!
//! ```rust,ignore
//! use tierlift::{CheapSignals, EscalationController, LadderConfig};
//!
//! let config = LadderConfig::from_file("ladder.toml")?.with_env_overrides()?;
//! let controller = EscalationController::new(config)?;
//! let result = controller.run(&CheapSignals::default(), &my_executor).await?;
//! println!("{}", result.summary());
//! ```

pub mod config;
pub mod error;
pub mod escalation;

pub use config::LadderConfig;
pub use error::{ConfigError, SelectionError, StageError};

pub use escalation::{
    AttemptRecord, CheapSignals, ControllerState, CostEstimate, CostModel, Decision,
    DecisionMatrix, DecisionRule, EscalationController, EscalationStats, EscalationTrail,
    InitialTierConfig, InitialTierRecommendation, InitialTierSelector, InputComplexity,
    MetricWeights, QualityMetrics, QualityMetricsExtractor, QualitySource, SelectionResult,
    SelectionSample, StageExecutor, StageOutput, Tier, TierCatalog, TierId, TierSpec, TimedPoint,
    Verdict, WeakTierRules, HIGHEST_TIER_REACHED,
};

//! Escalation — Cheap-first tier ladder with measured escalation
//!
//! Runs a pipeline stage at the cheapest plausible tier, scores the output,
//! and climbs to a costlier tier only while quality is insufficient.
//!
//! # Escalation Ladder
//!
//! ```text
//! InitialTierSelector ── cheap signals (duration, bitrate, speakers)
//!     │
//!     ▼
//! tier N ── execute ── QualityMetricsExtractor ── DecisionMatrix
//!     │                                              │
//!     │   accept ◄───────────────────────────────────┤
//!     │                                              │ escalate
//!     │   regression / repetition / budget guards ◄──┘
//!     ▼
//! tier N+1 ... top tier (never escalates: "highest tier reached")
//! ```

pub mod catalog;
pub mod controller;
pub mod cost;
pub mod decision;
pub mod initial_tier;
pub mod metrics;
pub mod state;
pub mod stats;
pub mod transcript;

pub use catalog::{Tier, TierCatalog, TierId, TierSpec};
pub use controller::{EscalationController, StageExecutor};
pub use cost::{CostEstimate, CostModel};
pub use decision::{DecisionMatrix, DecisionRule, Verdict, WeakTierRules, HIGHEST_TIER_REACHED};
pub use initial_tier::{
    CheapSignals, InitialTierConfig, InitialTierRecommendation, InitialTierSelector,
    InputComplexity,
};
pub use metrics::{
    MetricWeights, QualityMetrics, QualityMetricsExtractor, QualitySource, StageOutput,
    TimedPoint,
};
pub use state::{AttemptRecord, ControllerState, Decision, EscalationTrail, SelectionResult};
pub use stats::{EscalationStats, SelectionSample};

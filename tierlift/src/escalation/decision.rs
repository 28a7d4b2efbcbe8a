//! Decision Matrix — Accept or escalate one measured attempt
//!
//! Rules are checked in order and the first that fires wins:
//!
//! ```text
//! top tier                          → accept  "highest tier reached"
//! overall < tier threshold          → escalate (primary)
//! avg_confidence < minimum          → escalate (secondary)
//! cheapest N tiers:
//!   consistency < floor             → escalate (tertiary)
//!   penalty > ceiling               → escalate (tertiary)
//! otherwise                         → accept
//! ```
//!
//! The secondary rule exists because a healthy aggregate can hide a weak
//! core confidence. The tertiary rule catches tiers too small to produce
//! stable output at all.

use crate::escalation::catalog::{Tier, TierCatalog};
use crate::escalation::metrics::QualityMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reason used whenever the top tier is reached.
pub const HIGHEST_TIER_REACHED: &str = "highest tier reached";

/// Default minimum average confidence for acceptance.
pub const DEFAULT_MIN_ACCEPTABLE_CONFIDENCE: f64 = 0.8;

/// Extra stability checks applied to the cheapest tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeakTierRules {
    /// How many of the cheapest tiers the rules apply to
    pub count: usize,
    /// Escalate when consistency falls below this
    pub consistency_floor: f64,
    /// Escalate when the low-confidence penalty rises above this
    pub penalty_ceiling: f64,
}

impl Default for WeakTierRules {
    fn default() -> Self {
        Self {
            count: 2,
            consistency_floor: 0.6,
            penalty_ceiling: 0.3,
        }
    }
}

/// Which rule produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    HighestTier,
    OverallBelowThreshold,
    ConfidenceBelowMinimum,
    WeakTierInconsistent,
    WeakTierPenalty,
    Acceptable,
}

impl std::fmt::Display for DecisionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighestTier => write!(f, "highest_tier"),
            Self::OverallBelowThreshold => write!(f, "overall_below_threshold"),
            Self::ConfidenceBelowMinimum => write!(f, "confidence_below_minimum"),
            Self::WeakTierInconsistent => write!(f, "weak_tier_inconsistent"),
            Self::WeakTierPenalty => write!(f, "weak_tier_penalty"),
            Self::Acceptable => write!(f, "acceptable"),
        }
    }
}

/// Outcome of evaluating one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub escalate: bool,
    pub rule: DecisionRule,
    /// Machine-readable reason embedding the values that fired
    pub reason: String,
}

impl Verdict {
    fn accept(rule: DecisionRule, reason: String) -> Self {
        Self {
            escalate: false,
            rule,
            reason,
        }
    }

    fn escalate(rule: DecisionRule, reason: String) -> Self {
        Self {
            escalate: true,
            rule,
            reason,
        }
    }
}

/// Stateless accept/escalate rules over a shared catalog.
#[derive(Debug, Clone)]
pub struct DecisionMatrix {
    catalog: Arc<TierCatalog>,
    min_acceptable_confidence: f64,
    weak_tier: WeakTierRules,
}

impl DecisionMatrix {
    pub fn new(
        catalog: Arc<TierCatalog>,
        min_acceptable_confidence: f64,
        weak_tier: WeakTierRules,
    ) -> Self {
        Self {
            catalog,
            min_acceptable_confidence,
            weak_tier,
        }
    }

    pub fn min_acceptable_confidence(&self) -> f64 {
        self.min_acceptable_confidence
    }

    /// Floor an `overall_score` must reach for an attempt to count as
    /// acceptable in hand. Same value as the secondary rule's minimum, but
    /// compared against the aggregate score rather than `avg_confidence`.
    pub fn min_acceptable_score(&self) -> f64 {
        self.min_acceptable_confidence
    }

    /// Evaluate one attempt at `tier`.
    pub fn evaluate(&self, metrics: &QualityMetrics, tier: &Tier) -> Verdict {
        if self.catalog.is_highest(tier.id) {
            return Verdict::accept(DecisionRule::HighestTier, HIGHEST_TIER_REACHED.to_string());
        }

        if metrics.overall_score < tier.escalation_threshold {
            return Verdict::escalate(
                DecisionRule::OverallBelowThreshold,
                format!(
                    "overall_quality_score_{:.3}_below_threshold_{:.3}",
                    metrics.overall_score, tier.escalation_threshold
                ),
            );
        }

        if metrics.avg_confidence < self.min_acceptable_confidence {
            return Verdict::escalate(
                DecisionRule::ConfidenceBelowMinimum,
                format!(
                    "avg_confidence_{:.3}_below_minimum_{:.3}",
                    metrics.avg_confidence, self.min_acceptable_confidence
                ),
            );
        }

        if tier.id.index() < self.weak_tier.count {
            if metrics.consistency < self.weak_tier.consistency_floor {
                return Verdict::escalate(
                    DecisionRule::WeakTierInconsistent,
                    format!(
                        "weak_tier_consistency_{:.3}_below_{:.3}",
                        metrics.consistency, self.weak_tier.consistency_floor
                    ),
                );
            }
            if metrics.low_confidence_penalty > self.weak_tier.penalty_ceiling {
                return Verdict::escalate(
                    DecisionRule::WeakTierPenalty,
                    format!(
                        "weak_tier_penalty_{:.3}_above_{:.3}",
                        metrics.low_confidence_penalty, self.weak_tier.penalty_ceiling
                    ),
                );
            }
        }

        Verdict::accept(
            DecisionRule::Acceptable,
            format!(
                "quality_acceptable_{:.3}_meets_threshold_{:.3}",
                metrics.overall_score, tier.escalation_threshold
            ),
        )
    }

    /// `(escalate, reason)` form of [`DecisionMatrix::evaluate`].
    pub fn should_escalate(&self, metrics: &QualityMetrics, tier: &Tier) -> (bool, String) {
        let verdict = self.evaluate(metrics, tier);
        (verdict.escalate, verdict.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::catalog::{TierId, TierSpec};

    fn matrix() -> DecisionMatrix {
        let catalog = TierCatalog::from_specs(&[
            TierSpec::new("fast", 0.70, 1.0),
            TierSpec::new("balanced", 0.75, 2.0),
            TierSpec::new("high", 0.80, 3.5),
            TierSpec::new("premium", 0.90, 6.0),
        ])
        .unwrap();
        DecisionMatrix::new(
            Arc::new(catalog),
            DEFAULT_MIN_ACCEPTABLE_CONFIDENCE,
            WeakTierRules::default(),
        )
    }

    fn metrics(overall: f64, conf: f64, consistency: f64, penalty: f64) -> QualityMetrics {
        QualityMetrics {
            avg_confidence: conf,
            consistency,
            coverage: 1.0,
            low_confidence_penalty: penalty,
            overall_score: overall,
            point_count: 10,
            scored_point_count: 10,
        }
    }

    fn tier(m: &DecisionMatrix, id: usize) -> Tier {
        m.catalog.get(TierId(id)).unwrap().clone()
    }

    #[test]
    fn test_primary_rule_reason_format() {
        let m = matrix();
        let (escalate, reason) = m.should_escalate(&metrics(0.71, 0.9, 0.9, 0.0), &tier(&m, 1));
        assert!(escalate);
        assert_eq!(reason, "overall_quality_score_0.710_below_threshold_0.750");
    }

    #[test]
    fn test_secondary_rule_fires_when_primary_passes() {
        let m = matrix();
        let v = m.evaluate(&metrics(0.82, 0.79, 0.95, 0.0), &tier(&m, 2));
        assert!(v.escalate);
        assert_eq!(v.rule, DecisionRule::ConfidenceBelowMinimum);
        assert_eq!(v.reason, "avg_confidence_0.790_below_minimum_0.800");
    }

    #[test]
    fn test_tertiary_rules_only_on_weak_tiers() {
        let m = matrix();
        let unstable = metrics(0.85, 0.85, 0.5, 0.0);

        let v = m.evaluate(&unstable, &tier(&m, 0));
        assert_eq!(v.rule, DecisionRule::WeakTierInconsistent);
        let v = m.evaluate(&unstable, &tier(&m, 1));
        assert_eq!(v.rule, DecisionRule::WeakTierInconsistent);
        // "high" is the third tier, outside the weak set.
        let v = m.evaluate(&unstable, &tier(&m, 2));
        assert!(!v.escalate);
        assert_eq!(v.rule, DecisionRule::Acceptable);

        let noisy = metrics(0.85, 0.85, 0.9, 0.4);
        let v = m.evaluate(&noisy, &tier(&m, 0));
        assert_eq!(v.rule, DecisionRule::WeakTierPenalty);
        assert_eq!(v.reason, "weak_tier_penalty_0.400_above_0.300");
    }

    #[test]
    fn test_highest_tier_never_escalates() {
        let m = matrix();
        for overall in [0.0, 0.3, 0.89, 1.0] {
            let result = m.should_escalate(&metrics(overall, 0.0, 0.0, 1.0), &tier(&m, 3));
            assert_eq!(result, (false, HIGHEST_TIER_REACHED.to_string()));
        }
    }

    #[test]
    fn test_accept_reason() {
        let m = matrix();
        let v = m.evaluate(&metrics(0.84, 0.85, 1.0, 0.0), &tier(&m, 0));
        assert!(!v.escalate);
        assert_eq!(v.reason, "quality_acceptable_0.840_meets_threshold_0.700");
    }

    #[test]
    fn test_configurable_weak_tier_cutoffs() {
        let catalog = Arc::new(
            TierCatalog::from_specs(&[
                TierSpec::new("tiny", 0.6, 1.0),
                TierSpec::new("large", 0.8, 8.0),
            ])
            .unwrap(),
        );
        let lenient = WeakTierRules {
            count: 1,
            consistency_floor: 0.3,
            penalty_ceiling: 0.6,
        };
        let m = DecisionMatrix::new(catalog.clone(), 0.5, lenient);
        let tiny = catalog.get(TierId(0)).unwrap();
        assert!(!m.evaluate(&metrics(0.7, 0.7, 0.5, 0.4), tiny).escalate);
    }
}

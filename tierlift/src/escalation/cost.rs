//! Cost Model — Savings versus always running the top tier
//!
//! Baseline costs are relative, so only ratios matter. Failed attempts
//! are charged at full tier cost: the work was spent even if nothing came
//! back.

use crate::escalation::catalog::TierCatalog;
use crate::escalation::state::EscalationTrail;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Cost accounting for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Sum of baseline costs of every attempted tier
    pub spent_cost: f64,
    /// Baseline cost of a single top-tier run
    pub top_tier_cost: f64,
    /// `1 - spent / top`; negative when escalation cost more than going straight to the top
    pub savings_ratio: f64,
    /// Wall-clock estimate of time saved, when the actual time is known
    pub time_saved_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CostModel {
    catalog: Arc<TierCatalog>,
}

impl CostModel {
    pub fn new(catalog: Arc<TierCatalog>) -> Self {
        Self { catalog }
    }

    /// Baseline cost charged for the attempts in `trail`.
    pub fn spent_cost(&self, trail: &EscalationTrail) -> f64 {
        trail
            .iter()
            .filter_map(|r| self.catalog.get(r.tier_id))
            .map(|t| t.baseline_cost)
            .sum()
    }

    /// Estimate savings for a finished trail.
    ///
    /// With `total_time`, the top-tier run time is extrapolated from the
    /// observed cost rate (`total_time / spent_cost`).
    pub fn estimate(&self, trail: &EscalationTrail, total_time: Option<Duration>) -> CostEstimate {
        let top_tier_cost = self.catalog.highest().baseline_cost;
        let spent_cost = self.spent_cost(trail);

        let savings_ratio = if top_tier_cost > 0.0 {
            1.0 - spent_cost / top_tier_cost
        } else {
            0.0
        };

        let time_saved_secs = total_time.filter(|_| spent_cost > 0.0).map(|actual| {
            let actual = actual.as_secs_f64();
            let top_tier_time = actual * top_tier_cost / spent_cost;
            top_tier_time - actual
        });

        CostEstimate {
            spent_cost,
            top_tier_cost,
            savings_ratio,
            time_saved_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::catalog::{TierId, TierSpec};
    use crate::escalation::state::{AttemptRecord, Decision};
    use chrono::Utc;

    fn model() -> CostModel {
        CostModel::new(Arc::new(
            TierCatalog::from_specs(&[
                TierSpec::new("fast", 0.70, 1.0),
                TierSpec::new("balanced", 0.75, 2.0),
                TierSpec::new("high", 0.80, 3.0),
                TierSpec::new("premium", 0.90, 8.0),
            ])
            .unwrap(),
        ))
    }

    fn trail(tiers: &[usize]) -> EscalationTrail {
        let mut trail = EscalationTrail::new();
        for (i, tier) in tiers.iter().enumerate() {
            let last = i + 1 == tiers.len();
            trail.push(AttemptRecord {
                tier_id: TierId(*tier),
                tier_name: format!("t{}", tier),
                metrics: None,
                succeeded: false,
                processing_time: Duration::ZERO,
                decision: if last {
                    Decision::Accept
                } else {
                    Decision::Escalate
                },
                reason: String::new(),
                timestamp: Utc::now(),
            });
        }
        trail
    }

    #[test]
    fn test_cheapest_only_saves_most() {
        let est = model().estimate(&trail(&[0]), None);
        assert_eq!(est.spent_cost, 1.0);
        assert_eq!(est.top_tier_cost, 8.0);
        assert!((est.savings_ratio - 0.875).abs() < 1e-9);
        assert!(est.time_saved_secs.is_none());
    }

    #[test]
    fn test_full_ladder_costs_more_than_top() {
        let est = model().estimate(&trail(&[0, 1, 2, 3]), None);
        assert_eq!(est.spent_cost, 14.0);
        assert!(est.savings_ratio < 0.0);
    }

    #[test]
    fn test_time_saved_extrapolation() {
        // Spent 2.0 cost units in 10s → top tier (8.0) would take 40s.
        let est = model().estimate(&trail(&[1]), Some(Duration::from_secs(10)));
        let saved = est.time_saved_secs.unwrap();
        assert!((saved - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_trail() {
        let est = model().estimate(&EscalationTrail::new(), Some(Duration::from_secs(1)));
        assert_eq!(est.spent_cost, 0.0);
        assert_eq!(est.savings_ratio, 1.0);
        assert!(est.time_saved_secs.is_none());
    }
}

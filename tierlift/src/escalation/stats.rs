//! Escalation Stats — Operational summary over many invocations
//!
//! Aggregates finished selections into the numbers operators watch: how
//! often the ladder climbs, where runs end up, and what the cheap-first
//! policy saves. When the cheapest tier almost always escalates, starting
//! one tier higher is cheaper on average; `suggests_skipping_cheapest`
//! surfaces that.

use crate::escalation::state::{Decision, SelectionResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Escalation rate at the cheapest tier above which skipping it pays off.
pub const SKIP_CHEAPEST_RATE: f64 = 0.8;

/// Minimum sample size before any suggestion is made.
pub const MIN_SAMPLES: usize = 20;

/// Lightweight, serializable digest of one `SelectionResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSample {
    /// Tier whose output was returned
    pub final_tier: String,
    /// Tier of the first attempt
    pub first_tier: String,
    pub attempts: usize,
    pub escalations: usize,
    pub failed_attempts: usize,
    pub quality: f64,
    pub time_saved_estimate: f64,
    /// Whether acceptance was forced (`accept_final`)
    pub forced: bool,
}

impl<O> From<&SelectionResult<O>> for SelectionSample {
    fn from(result: &SelectionResult<O>) -> Self {
        Self {
            final_tier: result.final_tier.name.clone(),
            first_tier: result
                .trail
                .records()
                .first()
                .map(|r| r.tier_name.clone())
                .unwrap_or_default(),
            attempts: result.trail.len(),
            escalations: result.trail.escalations(),
            failed_attempts: result.trail.failures(),
            quality: result.quality_achieved,
            time_saved_estimate: result.time_saved_estimate,
            forced: result.terminal_decision() == Some(Decision::AcceptFinal),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationStats {
    pub sample_count: usize,
    /// Share of invocations that escalated at least once
    pub escalation_rate: f64,
    /// Share of invocations whose acceptance was forced
    pub forced_rate: f64,
    pub avg_attempts: f64,
    pub avg_quality: f64,
    pub avg_time_saved: f64,
    /// Share of attempts that failed or timed out
    pub attempt_failure_rate: f64,
    /// Final tier name → count
    pub final_tier_counts: BTreeMap<String, usize>,
    /// Escalation rate among invocations that started at `cheapest_tier`
    pub cheapest_escalation_rate: f64,
    pub cheapest_tier: Option<String>,
}

impl EscalationStats {
    /// Aggregate samples. `cheapest_tier` names the catalog's first tier.
    pub fn from_samples(samples: &[SelectionSample], cheapest_tier: &str) -> Self {
        if samples.is_empty() {
            return Self {
                cheapest_tier: Some(cheapest_tier.to_string()),
                ..Self::default()
            };
        }

        let n = samples.len() as f64;
        let escalated = samples.iter().filter(|s| s.escalations > 0).count();
        let forced = samples.iter().filter(|s| s.forced).count();
        let total_attempts: usize = samples.iter().map(|s| s.attempts).sum();
        let failed_attempts: usize = samples.iter().map(|s| s.failed_attempts).sum();

        let mut final_tier_counts = BTreeMap::new();
        for s in samples {
            *final_tier_counts.entry(s.final_tier.clone()).or_insert(0) += 1;
        }

        let from_cheapest: Vec<&SelectionSample> = samples
            .iter()
            .filter(|s| s.first_tier == cheapest_tier)
            .collect();
        let cheapest_escalation_rate = if from_cheapest.is_empty() {
            0.0
        } else {
            from_cheapest.iter().filter(|s| s.escalations > 0).count() as f64
                / from_cheapest.len() as f64
        };

        Self {
            sample_count: samples.len(),
            escalation_rate: escalated as f64 / n,
            forced_rate: forced as f64 / n,
            avg_attempts: total_attempts as f64 / n,
            avg_quality: samples.iter().map(|s| s.quality).sum::<f64>() / n,
            avg_time_saved: samples.iter().map(|s| s.time_saved_estimate).sum::<f64>() / n,
            attempt_failure_rate: if total_attempts == 0 {
                0.0
            } else {
                failed_attempts as f64 / total_attempts as f64
            },
            final_tier_counts,
            cheapest_escalation_rate,
            cheapest_tier: Some(cheapest_tier.to_string()),
        }
    }

    pub fn from_results<O>(results: &[SelectionResult<O>], cheapest_tier: &str) -> Self {
        let samples: Vec<SelectionSample> = results.iter().map(SelectionSample::from).collect();
        Self::from_samples(&samples, cheapest_tier)
    }

    /// True when enough runs show the cheapest tier is nearly always wasted.
    pub fn suggests_skipping_cheapest(&self) -> bool {
        self.sample_count >= MIN_SAMPLES && self.cheapest_escalation_rate > SKIP_CHEAPEST_RATE
    }

    pub fn summary(&self) -> String {
        format!(
            "samples={} escalation_rate={:.2} forced_rate={:.2} avg_attempts={:.2} avg_quality={:.3} avg_saved={:.1}%",
            self.sample_count,
            self.escalation_rate,
            self.forced_rate,
            self.avg_attempts,
            self.avg_quality,
            self.avg_time_saved * 100.0
        )
    }
}

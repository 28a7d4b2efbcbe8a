//! Escalation State — Attempt records, the audit trail and the result type

use crate::escalation::catalog::{Tier, TierId};
use crate::escalation::metrics::QualityMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// What the controller decided after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Quality met the bar at this tier
    Accept,
    /// Move on to the next tier
    Escalate,
    /// Acceptance forced by the ceiling, the budget or a guard
    AcceptFinal,
    /// Invocation failed with nothing usable in hand
    Failed,
}

impl Decision {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Escalate)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Escalate => write!(f, "escalate"),
            Self::AcceptFinal => write!(f, "accept_final"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Controller state machine.
///
/// ```text
/// SelectingInitial → Running(t) → Evaluating(t) ─┬→ Escalating → Running(t+1)
///                                                ├→ Accepted
///                                                └→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "tier")]
pub enum ControllerState {
    SelectingInitial,
    Running(TierId),
    Evaluating(TierId),
    Escalating(TierId),
    Accepted,
    Failed,
}

impl ControllerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ControllerState) -> bool {
        use ControllerState::*;
        match (self, next) {
            (SelectingInitial, Running(_)) => true,
            (Running(a), Evaluating(b)) => a == b,
            (Evaluating(_), Accepted | Failed) => true,
            (Evaluating(a), Escalating(b)) => b > a,
            (Escalating(a), Running(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelectingInitial => write!(f, "selecting_initial"),
            Self::Running(t) => write!(f, "running({})", t),
            Self::Evaluating(t) => write!(f, "evaluating({})", t),
            Self::Escalating(t) => write!(f, "escalating({})", t),
            Self::Accepted => write!(f, "accepted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Record of a single tier attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub tier_id: TierId,
    pub tier_name: String,
    /// `None` when the attempt failed or timed out
    pub metrics: Option<QualityMetrics>,
    pub succeeded: bool,
    #[serde(with = "duration_secs")]
    pub processing_time: Duration,
    pub decision: Decision,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn overall_score(&self) -> Option<f64> {
        self.metrics.map(|m| m.overall_score)
    }
}

/// Ordered audit log of one invocation. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscalationTrail {
    records: Vec<AttemptRecord>,
}

impl EscalationTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: AttemptRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&AttemptRecord> {
        self.records.get(index)
    }

    pub fn last(&self) -> Option<&AttemptRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.records.iter()
    }

    pub fn attempted(&self, tier: TierId) -> bool {
        self.records.iter().any(|r| r.tier_id == tier)
    }

    pub fn tier_ids(&self) -> Vec<TierId> {
        self.records.iter().map(|r| r.tier_id).collect()
    }

    /// Number of escalation transitions recorded so far.
    pub fn escalations(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.decision == Decision::Escalate)
            .count()
    }

    pub fn failures(&self) -> usize {
        self.records.iter().filter(|r| !r.succeeded).count()
    }

    /// Index of the best successful attempt. Ties keep the earlier one.
    pub fn best_successful(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, record) in self.records.iter().enumerate() {
            if !record.succeeded {
                continue;
            }
            let Some(score) = record.overall_score() else {
                continue;
            };
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((idx, score)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Tier ids strictly increase, no tier repeats, and exactly the last
    /// record is terminal.
    pub fn is_well_formed(&self) -> bool {
        let increasing = self.records.windows(2).all(|w| w[0].tier_id < w[1].tier_id);
        let terminal_last = match self.records.split_last() {
            Some((last, rest)) => {
                last.decision.is_terminal() && rest.iter().all(|r| !r.decision.is_terminal())
            }
            None => true,
        };
        increasing && terminal_last
    }

    /// Compact one-line rendering for logs, e.g. `fast:escalate → balanced:accept`.
    pub fn summary(&self) -> String {
        self.records
            .iter()
            .map(|r| format!("{}:{}", r.tier_name, r.decision))
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

/// Outcome of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult<O> {
    pub invocation_id: Uuid,
    /// Tier whose output is returned (the best successful attempt)
    pub final_tier: Tier,
    pub output: O,
    pub trail: EscalationTrail,
    /// Index into `trail` of the attempt whose output is returned
    pub selected_attempt: usize,
    #[serde(with = "duration_secs")]
    pub total_time: Duration,
    /// Overall score of the returned attempt
    pub quality_achieved: f64,
    /// Fraction of top-tier cost saved (negative when escalation overhead
    /// exceeded a direct top-tier run)
    pub time_saved_estimate: f64,
}

impl<O> SelectionResult<O> {
    pub fn selected_record(&self) -> Option<&AttemptRecord> {
        self.trail.get(self.selected_attempt)
    }

    pub fn selected_metrics(&self) -> Option<QualityMetrics> {
        self.selected_record().and_then(|r| r.metrics)
    }

    /// Decision on the terminal record.
    pub fn terminal_decision(&self) -> Option<Decision> {
        self.trail.last().map(|r| r.decision)
    }

    pub fn escalated(&self) -> bool {
        self.trail.escalations() > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "id={} tier={} quality={:.3} attempts={} saved={:.1}% trail=[{}]",
            self.invocation_id,
            self.final_tier.name,
            self.quality_achieved,
            self.trail.len(),
            self.time_saved_estimate * 100.0,
            self.trail.summary(),
        )
    }
}

/// Durations as fractional seconds in serialized records.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

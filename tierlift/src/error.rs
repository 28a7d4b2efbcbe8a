//! Error types
//!
//! Configuration problems are fatal at startup. Stage failures are recovered
//! by escalation and only surface through [`SelectionError`] when nothing
//! usable is left in hand.

use crate::escalation::state::EscalationTrail;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration. Raised once while building a [`crate::LadderConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tier catalog is empty")]
    EmptyCatalog,

    #[error("duplicate tier name: {0}")]
    DuplicateTier(String),

    #[error("invalid tier '{tier}': {message}")]
    InvalidTier { tier: String, message: String },

    #[error("tier {field} must not decrease: '{prev}' → '{next}'")]
    NonMonotonic {
        field: &'static str,
        prev: String,
        next: String,
    },

    #[error("unusable metric weights: {0}")]
    InvalidWeights(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure of a single stage attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StageError {
    #[error("stage failed: {0}")]
    Failed(String),

    #[error("stage timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),

    #[error("stage cancelled")]
    Cancelled,
}

impl StageError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Terminal failure of a whole invocation.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// Every attempt failed and no higher tier or budget remained.
    #[error("all attempts failed; last failure: {last_failure}")]
    AllAttemptsFailed {
        last_failure: StageError,
        trail: EscalationTrail,
    },

    /// The caller cancelled before a result was reached.
    #[error("selection cancelled after {completed_attempts} completed attempt(s)")]
    Cancelled { completed_attempts: usize },
}

impl SelectionError {
    /// Audit trail, when the failure carries one.
    pub fn trail(&self) -> Option<&EscalationTrail> {
        match self {
            Self::AllAttemptsFailed { trail, .. } => Some(trail),
            Self::Cancelled { .. } => None,
        }
    }
}

pub type SelectionOutcome<T> = Result<T, SelectionError>;

//! Ladder configuration
//!
//! One `LadderConfig` is built at startup (defaults, then an optional TOML
//! file, then `TIERLIFT_*` environment overrides), validated once, and
//! shared read-only by every invocation.
//!
//! ```toml
//! max_escalations = 3
//! min_acceptable_confidence = 0.8
//! per_attempt_timeout_secs = 300
//!
//! [[tiers]]
//! name = "fast"
//! threshold = 0.70
//! baseline_cost = 1.0
//!
//! [metric_weights]
//! confidence = 0.4
//! consistency = 0.3
//! coverage = 0.2
//! penalty = 0.1
//!
//! [weak_tier]
//! count = 2
//! consistency_floor = 0.6
//! penalty_ceiling = 0.3
//! ```

use crate::error::ConfigError;
use crate::escalation::catalog::{TierCatalog, TierSpec};
use crate::escalation::decision::{WeakTierRules, DEFAULT_MIN_ACCEPTABLE_CONFIDENCE};
use crate::escalation::initial_tier::InitialTierConfig;
use crate::escalation::metrics::{MetricWeights, DEFAULT_LOW_CONFIDENCE_CUTOFF};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_MAX_ESCALATIONS: &str = "TIERLIFT_MAX_ESCALATIONS";
pub const ENV_MIN_CONFIDENCE: &str = "TIERLIFT_MIN_CONFIDENCE";
pub const ENV_ATTEMPT_TIMEOUT_SECS: &str = "TIERLIFT_ATTEMPT_TIMEOUT_SECS";
pub const ENV_INITIAL_TIER_ENABLED: &str = "TIERLIFT_INITIAL_TIER_ENABLED";

/// Process-wide escalation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    /// Tiers, cheapest first
    pub tiers: Vec<TierSpec>,
    pub metric_weights: MetricWeights,
    /// Hard cap on escalation transitions per invocation
    pub max_escalations: usize,
    pub min_acceptable_confidence: f64,
    pub per_attempt_timeout_secs: f64,
    pub low_confidence_cutoff: f64,
    pub weak_tier: WeakTierRules,
    pub initial_tier: InitialTierConfig,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self::audio_quality()
    }
}

impl LadderConfig {
    fn with_tiers(tiers: Vec<TierSpec>) -> Self {
        Self {
            tiers,
            metric_weights: MetricWeights::default(),
            max_escalations: 3,
            min_acceptable_confidence: DEFAULT_MIN_ACCEPTABLE_CONFIDENCE,
            per_attempt_timeout_secs: 300.0,
            low_confidence_cutoff: DEFAULT_LOW_CONFIDENCE_CUTOFF,
            weak_tier: WeakTierRules::default(),
            initial_tier: InitialTierConfig::default(),
        }
    }

    /// Audio extraction profiles, from low-bitrate mono up to lossless.
    pub fn audio_quality() -> Self {
        Self::with_tiers(vec![
            TierSpec::new("fast", 0.70, 1.0),
            TierSpec::new("balanced", 0.75, 1.6),
            TierSpec::new("high", 0.80, 2.5),
            TierSpec::new("premium", 0.90, 4.0),
        ])
    }

    /// Speech model sizes, smallest first.
    pub fn model_quality() -> Self {
        let mut config = Self::with_tiers(vec![
            TierSpec::new("tiny", 0.65, 1.0),
            TierSpec::new("base", 0.70, 2.0),
            TierSpec::new("small", 0.75, 4.0),
            TierSpec::new("medium", 0.80, 8.0),
            TierSpec::new("large", 0.85, 16.0),
        ]);
        config.per_attempt_timeout_secs = 900.0;
        config
    }

    /// Parse from TOML. Unspecified fields keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `TIERLIFT_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_ESCALATIONS) {
            self.max_escalations = parse_override(ENV_MAX_ESCALATIONS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MIN_CONFIDENCE) {
            self.min_acceptable_confidence = parse_override(ENV_MIN_CONFIDENCE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ATTEMPT_TIMEOUT_SECS) {
            self.per_attempt_timeout_secs = parse_override(ENV_ATTEMPT_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_INITIAL_TIER_ENABLED) {
            self.initial_tier.enabled = raw == "1" || raw.eq_ignore_ascii_case("true");
        }
        Ok(self)
    }

    /// Per-attempt bound. Out-of-range values saturate to `Duration::MAX`;
    /// `validate()` rejects them before a controller is built.
    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.per_attempt_timeout_secs).unwrap_or(Duration::MAX)
    }

    /// Build the catalog, validating every tier.
    pub fn catalog(&self) -> Result<TierCatalog, ConfigError> {
        TierCatalog::from_specs(&self.tiers)
    }

    /// Validate everything. Fails on the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.catalog()?;
        self.metric_weights.validate()?;
        unit_interval("min_acceptable_confidence", self.min_acceptable_confidence)?;
        unit_interval("low_confidence_cutoff", self.low_confidence_cutoff)?;
        unit_interval("weak_tier.consistency_floor", self.weak_tier.consistency_floor)?;
        unit_interval("weak_tier.penalty_ceiling", self.weak_tier.penalty_ceiling)?;
        unit_interval(
            "initial_tier.complexity_hint_threshold",
            self.initial_tier.complexity_hint_threshold,
        )?;
        if !self.per_attempt_timeout_secs.is_finite() || self.per_attempt_timeout_secs <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "per_attempt_timeout_secs",
                message: format!("must be > 0, got {}", self.per_attempt_timeout_secs),
            });
        }
        if Duration::try_from_secs_f64(self.per_attempt_timeout_secs).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "per_attempt_timeout_secs",
                message: format!("out of range: {}", self.per_attempt_timeout_secs),
            });
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "tiers={} max_escalations={} min_confidence={:.2} timeout={}s",
            self.tiers
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
            self.max_escalations,
            self.min_acceptable_confidence,
            self.per_attempt_timeout_secs,
        )
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            message: format!("must be in [0, 1], got {}", value),
        })
    }
}

fn parse_override<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: key,
        message: format!("cannot parse '{}'", raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_presets_validate() {
        assert!(LadderConfig::audio_quality().validate().is_ok());
        assert!(LadderConfig::model_quality().validate().is_ok());
        assert_eq!(LadderConfig::default(), LadderConfig::audio_quality());
    }

    #[test]
    fn test_defaults() {
        let config = LadderConfig::default();
        assert_eq!(config.max_escalations, 3);
        assert_eq!(config.min_acceptable_confidence, 0.8);
        assert_eq!(config.low_confidence_cutoff, 0.7);
        assert_eq!(config.weak_tier.count, 2);
        assert_eq!(config.per_attempt_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LadderConfig::from_toml_str(
            r#"
max_escalations = 1

[[tiers]]
name = "tiny"
threshold = 0.6
baseline_cost = 1.0

[[tiers]]
name = "large"
threshold = 0.85
baseline_cost = 10.0

[weak_tier]
consistency_floor = 0.5
"#,
        )
        .unwrap();
        assert_eq!(config.max_escalations, 1);
        assert_eq!(config.tiers.len(), 2);
        assert_eq!(config.weak_tier.consistency_floor, 0.5);
        assert_eq!(config.weak_tier.penalty_ceiling, 0.3);
        assert_eq!(config.metric_weights, MetricWeights::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = LadderConfig::from_toml_str("max_escalations = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_failures() {
        let empty = LadderConfig {
            tiers: vec![],
            ..Default::default()
        };
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyCatalog)));

        let bad_conf = LadderConfig {
            min_acceptable_confidence: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            bad_conf.validate(),
            Err(ConfigError::InvalidValue {
                field: "min_acceptable_confidence",
                ..
            })
        ));

        let no_timeout = LadderConfig {
            per_attempt_timeout_secs: 0.0,
            ..Default::default()
        };
        assert!(no_timeout.validate().is_err());

        let bad_weights = LadderConfig {
            metric_weights: MetricWeights {
                confidence: -1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            bad_weights.validate(),
            Err(ConfigError::InvalidWeights(_))
        ));
    }

    #[test]
    fn test_huge_timeout_rejected_not_zeroed() {
        let huge = LadderConfig {
            per_attempt_timeout_secs: 1e20,
            ..Default::default()
        };
        assert!(matches!(
            huge.validate(),
            Err(ConfigError::InvalidValue {
                field: "per_attempt_timeout_secs",
                ..
            })
        ));
        assert_eq!(huge.per_attempt_timeout(), Duration::MAX);

        let week = LadderConfig {
            per_attempt_timeout_secs: 7.0 * 24.0 * 3600.0,
            ..Default::default()
        };
        assert!(week.validate().is_ok());
        assert_eq!(week.per_attempt_timeout(), Duration::from_secs(7 * 24 * 3600));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_MAX_ESCALATIONS, "5"),
            (ENV_MIN_CONFIDENCE, "0.75"),
            (ENV_ATTEMPT_TIMEOUT_SECS, "12.5"),
            (ENV_INITIAL_TIER_ENABLED, "false"),
        ]
        .into_iter()
        .collect();
        let config = LadderConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.max_escalations, 5);
        assert_eq!(config.min_acceptable_confidence, 0.75);
        assert_eq!(config.per_attempt_timeout(), Duration::from_millis(12_500));
        assert!(!config.initial_tier.enabled);
    }

    #[test]
    fn test_unparseable_override_is_error() {
        let err = LadderConfig::default()
            .with_overrides(|k| (k == ENV_MAX_ESCALATIONS).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: ENV_MAX_ESCALATIONS,
                ..
            }
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ladder.toml");
        std::fs::write(&path, "min_acceptable_confidence = 0.7\n").unwrap();
        let config = LadderConfig::from_file(&path).unwrap();
        assert_eq!(config.min_acceptable_confidence, 0.7);
        assert_eq!(config.tiers.len(), 4);

        let missing = LadderConfig::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}

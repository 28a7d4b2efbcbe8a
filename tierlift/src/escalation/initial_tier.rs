//! Initial Tier Selection: Skip attempts that are bound to fail
//!
//! Before anything runs, cheap static signals about the input hint at
//! whether the cheapest tier will need escalating anyway:
//!
//! ```text
//! CheapSignals → classify → InitialTierRecommendation
//!   │                              │
//!   │  Simple (short, clean)       │→ cheapest
//!   │  Medium (one adverse sign)   │→ cheapest (escalation handles it)
//!   │  Complex (2+ signs, or hint) │→ cheapest + 1
//!   │  Unknown (no signals)        │→ cheapest
//! ```
//!
//! This is only a cost optimization. A wrong guess costs one extra attempt
//! and is corrected by the normal loop.

use crate::escalation::catalog::{TierCatalog, TierId};
use serde::{Deserialize, Serialize};

/// Signals available before any stage runs. All optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheapSignals {
    /// Media duration in seconds
    pub duration_secs: Option<f64>,
    /// Input file size in bytes
    pub file_size_bytes: Option<u64>,
    /// Estimated number of distinct speakers
    pub speaker_count: Option<u32>,
    /// Coarse complexity proxy in [0, 1] (noise, music bed, crosstalk)
    pub complexity_hint: Option<f64>,
}

impl CheapSignals {
    pub fn is_empty(&self) -> bool {
        self.duration_secs.is_none()
            && self.file_size_bytes.is_none()
            && self.speaker_count.is_none()
            && self.complexity_hint.is_none()
    }

    /// Effective bitrate in kbit/s, when both size and duration are known.
    pub fn bitrate_kbps(&self) -> Option<f64> {
        let duration = self.duration_secs.filter(|d| d.is_finite() && *d > 0.0)?;
        let size = self.file_size_bytes?;
        Some(size as f64 * 8.0 / duration / 1000.0)
    }
}

/// Thresholds for the initial tier classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialTierConfig {
    pub enabled: bool,
    /// Durations at or above this count as adverse
    pub long_duration_secs: f64,
    /// Bitrates below this count as adverse
    pub low_bitrate_kbps: f64,
    /// Speaker counts at or above this count as adverse
    pub many_speakers: u32,
    /// Complexity hints at or above this classify as complex on their own
    pub complexity_hint_threshold: f64,
}

impl Default for InitialTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            long_duration_secs: 1800.0,
            low_bitrate_kbps: 48.0,
            many_speakers: 4,
            complexity_hint_threshold: 0.75,
        }
    }
}

/// Assessed difficulty of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputComplexity {
    Simple,
    Medium,
    Complex,
    Unknown,
}

impl std::fmt::Display for InputComplexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Medium => write!(f, "medium"),
            Self::Complex => write!(f, "complex"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Recommendation for the starting tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialTierRecommendation {
    pub tier: TierId,
    pub complexity: InputComplexity,
    pub reason: String,
    /// Confidence in the classification (0.0 to 1.0)
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct InitialTierSelector {
    config: InitialTierConfig,
}

impl Default for InitialTierSelector {
    fn default() -> Self {
        Self::new(InitialTierConfig::default())
    }
}

impl InitialTierSelector {
    pub fn new(config: InitialTierConfig) -> Self {
        Self { config }
    }

    /// Names of the adverse signals present in `signals`.
    pub fn adverse_signals(&self, signals: &CheapSignals) -> Vec<&'static str> {
        let mut adverse = Vec::new();
        if signals
            .duration_secs
            .is_some_and(|d| d >= self.config.long_duration_secs)
        {
            adverse.push("long_duration");
        }
        if signals
            .bitrate_kbps()
            .is_some_and(|kbps| kbps < self.config.low_bitrate_kbps)
        {
            adverse.push("low_bitrate");
        }
        if signals
            .speaker_count
            .is_some_and(|n| n >= self.config.many_speakers)
        {
            adverse.push("many_speakers");
        }
        if signals
            .complexity_hint
            .is_some_and(|h| h >= self.config.complexity_hint_threshold)
        {
            adverse.push("high_complexity_hint");
        }
        adverse
    }

    pub fn classify(&self, signals: &CheapSignals) -> InputComplexity {
        if signals.is_empty() {
            return InputComplexity::Unknown;
        }
        let adverse = self.adverse_signals(signals);
        if adverse.len() >= 2 || adverse.contains(&"high_complexity_hint") {
            InputComplexity::Complex
        } else if adverse.len() == 1 {
            InputComplexity::Medium
        } else {
            InputComplexity::Simple
        }
    }

    /// Pick the starting tier. Always a valid id in `catalog`.
    pub fn select_initial_tier(
        &self,
        signals: &CheapSignals,
        catalog: &TierCatalog,
    ) -> InitialTierRecommendation {
        let cheapest = catalog.cheapest().id;

        if !self.config.enabled {
            return InitialTierRecommendation {
                tier: cheapest,
                complexity: InputComplexity::Unknown,
                reason: "initial tier selection disabled: starting at cheapest".to_string(),
                confidence: 0.5,
            };
        }

        let complexity = self.classify(signals);
        let adverse = self.adverse_signals(signals).join(",");

        let (tier, reason, confidence) = match complexity {
            InputComplexity::Complex => match catalog.next(cheapest) {
                Some(next) => (
                    next.id,
                    format!("complex input ({}): skipping cheapest tier", adverse),
                    0.75,
                ),
                None => (
                    cheapest,
                    format!("complex input ({}): single-tier catalog", adverse),
                    0.75,
                ),
            },
            InputComplexity::Medium => (
                cheapest,
                format!("medium input ({}): cheapest with escalation readiness", adverse),
                0.6,
            ),
            InputComplexity::Simple => (
                cheapest,
                "simple input: cheapest tier".to_string(),
                0.85,
            ),
            InputComplexity::Unknown => (
                cheapest,
                "no signals: cheapest tier by default".to_string(),
                0.5,
            ),
        };

        InitialTierRecommendation {
            tier: catalog.clamp(tier),
            complexity,
            reason,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::catalog::TierSpec;

    fn catalog() -> TierCatalog {
        TierCatalog::from_specs(&[
            TierSpec::new("fast", 0.70, 1.0),
            TierSpec::new("balanced", 0.75, 2.0),
            TierSpec::new("high", 0.80, 3.5),
        ])
        .unwrap()
    }

    #[test]
    fn test_no_signals_defaults_to_cheapest() {
        let selector = InitialTierSelector::default();
        let rec = selector.select_initial_tier(&CheapSignals::default(), &catalog());
        assert_eq!(rec.tier, TierId(0));
        assert_eq!(rec.complexity, InputComplexity::Unknown);
        assert!(rec.confidence <= 0.5);
    }

    #[test]
    fn test_short_clean_input_is_simple() {
        let selector = InitialTierSelector::default();
        let signals = CheapSignals {
            duration_secs: Some(120.0),
            file_size_bytes: Some(120 * 16_000), // 128 kbps
            speaker_count: Some(1),
            complexity_hint: Some(0.1),
        };
        let rec = selector.select_initial_tier(&signals, &catalog());
        assert_eq!(rec.complexity, InputComplexity::Simple);
        assert_eq!(rec.tier, TierId(0));
    }

    #[test]
    fn test_single_adverse_signal_is_medium() {
        let selector = InitialTierSelector::default();
        let signals = CheapSignals {
            duration_secs: Some(3600.0),
            ..Default::default()
        };
        let rec = selector.select_initial_tier(&signals, &catalog());
        assert_eq!(rec.complexity, InputComplexity::Medium);
        assert_eq!(rec.tier, TierId(0));
        assert!(rec.reason.contains("long_duration"));
    }

    #[test]
    fn test_two_adverse_signals_skip_cheapest() {
        let selector = InitialTierSelector::default();
        let signals = CheapSignals {
            duration_secs: Some(3600.0),
            file_size_bytes: Some(3600 * 4_000), // 32 kbps
            speaker_count: None,
            complexity_hint: None,
        };
        assert!((signals.bitrate_kbps().unwrap() - 32.0).abs() < 1e-9);
        let rec = selector.select_initial_tier(&signals, &catalog());
        assert_eq!(rec.complexity, InputComplexity::Complex);
        assert_eq!(rec.tier, TierId(1));
    }

    #[test]
    fn test_complexity_hint_alone_is_complex() {
        let selector = InitialTierSelector::default();
        let signals = CheapSignals {
            complexity_hint: Some(0.9),
            ..Default::default()
        };
        assert_eq!(selector.classify(&signals), InputComplexity::Complex);
    }

    #[test]
    fn test_single_tier_catalog_stays_valid() {
        let selector = InitialTierSelector::default();
        let single = TierCatalog::from_specs(&[TierSpec::new("only", 0.7, 1.0)]).unwrap();
        let signals = CheapSignals {
            complexity_hint: Some(1.0),
            speaker_count: Some(9),
            ..Default::default()
        };
        let rec = selector.select_initial_tier(&signals, &single);
        assert_eq!(rec.tier, TierId(0));
    }

    #[test]
    fn test_disabled_selector_starts_cheapest() {
        let selector = InitialTierSelector::new(InitialTierConfig {
            enabled: false,
            ..Default::default()
        });
        let signals = CheapSignals {
            complexity_hint: Some(1.0),
            ..Default::default()
        };
        let rec = selector.select_initial_tier(&signals, &catalog());
        assert_eq!(rec.tier, TierId(0));
    }

    #[test]
    fn test_zero_duration_has_no_bitrate() {
        let signals = CheapSignals {
            duration_secs: Some(0.0),
            file_size_bytes: Some(1_000),
            ..Default::default()
        };
        assert!(signals.bitrate_kbps().is_none());
    }
}

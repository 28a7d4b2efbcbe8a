//! Tier Catalog — Ordered cost tiers with per-tier thresholds
//!
//! The catalog is built once from configuration and never mutated. Tier ids
//! are positions in the catalog, so ordering by id is ordering by expected
//! cost and quality.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Position of a tier in its catalog (0 = cheapest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierId(pub usize);

impl TierId {
    /// The cheapest tier of any catalog.
    pub const CHEAPEST: TierId = TierId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for TierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tier definition as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSpec {
    /// Human-readable tier name (e.g. "fast", "large-v3")
    pub name: String,
    /// Minimum overall score that avoids escalation at this tier
    pub threshold: f64,
    /// Relative processing cost (any unit, only ratios matter)
    pub baseline_cost: f64,
}

impl TierSpec {
    pub fn new(name: impl Into<String>, threshold: f64, baseline_cost: f64) -> Self {
        Self {
            name: name.into(),
            threshold,
            baseline_cost,
        }
    }
}

/// One discrete cost/quality level of a pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub id: TierId,
    pub name: String,
    pub escalation_threshold: f64,
    pub baseline_cost: f64,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Ordered, read-only list of tiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCatalog {
    tiers: Vec<Tier>,
}

impl TierCatalog {
    /// Build a catalog from tier specs, cheapest first.
    ///
    /// Rejects empty catalogs, duplicate names, thresholds outside `[0, 1]`,
    /// decreasing thresholds, and non-positive or decreasing costs.
    pub fn from_specs(specs: &[TierSpec]) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }

        let mut tiers: Vec<Tier> = Vec::with_capacity(specs.len());
        for (idx, spec) in specs.iter().enumerate() {
            let name = spec.name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidTier {
                    tier: format!("#{}", idx),
                    message: "tier name must not be empty".to_string(),
                });
            }
            if tiers.iter().any(|t| t.name == name) {
                return Err(ConfigError::DuplicateTier(name.to_string()));
            }
            if !spec.threshold.is_finite() || !(0.0..=1.0).contains(&spec.threshold) {
                return Err(ConfigError::InvalidTier {
                    tier: name.to_string(),
                    message: format!("threshold must be in [0, 1], got {}", spec.threshold),
                });
            }
            if !spec.baseline_cost.is_finite() || spec.baseline_cost <= 0.0 {
                return Err(ConfigError::InvalidTier {
                    tier: name.to_string(),
                    message: format!("baseline_cost must be > 0, got {}", spec.baseline_cost),
                });
            }
            if let Some(prev) = tiers.last() {
                if spec.threshold < prev.escalation_threshold {
                    return Err(ConfigError::NonMonotonic {
                        field: "threshold",
                        prev: prev.name.clone(),
                        next: name.to_string(),
                    });
                }
                if spec.baseline_cost < prev.baseline_cost {
                    return Err(ConfigError::NonMonotonic {
                        field: "baseline_cost",
                        prev: prev.name.clone(),
                        next: name.to_string(),
                    });
                }
            }
            tiers.push(Tier {
                id: TierId(idx),
                name: name.to_string(),
                escalation_threshold: spec.threshold,
                baseline_cost: spec.baseline_cost,
            });
        }

        Ok(Self { tiers })
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Always false for a constructed catalog; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn get(&self, id: TierId) -> Option<&Tier> {
        self.tiers.get(id.0)
    }

    pub fn by_name(&self, name: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.name == name)
    }

    pub fn cheapest(&self) -> &Tier {
        &self.tiers[0]
    }

    pub fn highest(&self) -> &Tier {
        &self.tiers[self.tiers.len() - 1]
    }

    pub fn is_highest(&self, id: TierId) -> bool {
        id.0 + 1 >= self.tiers.len()
    }

    /// The next costlier tier, or `None` at the top of the ladder.
    pub fn next(&self, id: TierId) -> Option<&Tier> {
        self.tiers.get(id.0 + 1)
    }

    /// Clamp an arbitrary id into the catalog.
    pub fn clamp(&self, id: TierId) -> TierId {
        TierId(id.0.min(self.tiers.len() - 1))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.iter()
    }

    /// Summary line for logging.
    pub fn summary(&self) -> String {
        self.tiers
            .iter()
            .map(|t| format!("{}({:.2})", t.name, t.escalation_threshold))
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> Vec<TierSpec> {
        vec![
            TierSpec::new("fast", 0.70, 1.0),
            TierSpec::new("balanced", 0.75, 2.0),
            TierSpec::new("high", 0.80, 3.5),
            TierSpec::new("premium", 0.90, 6.0),
        ]
    }

    #[test]
    fn test_catalog_assigns_ordered_ids() {
        let catalog = TierCatalog::from_specs(&ladder()).unwrap();
        assert_eq!(catalog.len(), 4);
        let ids: Vec<TierId> = catalog.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TierId(0), TierId(1), TierId(2), TierId(3)]);
        assert_eq!(catalog.cheapest().name, "fast");
        assert_eq!(catalog.highest().name, "premium");
    }

    #[test]
    fn test_next_stops_at_top() {
        let catalog = TierCatalog::from_specs(&ladder()).unwrap();
        assert_eq!(catalog.next(TierId(0)).unwrap().name, "balanced");
        assert!(catalog.next(TierId(3)).is_none());
        assert!(catalog.is_highest(TierId(3)));
        assert!(!catalog.is_highest(TierId(2)));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(matches!(
            TierCatalog::from_specs(&[]),
            Err(ConfigError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_decreasing_threshold_rejected() {
        let specs = vec![
            TierSpec::new("fast", 0.80, 1.0),
            TierSpec::new("balanced", 0.75, 2.0),
        ];
        let err = TierCatalog::from_specs(&specs).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NonMonotonic {
                field: "threshold",
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_and_out_of_range_rejected() {
        let dup = vec![TierSpec::new("fast", 0.7, 1.0), TierSpec::new("fast", 0.8, 2.0)];
        assert!(matches!(
            TierCatalog::from_specs(&dup),
            Err(ConfigError::DuplicateTier(_))
        ));

        let bad = vec![TierSpec::new("fast", 1.2, 1.0)];
        assert!(matches!(
            TierCatalog::from_specs(&bad),
            Err(ConfigError::InvalidTier { .. })
        ));

        let free = vec![TierSpec::new("fast", 0.7, 0.0)];
        assert!(TierCatalog::from_specs(&free).is_err());
    }

    #[test]
    fn test_clamp_and_lookup() {
        let catalog = TierCatalog::from_specs(&ladder()).unwrap();
        assert_eq!(catalog.clamp(TierId(9)), TierId(3));
        assert_eq!(catalog.by_name("high").unwrap().id, TierId(2));
        assert!(catalog.by_name("ultra").is_none());
        assert_eq!(
            catalog.summary(),
            "fast(0.70) → balanced(0.75) → high(0.80) → premium(0.90)"
        );
    }
}

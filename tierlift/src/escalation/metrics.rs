//! Quality Metrics — Normalized scoring of a stage's timed output
//!
//! Turns a collection of timed points (segments or words, each with an
//! optional confidence) into four dimension scores and one weighted
//! aggregate:
//!
//! ```text
//! avg_confidence  ── mean of available confidences
//! consistency     ── 1 - variance(confidences), floored at 0
//! coverage        ── covered duration / total duration
//! penalty         ── share of points below the low-confidence cutoff
//!
//! overall = clamp01(avg·w_c + consistency·w_s + coverage·w_v - penalty·w_p)
//! ```
//!
//! Extraction never fails. Empty or zero-duration input produces neutral
//! values (mostly 0.0) so the controller escalates instead of crashing.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default cutoff below which a point counts as low-confidence.
pub const DEFAULT_LOW_CONFIDENCE_CUTOFF: f64 = 0.7;

/// Weights combining the four dimensions into `overall_score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricWeights {
    pub confidence: f64,
    pub consistency: f64,
    pub coverage: f64,
    /// Subtracted, not added
    pub penalty: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            confidence: 0.4,
            consistency: 0.3,
            coverage: 0.2,
            penalty: 0.1,
        }
    }
}

impl MetricWeights {
    /// Reject weights that cannot produce a meaningful score.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            ("confidence", self.confidence),
            ("consistency", self.consistency),
            ("coverage", self.coverage),
            ("penalty", self.penalty),
        ];
        for (name, value) in all {
            if !value.is_finite() {
                return Err(ConfigError::InvalidWeights(format!(
                    "{} weight is not finite",
                    name
                )));
            }
            if value < 0.0 {
                return Err(ConfigError::InvalidWeights(format!(
                    "{} weight must be >= 0, got {}",
                    name, value
                )));
            }
        }
        if self.confidence + self.consistency + self.coverage <= 0.0 {
            return Err(ConfigError::InvalidWeights(
                "confidence, consistency and coverage weights are all zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// One timed unit of stage output (a segment or a word).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedPoint {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Model confidence in [0, 1], when the stage reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl TimedPoint {
    pub fn new(start: f64, end: f64, confidence: Option<f64>) -> Self {
        Self {
            start,
            end,
            confidence,
        }
    }
}

/// Timed output of one stage attempt.
///
/// `payload` carries the raw stage result through the controller untouched
/// (e.g. the transcript JSON) so the caller gets back exactly what the
/// accepted tier produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StageOutput {
    pub points: Vec<TimedPoint>,
    /// Total media duration in seconds
    pub total_duration: f64,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

impl StageOutput {
    pub fn new(points: Vec<TimedPoint>, total_duration: f64) -> Self {
        Self {
            points,
            total_duration,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Fixed-shape quality record for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub avg_confidence: f64,
    pub consistency: f64,
    pub coverage: f64,
    pub low_confidence_penalty: f64,
    pub overall_score: f64,
    /// Number of timed points in the output
    pub point_count: usize,
    /// Number of points that carried a usable confidence
    pub scored_point_count: usize,
}

impl QualityMetrics {
    /// All-zero metrics, the result for empty input.
    pub fn zero() -> Self {
        Self {
            avg_confidence: 0.0,
            consistency: 0.0,
            coverage: 0.0,
            low_confidence_penalty: 0.0,
            overall_score: 0.0,
            point_count: 0,
            scored_point_count: 0,
        }
    }

    /// Build metrics from dimension scores, deriving `overall_score` with
    /// the given weights.
    pub fn from_dimensions(
        avg_confidence: f64,
        consistency: f64,
        coverage: f64,
        low_confidence_penalty: f64,
        weights: &MetricWeights,
    ) -> Self {
        let avg_confidence = clamp01(avg_confidence);
        let consistency = clamp01(consistency);
        let coverage = clamp01(coverage);
        let low_confidence_penalty = clamp01(low_confidence_penalty);
        let overall_score = clamp01(
            avg_confidence * weights.confidence + consistency * weights.consistency
                + coverage * weights.coverage
                - low_confidence_penalty * weights.penalty,
        );
        Self {
            avg_confidence,
            consistency,
            coverage,
            low_confidence_penalty,
            overall_score,
            point_count: 0,
            scored_point_count: 0,
        }
    }

    /// Compact summary for logs and reasons.
    pub fn summary(&self) -> String {
        format!(
            "overall={:.3} conf={:.3} consistency={:.3} coverage={:.3} penalty={:.3}",
            self.overall_score,
            self.avg_confidence,
            self.consistency,
            self.coverage,
            self.low_confidence_penalty
        )
    }
}

/// Anything the controller can score.
///
/// Implemented for [`StageOutput`]; executors with their own output types
/// implement it to plug into the same loop.
pub trait QualitySource {
    fn quality(&self, extractor: &QualityMetricsExtractor) -> QualityMetrics;
}

impl QualitySource for StageOutput {
    fn quality(&self, extractor: &QualityMetricsExtractor) -> QualityMetrics {
        extractor.extract(self)
    }
}

/// Pure scorer over [`StageOutput`].
#[derive(Debug, Clone, PartialEq)]
pub struct QualityMetricsExtractor {
    weights: MetricWeights,
    low_confidence_cutoff: f64,
}

impl Default for QualityMetricsExtractor {
    fn default() -> Self {
        Self::new(MetricWeights::default(), DEFAULT_LOW_CONFIDENCE_CUTOFF)
    }
}

impl QualityMetricsExtractor {
    pub fn new(weights: MetricWeights, low_confidence_cutoff: f64) -> Self {
        Self {
            weights,
            low_confidence_cutoff,
        }
    }

    pub fn weights(&self) -> &MetricWeights {
        &self.weights
    }

    pub fn low_confidence_cutoff(&self) -> f64 {
        self.low_confidence_cutoff
    }

    /// Score one attempt's output.
    pub fn extract(&self, output: &StageOutput) -> QualityMetrics {
        let confidences: Vec<f64> = output
            .points
            .iter()
            .filter_map(|p| p.confidence)
            .filter(|c| c.is_finite())
            .map(clamp01)
            .collect();

        let avg_confidence = mean(&confidences).unwrap_or(0.0);

        let consistency = match confidences.len() {
            0 => 0.0,
            1 => 1.0,
            _ => (1.0 - variance(&confidences, avg_confidence)).max(0.0),
        };

        let coverage = coverage(&output.points, output.total_duration);

        let low_confidence_penalty = if confidences.is_empty() {
            0.0
        } else {
            let low = confidences
                .iter()
                .filter(|c| **c < self.low_confidence_cutoff)
                .count();
            low as f64 / confidences.len() as f64
        };

        let mut metrics = QualityMetrics::from_dimensions(
            avg_confidence,
            consistency,
            coverage,
            low_confidence_penalty,
            &self.weights,
        );
        metrics.point_count = output.points.len();
        metrics.scored_point_count = confidences.len();
        metrics
    }
}

pub(crate) fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance around a precomputed mean.
fn variance(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Share of `[0, total]` covered by the union of point intervals.
fn coverage(points: &[TimedPoint], total: f64) -> f64 {
    if !total.is_finite() || total <= 0.0 {
        return 0.0;
    }

    let mut spans: Vec<(f64, f64)> = points
        .iter()
        .filter(|p| p.start.is_finite() && p.end.is_finite())
        .map(|p| (p.start.max(0.0), p.end.min(total)))
        .filter(|(s, e)| e > s)
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut covered = 0.0;
    let mut current: Option<(f64, f64)> = None;
    for (start, end) in spans {
        match current {
            Some((cs, ce)) if start <= ce => current = Some((cs, ce.max(end))),
            Some((cs, ce)) => {
                covered += ce - cs;
                current = Some((start, end));
            }
            None => current = Some((start, end)),
        }
    }
    if let Some((cs, ce)) = current {
        covered += ce - cs;
    }

    clamp01(covered / total)
}

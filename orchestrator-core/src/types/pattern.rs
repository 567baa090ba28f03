//! Pattern: a type-value-confidence triple extracted from episodes or Chronicle analytics.

use serde::{Deserialize, Serialize};

/// The dimension a [`Pattern`] makes a recommendation about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Recommended count of tasks to assign to a sprint.
    TaskCount,
    /// Recommended sprint duration in weeks.
    SprintDuration,
}

/// Which source(s) a combined pattern drew evidence from, and in what proportion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PatternWeightSplit {
    /// Share of weight attributed to the episode-derived pattern.
    pub episode: f64,
    /// Share of weight attributed to the Chronicle-derived pattern.
    pub chronicle: f64,
}

/// Where a combined pattern's evidence originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    /// Evidence came only from episode memory.
    EpisodesOnly,
    /// Evidence came only from Chronicle analytics.
    ChronicleOnly,
    /// Evidence came from both sources.
    Hybrid,
}

/// A recommendation fused from one or two pattern sources (spec §3 "Pattern (combined)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    /// What the pattern recommends about.
    pub pattern_type: PatternType,
    /// The recommended value (task count or duration-in-weeks, as `f64` for fusion math).
    pub value: f64,
    /// Historical success rate backing this recommendation.
    pub success_rate: f64,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Source weight split.
    pub weight: PatternWeightSplit,
    /// Total evidence count across both sources.
    pub evidence_count: usize,
    /// Which source(s) contributed.
    pub source: PatternSource,
}

impl Pattern {
    /// Rounds [`Pattern::value`] to the nearest integer recommendation, the
    /// representation actions and adjustments operate on.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rounded_value(&self) -> i64 {
        self.value.round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounded_value_rounds_half_up() {
        let p = Pattern {
            pattern_type: PatternType::TaskCount,
            value: 6.5,
            success_rate: 0.8,
            confidence: 0.7,
            weight: PatternWeightSplit::default(),
            evidence_count: 3,
            source: PatternSource::Hybrid,
        };
        assert_eq!(p.rounded_value(), 7);
    }
}

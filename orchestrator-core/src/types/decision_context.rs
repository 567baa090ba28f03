//! Decision context: the transient bundle the Memory Bridge produces per invocation.

use serde::{Deserialize, Serialize};

use super::pattern::Pattern;

/// Translated, per-invocation summary of episode memory (spec §4.C6 output).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionContext {
    /// Number of similar episodes found before filtering.
    pub similar_episodes_found: usize,
    /// Number of episodes that survived filtering and were actually used.
    pub episodes_used: usize,
    /// Average similarity across the episodes used.
    pub average_similarity: f64,
    /// Patterns identified from the episode set.
    pub identified_patterns: Vec<Pattern>,
    /// Surfaced recommendations (pattern values with confidence > 0.5).
    pub recommendations: Vec<String>,
    /// Overall confidence in this context.
    pub overall_confidence: f64,
    /// Free-text key insights.
    pub key_insights: Vec<String>,
    /// Free-text risk factors.
    pub risk_factors: Vec<String>,
}

impl DecisionContext {
    /// Whether this context carries any usable episode evidence.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.episodes_used == 0
    }
}

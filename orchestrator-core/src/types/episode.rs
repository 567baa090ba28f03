//! Episode: a frozen record of one orchestration decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::EMBEDDING_DIMENSION;

/// Decision-making mode an episode was produced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    /// Only the deterministic rule-based decision ran.
    RuleBasedOnly,
    /// Hybrid episode + Chronicle intelligence adjusted the base decision.
    IntelligenceEnhanced,
}

/// Recorded outcome of a decision, attached lazily once the related sprint closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    /// Whether the decision is judged to have succeeded.
    pub success: bool,
    /// Quality score in `[0, 1]`.
    pub quality: f64,
    /// When the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// A frozen record of one orchestration decision.
///
/// Immutable once written, except for [`Episode::attach_outcome`], which is the
/// only mutation permitted after `store()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Unique episode id.
    pub id: Uuid,
    /// Project this decision was made for.
    pub project_id: String,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Opaque structured perception snapshot (the [`super::project::ProjectSnapshot`]
    /// serialized to JSON, plus any derived fields).
    pub perception: Value,
    /// Reasoning: rationale text, confidence scores, identified patterns.
    pub reasoning: Value,
    /// Action taken: sprint_created, tasks_assigned count, cronjob_created, etc.
    pub action: Value,
    /// Outcome, attached after the fact.
    pub outcome: Option<EpisodeOutcome>,
    /// Version tag of the agent that produced this episode.
    pub agent_version: String,
    /// Decision mode this episode was produced under.
    pub decision_mode: DecisionMode,
    /// Fixed-dimension embedding vector; empty until [`Episode::set_fingerprint`] runs.
    pub fingerprint: Vec<f32>,
    /// Sprint this decision concerned, if any.
    pub sprint_id: Option<String>,
    /// Chronicle note id this episode corresponds to, if one was recorded.
    pub chronicle_note_id: Option<Uuid>,
}

impl Episode {
    /// Attaches an outcome. Per the immutability invariant this is the only
    /// field mutable after `store()`.
    pub fn attach_outcome(&mut self, success: bool, quality: f64, recorded_at: DateTime<Utc>) {
        self.outcome = Some(EpisodeOutcome { success, quality, recorded_at });
    }

    /// Sets the fingerprint vector, validating it against the configured
    /// embedding dimension.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::EmbeddingDimensionMismatch`] if `vector`
    /// is not exactly [`EMBEDDING_DIMENSION`] wide.
    pub fn set_fingerprint(&mut self, vector: Vec<f32>) -> crate::error::Result<()> {
        if vector.len() != EMBEDDING_DIMENSION {
            return Err(crate::error::Error::EmbeddingDimensionMismatch {
                expected: EMBEDDING_DIMENSION,
                actual: vector.len(),
            });
        }
        self.fingerprint = vector;
        Ok(())
    }

    /// Data-completeness score used as a quality fallback when `outcome.quality`
    /// is absent: 0.25 per non-empty field among perception, reasoning, action,
    /// outcome.
    #[must_use]
    pub fn completeness_score(&self) -> f64 {
        let mut score = 0.0;
        if !self.perception.is_null() {
            score += 0.25;
        }
        if !self.reasoning.is_null() {
            score += 0.25;
        }
        if !self.action.is_null() {
            score += 0.25;
        }
        if self.outcome.is_some() {
            score += 0.25;
        }
        score
    }

    /// Effective quality: the recorded outcome quality if present, otherwise
    /// the completeness score.
    #[must_use]
    pub fn effective_quality(&self) -> f64 {
        self.outcome.as_ref().map_or_else(|| self.completeness_score(), |o| o.quality)
    }
}

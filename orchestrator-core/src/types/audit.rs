//! Audit record: full decision provenance, persisted as a Chronicle sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One proposed adjustment, whether or not it was ultimately applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedAdjustment {
    /// Adjustment kind, e.g. `"task_count"` or `"sprint_duration"`.
    pub kind: String,
    /// Proposed value.
    pub recommended_value: Value,
    /// Confidence backing the proposal.
    pub confidence: f64,
    /// Human-readable rationale.
    pub rationale: String,
    /// Expected improvement, if estimated.
    pub expected_improvement: Option<f64>,
    /// Free-text evidence details (supporting project count, etc).
    pub evidence_details: String,
}

/// Full provenance of one orchestration decision (spec §3 "Audit record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique audit id.
    pub id: Uuid,
    /// Project this decision concerned.
    pub project_id: String,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// The deterministic base decision, serialized.
    pub base_decision: Value,
    /// Every adjustment proposed, whether or not gated through.
    pub proposed_adjustments: Vec<ProposedAdjustment>,
    /// Adjustments that were actually applied, keyed by kind.
    pub applied_adjustments: Value,
    /// The final composed decision, serialized.
    pub final_decision: Value,
    /// Combined human-readable reasoning across all decision points.
    pub combined_reasoning: String,
    /// Correlation id threading this audit to its originating event(s).
    pub correlation_id: Uuid,
    /// Sprint this decision concerned, if any.
    pub sprint_id: Option<String>,
}

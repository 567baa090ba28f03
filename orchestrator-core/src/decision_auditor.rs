//! Decision Auditor (spec §4.C15): persists full decision provenance as a
//! Chronicle `decision_audit` note. A sink — nothing downstream reads back
//! through this module; consumers replay the Chronicle note log instead.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::store::{ChronicleNote, ChronicleStore};
use crate::types::{AuditRecord, EnhancedDecision};

/// Persists [`AuditRecord`]s derived from composed decisions.
pub struct DecisionAuditor {
    chronicle: Arc<dyn ChronicleStore>,
}

impl DecisionAuditor {
    /// Builds an auditor writing through `chronicle`.
    #[must_use]
    pub fn new(chronicle: Arc<dyn ChronicleStore>) -> Self {
        Self { chronicle }
    }

    /// Builds an [`AuditRecord`] from a composed decision, threaded by
    /// `correlation_id` to the originating event(s).
    #[must_use]
    pub fn build_record(decision: &EnhancedDecision, correlation_id: Uuid) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4(),
            project_id: decision.project_id.clone(),
            timestamp: Utc::now(),
            base_decision: serde_json::to_value(&decision.base).unwrap_or(serde_json::Value::Null),
            proposed_adjustments: decision.proposed_adjustments.clone(),
            applied_adjustments: decision.applied_adjustments.clone(),
            final_decision: serde_json::to_value(decision).unwrap_or(serde_json::Value::Null),
            combined_reasoning: decision.reasoning_chain.join("; "),
            correlation_id,
            sprint_id: decision.sprint_id.clone(),
        }
    }

    /// Persists `record` as a Chronicle `decision_audit` note. Best-effort:
    /// failures are logged and swallowed, matching spec §7's "audit/episode
    /// logging failures never fail the orchestration tick".
    pub async fn record(&self, record: &AuditRecord) {
        let note = ChronicleNote {
            event_type: "decision_audit".to_string(),
            project_id: record.project_id.clone(),
            payload: serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
        };
        if let Err(err) = self.chronicle.record_note(note).await {
            warn!(error = %err, project_id = %record.project_id, "failed to persist decision audit, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryChronicleStore;
    use crate::types::{DecisionMode, PerformanceMetrics, ProposedAdjustment, RuleDecision};

    fn decision() -> EnhancedDecision {
        EnhancedDecision {
            project_id: "P1".to_string(),
            sprint_id: Some("P1-S01".to_string()),
            tasks_to_assign: 8,
            sprint_duration_weeks: 2,
            modifications_applied: 1,
            decision_mode: DecisionMode::IntelligenceEnhanced,
            reasoning_chain: vec!["created new sprint".to_string(), "applied task_count adjustment".to_string()],
            confidence_scores: Default::default(),
            patterns_considered: Vec::new(),
            hybrid_evidence_used: true,
            warnings: Vec::new(),
            performance: PerformanceMetrics::default(),
            proposed_adjustments: vec![ProposedAdjustment {
                kind: "task_count".to_string(),
                recommended_value: serde_json::json!(8),
                confidence: 0.8,
                rationale: "similar projects averaged 8 tasks".to_string(),
                expected_improvement: None,
                evidence_details: "similar_project_count=4".to_string(),
            }],
            applied_adjustments: serde_json::json!({ "task_count": 8 }),
            base: RuleDecision { sprint_created: true, ..RuleDecision::default() },
        }
    }

    #[test]
    fn build_record_carries_every_proposal_not_only_applied_ones() {
        let record = DecisionAuditor::build_record(&decision(), Uuid::new_v4());
        assert_eq!(record.proposed_adjustments.len(), 1);
        assert_eq!(record.applied_adjustments["task_count"], 8);
        assert_eq!(record.project_id, "P1");
    }

    #[tokio::test]
    async fn record_persists_a_decision_audit_note() {
        let store = Arc::new(InMemoryChronicleStore::default());
        let auditor = DecisionAuditor::new(store.clone());
        let record = DecisionAuditor::build_record(&decision(), Uuid::new_v4());
        auditor.record(&record).await;

        let notes = store.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].event_type, "decision_audit");
        assert_eq!(notes[0].project_id, "P1");
    }
}

//! Confidence Gate (spec §4.C10): filters proposed adjustments by three
//! independent, all-must-hold tests. A pure function plus a metrics sink —
//! no I/O, no suspension.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::config::ConfidenceGateConfig;
use crate::types::ProposedAdjustment;

/// Counters for every gate check run, broken down by which test rejected it.
#[derive(Debug, Default)]
pub struct GateMetrics {
    checks_total: AtomicU64,
    checks_passed: AtomicU64,
    failed_confidence: AtomicU64,
    failed_evidence: AtomicU64,
    failed_magnitude: AtomicU64,
}

impl GateMetrics {
    /// Total checks run so far.
    pub fn checks_total(&self) -> u64 {
        self.checks_total.load(Ordering::Relaxed)
    }

    /// Checks that passed all three tests.
    pub fn checks_passed(&self) -> u64 {
        self.checks_passed.load(Ordering::Relaxed)
    }
}

/// Outcome of gating one proposal.
#[derive(Debug, Clone)]
pub struct GateDecision {
    /// Whether the proposal passed all three tests.
    pub approved: bool,
    /// Which test(s) rejected the proposal, if any.
    pub failures: Vec<&'static str>,
}

/// Evaluates proposals against the three confidence-gate tests, recording
/// every check (pass or fail) to `metrics`.
pub struct ConfidenceGate {
    config: ConfidenceGateConfig,
    metrics: GateMetrics,
}

fn supporting_project_count(evidence_details: &str) -> Option<usize> {
    evidence_details
        .split(',')
        .find_map(|field| field.trim().strip_prefix("similar_project_count=")?.parse().ok())
}

impl ConfidenceGate {
    /// Builds a gate with the given thresholds.
    #[must_use]
    pub fn new(config: ConfidenceGateConfig) -> Self {
        Self { config, metrics: GateMetrics::default() }
    }

    /// Accumulated metrics for every check run through this gate.
    #[must_use]
    pub fn metrics(&self) -> &GateMetrics {
        &self.metrics
    }

    /// Gates one proposal against `original_value` (the base decision's
    /// current value for this adjustment kind).
    #[must_use]
    pub fn evaluate(&self, adjustment: &ProposedAdjustment, original_value: f64) -> GateDecision {
        self.metrics.checks_total.fetch_add(1, Ordering::Relaxed);
        let mut failures = Vec::new();

        if adjustment.confidence < self.config.confidence_threshold {
            failures.push("confidence_threshold");
            self.metrics.failed_confidence.fetch_add(1, Ordering::Relaxed);
        }

        if adjustment.kind == "task_count" {
            let supporting = supporting_project_count(&adjustment.evidence_details).unwrap_or(0);
            if supporting < self.config.min_similar_projects {
                failures.push("supporting_evidence");
                self.metrics.failed_evidence.fetch_add(1, Ordering::Relaxed);
            }
        }

        let intelligent = adjustment.recommended_value.as_f64().unwrap_or(original_value);
        let passes_magnitude = if original_value == 0.0 {
            intelligent == 0.0
        } else {
            (intelligent - original_value).abs() / original_value.abs().max(1.0) <= self.config.max_adjustment_percent
        };
        if !passes_magnitude {
            failures.push("magnitude_limit");
            self.metrics.failed_magnitude.fetch_add(1, Ordering::Relaxed);
        }

        let approved = failures.is_empty();
        if approved {
            self.metrics.checks_passed.fetch_add(1, Ordering::Relaxed);
        }
        info!(kind = %adjustment.kind, approved, ?failures, "confidence gate check");

        GateDecision { approved, failures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjustment(kind: &str, value: f64, confidence: f64, evidence: &str) -> ProposedAdjustment {
        ProposedAdjustment {
            kind: kind.to_string(),
            recommended_value: serde_json::json!(value),
            confidence,
            rationale: "test".to_string(),
            expected_improvement: None,
            evidence_details: evidence.to_string(),
        }
    }

    #[test]
    fn passes_all_three_tests() {
        let gate = ConfidenceGate::new(ConfidenceGateConfig::default());
        let adj = adjustment("task_count", 6.0, 0.8, "similar_project_count=4");
        let decision = gate.evaluate(&adj, 5.0);
        assert!(decision.approved);
        assert_eq!(gate.metrics().checks_passed(), 1);
    }

    #[test]
    fn rejects_below_confidence_threshold() {
        let gate = ConfidenceGate::new(ConfidenceGateConfig::default());
        let adj = adjustment("sprint_duration", 3.0, 0.5, "");
        let decision = gate.evaluate(&adj, 2.0);
        assert!(!decision.approved);
        assert!(decision.failures.contains(&"confidence_threshold"));
    }

    #[test]
    fn rejects_task_count_with_insufficient_evidence() {
        let gate = ConfidenceGate::new(ConfidenceGateConfig::default());
        let adj = adjustment("task_count", 6.0, 0.9, "similar_project_count=1");
        let decision = gate.evaluate(&adj, 5.0);
        assert!(decision.failures.contains(&"supporting_evidence"));
    }

    #[test]
    fn rejects_adjustment_exceeding_magnitude_limit() {
        let gate = ConfidenceGate::new(ConfidenceGateConfig::default());
        let adj = adjustment("task_count", 20.0, 0.9, "similar_project_count=4");
        let decision = gate.evaluate(&adj, 5.0);
        assert!(decision.failures.contains(&"magnitude_limit"));
    }

    #[test]
    fn zero_original_only_valid_when_intelligent_is_zero() {
        let gate = ConfidenceGate::new(ConfidenceGateConfig::default());
        let zero_to_zero = adjustment("sprint_duration", 0.0, 0.9, "");
        assert!(gate.evaluate(&zero_to_zero, 0.0).approved);

        let zero_to_nonzero = adjustment("sprint_duration", 2.0, 0.9, "");
        assert!(!gate.evaluate(&zero_to_nonzero, 0.0).approved);
    }
}

//! Enhanced Decision: the final composed output of one orchestration tick
//! (spec §4.C12 step 8).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::audit::ProposedAdjustment;
use super::decision::RuleDecision;
use super::episode::DecisionMode;
use super::pattern::Pattern;

/// Wall-clock measurements for one tick against the configured performance
/// budgets (spec §4.C12, §4.C12 "Performance budget").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Total tick duration, in milliseconds.
    pub total_ms: u64,
    /// Chronicle pattern analysis duration, in milliseconds.
    pub pattern_analysis_ms: u64,
    /// Episode retrieval duration, in milliseconds.
    pub episode_retrieval_ms: u64,
    /// Memory bridge translation duration, in milliseconds.
    pub memory_bridge_ms: u64,
    /// Whether `total_ms` exceeded its budget.
    pub total_over_budget: bool,
    /// Whether `pattern_analysis_ms` exceeded its budget.
    pub pattern_analysis_over_budget: bool,
    /// Whether `episode_retrieval_ms` exceeded its budget.
    pub episode_retrieval_over_budget: bool,
    /// Whether `memory_bridge_ms` exceeded its budget.
    pub memory_bridge_over_budget: bool,
}

/// The final, composed decision for one orchestration tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedDecision {
    /// Project this decision concerns.
    pub project_id: String,
    /// The deterministic base decision this was built from.
    pub base: RuleDecision,
    /// Final sprint id in play (new, reused, or closing), if any.
    pub sprint_id: Option<String>,
    /// Final task count to assign, after any approved adjustment.
    pub tasks_to_assign: u32,
    /// Final sprint duration in weeks, after any approved adjustment.
    pub sprint_duration_weeks: u32,
    /// Count of adjustments actually applied.
    pub modifications_applied: u32,
    /// Which decision mode produced this tick.
    pub decision_mode: DecisionMode,
    /// Ordered reasoning chain: base reasoning plus one entry per adjustment decision.
    pub reasoning_chain: Vec<String>,
    /// Confidence per named signal (`"base"`, `"task_count"`, `"sprint_duration"`, ...).
    pub confidence_scores: HashMap<String, f64>,
    /// Combined patterns that fed this decision, for inspection/audit.
    pub patterns_considered: Vec<Pattern>,
    /// Whether hybrid (episode + Chronicle) evidence was available and used.
    pub hybrid_evidence_used: bool,
    /// Non-fatal warnings accumulated across the tick.
    pub warnings: Vec<String>,
    /// Performance measurements against budget.
    pub performance: PerformanceMetrics,
    /// Every adjustment proposed this tick, whether or not it was gated through
    /// (spec §4.C15 audit input).
    pub proposed_adjustments: Vec<ProposedAdjustment>,
    /// Adjustments actually applied, keyed by kind (`"task_count"`, `"sprint_duration"`).
    pub applied_adjustments: serde_json::Value,
}

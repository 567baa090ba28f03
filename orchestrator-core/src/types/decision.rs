//! The rule-based engine's base decision (spec §4.C11 output), before any
//! intelligence-driven adjustment is applied.

use serde::{Deserialize, Serialize};

/// Pure output of the Rule-Based Decision (spec §4.C11): deterministic, no
/// episode/Chronicle influence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDecision {
    /// Warnings surfaced without blocking the decision (e.g. team conflicts).
    pub warnings: Vec<String>,
    /// Whether the active sprint should be closed this tick.
    pub sprint_closure_triggered: bool,
    /// Sprint id to close, if triggered.
    pub sprint_id_to_close: Option<String>,
    /// Whether the existing CronJob should be deleted.
    pub cronjob_deleted: bool,
    /// Whether a CronJob should be (re)created.
    pub cronjob_created: bool,
    /// Whether a new sprint should be created.
    pub sprint_created: bool,
    /// Sprint id, new or reused for a self-heal.
    pub sprint_id: Option<String>,
    /// Sprint name, mirrors `sprint_id` unless renamed.
    pub sprint_name: Option<String>,
    /// Deterministic CronJob name for the sprint in play.
    pub cronjob_name: Option<String>,
    /// Tasks to assign to the (new or existing) sprint.
    pub tasks_to_assign: u32,
    /// Sprint duration in weeks, the baseline duration adjustments modify.
    pub sprint_duration_weeks: u32,
    /// Human-readable reasoning, decision points joined by `"; "`.
    pub reasoning: String,
}

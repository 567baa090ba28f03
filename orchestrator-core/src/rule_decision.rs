//! Rule-Based Decision (spec §4.C11): a pure function of project snapshot +
//! options. No episode/Chronicle influence, no I/O, no suspension — CronJob
//! existence is supplied by the caller, since this function must not await.

use crate::clients::control_plane::cronjob_name;
use crate::config::OrchestrationOptions;
use crate::types::{ProjectSnapshot, RuleDecision, Sprint};

/// Computes the deterministic base decision for one orchestration tick.
/// `cronjob_exists` reflects the control plane's state for the active
/// sprint's CronJob, looked up by the caller before invoking this function.
#[must_use]
pub fn make_decision(snapshot: &ProjectSnapshot, options: &OrchestrationOptions, cronjob_exists: bool) -> RuleDecision {
    let mut decision = RuleDecision::default();
    decision.sprint_duration_weeks = options.sprint_duration_weeks;
    let mut points = Vec::new();

    if snapshot.team_availability.has_conflict() {
        decision.warnings.extend(snapshot.team_availability.conflicts.iter().cloned());
        points.push(format!("team availability conflict: {}", snapshot.team_availability.conflicts.join(", ")));
    }

    if let Some(active_sprint_id) = &snapshot.active_sprint_id {
        let name = cronjob_name(&snapshot.project_id, active_sprint_id);
        decision.cronjob_name = Some(name);

        let pending = snapshot.sprint_task_summary.map_or(0, |s| s.pending_tasks);
        if pending == 0 {
            decision.sprint_closure_triggered = true;
            decision.sprint_id_to_close = Some(active_sprint_id.clone());
            decision.cronjob_deleted = true;
            points.push(format!("sprint {active_sprint_id} has no pending tasks, triggering closure"));
        } else if !cronjob_exists {
            decision.cronjob_created = true;
            decision.sprint_id = Some(active_sprint_id.clone());
            decision.sprint_name = Some(active_sprint_id.clone());
            points.push(format!(
                "corresponding CronJob was missing for sprint {active_sprint_id}. Recreating"
            ));
        } else {
            points.push(format!("sprint {active_sprint_id} in progress, no action needed"));
        }
    } else if options.create_sprint_if_needed && snapshot.unassigned_tasks > 0 {
        let sprint_number = snapshot.active_sprint_count + 1;
        let sprint_id = Sprint::format_id(&snapshot.project_id, sprint_number);
        let tasks_to_assign = snapshot.unassigned_tasks.min(options.max_tasks_per_sprint);

        decision.sprint_created = true;
        decision.sprint_id = Some(sprint_id.clone());
        decision.sprint_name = Some(sprint_id.clone());
        decision.tasks_to_assign = tasks_to_assign;
        points.push(format!("creating sprint {sprint_id} with {tasks_to_assign} tasks"));

        if options.create_cronjob {
            decision.cronjob_created = true;
            decision.cronjob_name = Some(cronjob_name(&snapshot.project_id, &sprint_id));
            points.push("scheduling daily scrum CronJob".to_string());
        }
    } else {
        points.push("no active sprint and no action required".to_string());
    }

    decision.reasoning = points.join("; ");
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SprintTaskSummary, TeamAvailability};

    fn snapshot() -> ProjectSnapshot {
        ProjectSnapshot {
            project_id: "P1".to_string(),
            backlog_task_count: 10,
            unassigned_tasks: 5,
            active_sprint_count: 0,
            team_size: 4,
            team_availability: TeamAvailability { status: "ok".to_string(), conflicts: vec![] },
            active_sprint_id: None,
            sprint_task_summary: None,
        }
    }

    #[test]
    fn creates_sprint_when_none_active_and_backlog_present() {
        let decision = make_decision(&snapshot(), &OrchestrationOptions::default(), false);
        assert!(decision.sprint_created);
        assert_eq!(decision.sprint_id.as_deref(), Some("P1-S01"));
        assert_eq!(decision.tasks_to_assign, 5);
        assert!(decision.cronjob_created);
    }

    #[test]
    fn caps_tasks_to_assign_at_max_per_sprint() {
        let mut snap = snapshot();
        snap.unassigned_tasks = 50;
        let options = OrchestrationOptions { max_tasks_per_sprint: 10, ..OrchestrationOptions::default() };
        let decision = make_decision(&snap, &options, false);
        assert_eq!(decision.tasks_to_assign, 10);
    }

    #[test]
    fn triggers_closure_when_active_sprint_has_no_pending_tasks() {
        let mut snap = snapshot();
        snap.active_sprint_id = Some("P1-S01".to_string());
        snap.sprint_task_summary = Some(SprintTaskSummary { pending_tasks: 0, completed_tasks: 8 });
        let decision = make_decision(&snap, &OrchestrationOptions::default(), true);
        assert!(decision.sprint_closure_triggered);
        assert_eq!(decision.sprint_id_to_close.as_deref(), Some("P1-S01"));
        assert!(decision.cronjob_deleted);
    }

    #[test]
    fn self_heals_missing_cronjob_for_active_sprint() {
        let mut snap = snapshot();
        snap.active_sprint_id = Some("P1-S01".to_string());
        snap.sprint_task_summary = Some(SprintTaskSummary { pending_tasks: 3, completed_tasks: 2 });
        let decision = make_decision(&snap, &OrchestrationOptions::default(), false);
        assert!(decision.cronjob_created);
        assert!(!decision.sprint_closure_triggered);
        assert_eq!(decision.sprint_id.as_deref(), Some("P1-S01"));
    }

    #[test]
    fn no_action_when_active_sprint_healthy() {
        let mut snap = snapshot();
        snap.active_sprint_id = Some("P1-S01".to_string());
        snap.sprint_task_summary = Some(SprintTaskSummary { pending_tasks: 3, completed_tasks: 2 });
        let decision = make_decision(&snap, &OrchestrationOptions::default(), true);
        assert!(!decision.cronjob_created);
        assert!(!decision.sprint_closure_triggered);
    }

    #[test]
    fn conflict_is_recorded_as_warning_but_does_not_block() {
        let mut snap = snapshot();
        snap.team_availability = TeamAvailability { status: "conflict".to_string(), conflicts: vec!["2026-07-04".to_string()] };
        let decision = make_decision(&snap, &OrchestrationOptions::default(), false);
        assert_eq!(decision.warnings, vec!["2026-07-04".to_string()]);
        assert!(decision.sprint_created);
    }
}

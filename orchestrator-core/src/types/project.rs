//! Project snapshot: the perception input to one orchestration tick.

use serde::{Deserialize, Serialize};

/// Team availability as reported by the Project service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAvailability {
    /// `"ok"` or `"conflict"`.
    pub status: String,
    /// Named holidays/PTO dates causing a conflict, empty when status is ok.
    #[serde(default)]
    pub conflicts: Vec<String>,
}

impl TeamAvailability {
    /// Whether this availability record reports a conflict.
    #[must_use]
    pub fn has_conflict(&self) -> bool {
        self.status == "conflict"
    }
}

/// Pending/completed task counts for the active sprint, if any.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SprintTaskSummary {
    /// Tasks still pending completion.
    pub pending_tasks: u32,
    /// Tasks completed.
    pub completed_tasks: u32,
}

/// Snapshot of one project's state at the moment of an orchestration tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Project identifier.
    pub project_id: String,
    /// Total backlog task count.
    pub backlog_task_count: u32,
    /// Tasks not yet assigned to any sprint.
    pub unassigned_tasks: u32,
    /// Number of sprints currently `in_progress`.
    pub active_sprint_count: u32,
    /// Team size.
    pub team_size: u32,
    /// Team availability record.
    pub team_availability: TeamAvailability,
    /// Identifier of the current active sprint, if one exists.
    pub active_sprint_id: Option<String>,
    /// Task summary for the active sprint, if one exists.
    pub sprint_task_summary: Option<SprintTaskSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_status_is_detected() {
        let avail = TeamAvailability {
            status: "conflict".to_string(),
            conflicts: vec!["2026-07-04".to_string()],
        };
        assert!(avail.has_conflict());
    }

    #[test]
    fn ok_status_has_no_conflict() {
        let avail = TeamAvailability { status: "ok".to_string(), conflicts: vec![] };
        assert!(!avail.has_conflict());
    }
}

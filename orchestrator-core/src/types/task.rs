//! Task: an assignable unit of backlog work.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Sitting in the backlog, not assigned to a sprint.
    Unassigned,
    /// Assigned to a sprint but not yet started.
    AssignedToSprint,
    /// Actively being worked.
    InProgress,
    /// Finished; `progress_percentage` is necessarily 100.
    Completed,
}

/// A backlog task. Invariant: `progress_percentage == 100 <=> status == Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: String,
    /// Owning project id.
    pub project_id: String,
    /// Sprint the task is assigned to, if any.
    pub sprint_id: Option<String>,
    /// Human-readable title.
    pub title: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Completion percentage, 0..=100.
    pub progress_percentage: u8,
    /// Employee the task is assigned to, if any.
    pub assigned_employee: Option<String>,
}

impl Task {
    /// Whether this task satisfies the progress/status invariant.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        (self.progress_percentage == 100) == (self.status == TaskStatus::Completed)
    }

    /// Reverts the task to `Unassigned` with no sprint, as happens when its
    /// sprint closes with the task still incomplete.
    pub fn revert_to_backlog(&mut self) {
        self.sprint_id = None;
        self.status = TaskStatus::Unassigned;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus, progress: u8) -> Task {
        Task {
            id: "T1".into(),
            project_id: "P1".into(),
            sprint_id: Some("P1-S01".into()),
            title: "do the thing".into(),
            status,
            progress_percentage: progress,
            assigned_employee: None,
        }
    }

    #[test]
    fn completed_at_100_is_consistent() {
        assert!(task(TaskStatus::Completed, 100).is_consistent());
    }

    #[test]
    fn completed_below_100_is_inconsistent() {
        assert!(!task(TaskStatus::Completed, 90).is_consistent());
    }

    #[test]
    fn in_progress_at_100_is_inconsistent() {
        assert!(!task(TaskStatus::InProgress, 100).is_consistent());
    }

    #[test]
    fn revert_clears_sprint_and_status() {
        let mut t = task(TaskStatus::InProgress, 40);
        t.revert_to_backlog();
        assert_eq!(t.sprint_id, None);
        assert_eq!(t.status, TaskStatus::Unassigned);
    }
}

//! Sprint: a bounded time-window unit of task assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Sprint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    /// The sprint is the single active sprint for its project.
    InProgress,
    /// All tasks reached completion before the sprint window closed.
    Completed,
    /// The sprint was closed by the engine with tasks still pending.
    ClosedWithPendingTasks,
}

/// A sprint: `{project}-S{nn}` identified, at most one `in_progress` per project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    /// Identifier, e.g. `P1-S01`.
    pub id: String,
    /// Owning project id.
    pub project_id: String,
    /// Human-readable name, typically equal to `id`.
    pub name: String,
    /// Sprint start date.
    pub start_date: DateTime<Utc>,
    /// Sprint end date.
    pub end_date: DateTime<Utc>,
    /// Duration in weeks.
    pub duration_weeks: u32,
    /// Current lifecycle status.
    pub status: SprintStatus,
}

impl Sprint {
    /// Builds the zero-padded sprint identifier `{project}-S{nn}` for the given
    /// 1-based sprint number.
    #[must_use]
    pub fn format_id(project_id: &str, sprint_number: u32) -> String {
        format!("{project_id}-S{sprint_number:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprint_id_is_zero_padded() {
        assert_eq!(Sprint::format_id("P1", 1), "P1-S01");
        assert_eq!(Sprint::format_id("P1", 12), "P1-S12");
    }
}

//! SQL schema for the Chronicle store.

/// One row per tracked project; `completed_tasks_per_sprint` is a JSON-encoded
/// `Vec<f64>` since libSQL has no native array column type.
pub const CREATE_PROJECT_ANALYTICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS project_analytics (
    project_id TEXT PRIMARY KEY NOT NULL,
    team_size REAL NOT NULL,
    avg_task_complexity REAL NOT NULL,
    domain_category_code REAL NOT NULL,
    project_duration_weeks REAL NOT NULL,
    completion_rate REAL NOT NULL,
    avg_sprint_duration REAL NOT NULL,
    optimal_task_count REAL NOT NULL,
    completed_tasks_per_sprint TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

pub const UPSERT_PROJECT_ANALYTICS: &str = r#"
INSERT INTO project_analytics (
    project_id, team_size, avg_task_complexity, domain_category_code,
    project_duration_weeks, completion_rate, avg_sprint_duration,
    optimal_task_count, completed_tasks_per_sprint, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, strftime('%s', 'now'))
ON CONFLICT(project_id) DO UPDATE SET
    team_size = excluded.team_size,
    avg_task_complexity = excluded.avg_task_complexity,
    domain_category_code = excluded.domain_category_code,
    project_duration_weeks = excluded.project_duration_weeks,
    completion_rate = excluded.completion_rate,
    avg_sprint_duration = excluded.avg_sprint_duration,
    optimal_task_count = excluded.optimal_task_count,
    completed_tasks_per_sprint = excluded.completed_tasks_per_sprint,
    updated_at = excluded.updated_at
"#;

/// Append-only note log: decision audits, retrospectives, daily scrum
/// reports (spec §4.C13, §4.C15).
pub const CREATE_CHRONICLE_NOTES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chronicle_notes (
    id TEXT PRIMARY KEY NOT NULL,
    event_type TEXT NOT NULL,
    project_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    recorded_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

pub const CREATE_CHRONICLE_NOTES_PROJECT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_chronicle_notes_project
ON chronicle_notes(project_id, recorded_at DESC)
"#;

//! libSQL/Turso-backed [`ChronicleStore`] implementation.
//!
//! This is the orchestrator's second database pool (spec §5): longitudinal
//! project analytics and the append-only Chronicle note log, kept separate
//! from the Episode+Knowledge pool that `orchestrator-storage-redb` owns.

mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Builder, Connection, Database};
use orchestrator_core::error::{Error, Result};
use orchestrator_core::store::{ChronicleNote, ChronicleStore, PoolMetrics, ProjectAnalytics};
use tracing::{debug, info};
use uuid::Uuid;

/// libSQL-backed Chronicle store.
pub struct TursoStore {
    db: Arc<Database>,
}

impl TursoStore {
    /// Opens a Chronicle store at `url`, authenticating with `token` for
    /// remote connections.
    ///
    /// # Security
    /// Only `libsql://`, `file:`, and `:memory:` are accepted; remote
    /// connections must carry a non-empty token.
    pub async fn open(url: &str, token: &str) -> Result<Self> {
        info!(url, "opening Chronicle store");

        if !url.starts_with("libsql://") && !url.starts_with("file:") && url != ":memory:" {
            return Err(Error::Configuration(format!(
                "insecure Chronicle database url: {url}. Only libsql://, file:, or :memory: are allowed"
            )));
        }
        if url.starts_with("libsql://") && token.trim().is_empty() {
            return Err(Error::Configuration("authentication token required for remote Chronicle connections".to_string()));
        }

        let db = if url.starts_with("libsql://") {
            Builder::new_remote(url.to_string(), token.to_string())
                .build()
                .await
                .map_err(|e| Error::Store(format!("failed to connect to Chronicle database: {e}")))?
        } else {
            let path = url.strip_prefix("file:").unwrap_or(url);
            Builder::new_local(path).build().await.map_err(|e| Error::Store(format!("failed to connect to Chronicle database: {e}")))?
        };

        let store = Self { db: Arc::new(db) };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// Opens an in-memory Chronicle store, for tests and local runs of
    /// `orchestrator-cli` without a configured Chronicle endpoint.
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await.map_err(|e| Error::Store(format!("failed to open in-memory database: {e}")))?;
        let store = Self { db: Arc::new(db) };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn connection(&self) -> Result<Connection> {
        self.db.connect().map_err(|e| Error::Store(format!("failed to get Chronicle connection: {e}")))
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection().await?;
        // WAL mode lets the daily batch job (Strategy Evolver) read while the
        // decision engine appends notes, without lock contention.
        self.execute_quiet(&conn, "PRAGMA journal_mode=WAL").await;
        self.execute_quiet(&conn, "PRAGMA busy_timeout=30000").await;

        conn.execute(schema::CREATE_PROJECT_ANALYTICS_TABLE, ())
            .await
            .map_err(|e| Error::Store(format!("failed to create project_analytics table: {e}")))?;
        conn.execute(schema::CREATE_CHRONICLE_NOTES_TABLE, ())
            .await
            .map_err(|e| Error::Store(format!("failed to create chronicle_notes table: {e}")))?;
        conn.execute(schema::CREATE_CHRONICLE_NOTES_PROJECT_INDEX, ())
            .await
            .map_err(|e| Error::Store(format!("failed to create chronicle_notes index: {e}")))?;
        Ok(())
    }

    /// Runs a `PRAGMA` that returns rows without caring about the result;
    /// a missing WAL/busy-timeout pragma degrades performance, not correctness.
    async fn execute_quiet(&self, conn: &Connection, sql: &str) {
        if let Ok(mut rows) = conn.query(sql, ()).await {
            while rows.next().await.is_ok_and(|r| r.is_some()) {}
        }
    }

    /// Upserts analytics rows for tests and demo fixtures, mirroring
    /// `InMemoryChronicleStore::seed_analytics`. Production rows are expected
    /// to be populated by an external analytics ETL, not by this crate's
    /// `ChronicleStore` impl, which is read/append only per spec §4.C7.
    pub async fn seed_analytics(&self, rows: &[ProjectAnalytics]) -> Result<()> {
        let conn = self.connection().await?;
        for row in rows {
            let series = serde_json::to_string(&row.completed_tasks_per_sprint)?;
            conn.execute(
                schema::UPSERT_PROJECT_ANALYTICS,
                libsql::params![
                    row.project_id.clone(),
                    row.team_size,
                    row.avg_task_complexity,
                    row.domain_category_code,
                    row.project_duration_weeks,
                    row.completion_rate,
                    row.avg_sprint_duration,
                    row.optimal_task_count,
                    series,
                ],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to upsert project analytics: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChronicleStore for TursoStore {
    async fn get_analytics(&self, _project_id: &str) -> Result<Vec<ProjectAnalytics>> {
        // The Chronicle Pattern Analyzer (spec §4.C7) computes similarity and
        // filters client-side across every tracked project, so this fetches
        // the whole table rather than filtering server-side by project_id.
        debug!("fetching all tracked project analytics");
        let conn = self.connection().await?;
        let mut rows = conn
            .query(
                "SELECT project_id, team_size, avg_task_complexity, domain_category_code, \
                 project_duration_weeks, completion_rate, avg_sprint_duration, optimal_task_count, \
                 completed_tasks_per_sprint FROM project_analytics",
                (),
            )
            .await
            .map_err(|e| Error::Store(format!("failed to query project analytics: {e}")))?;

        let mut analytics = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Store(format!("failed to fetch analytics row: {e}")))? {
            let project_id: String = row.get(0).map_err(|e| Error::Store(format!("failed to read project_id: {e}")))?;
            let team_size: f64 = row.get(1).map_err(|e| Error::Store(format!("failed to read team_size: {e}")))?;
            let avg_task_complexity: f64 = row.get(2).map_err(|e| Error::Store(format!("failed to read avg_task_complexity: {e}")))?;
            let domain_category_code: f64 = row.get(3).map_err(|e| Error::Store(format!("failed to read domain_category_code: {e}")))?;
            let project_duration_weeks: f64 = row.get(4).map_err(|e| Error::Store(format!("failed to read project_duration_weeks: {e}")))?;
            let completion_rate: f64 = row.get(5).map_err(|e| Error::Store(format!("failed to read completion_rate: {e}")))?;
            let avg_sprint_duration: f64 = row.get(6).map_err(|e| Error::Store(format!("failed to read avg_sprint_duration: {e}")))?;
            let optimal_task_count: f64 = row.get(7).map_err(|e| Error::Store(format!("failed to read optimal_task_count: {e}")))?;
            let series_json: String = row.get(8).map_err(|e| Error::Store(format!("failed to read completed_tasks_per_sprint: {e}")))?;
            let completed_tasks_per_sprint: Vec<f64> =
                serde_json::from_str(&series_json).map_err(|e| Error::Store(format!("failed to parse completed_tasks_per_sprint: {e}")))?;
            analytics.push(ProjectAnalytics {
                project_id,
                team_size,
                avg_task_complexity,
                domain_category_code,
                project_duration_weeks,
                completion_rate,
                avg_sprint_duration,
                optimal_task_count,
                completed_tasks_per_sprint,
            });
        }
        Ok(analytics)
    }

    async fn record_note(&self, note: ChronicleNote) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let conn = self.connection().await?;
        let payload = serde_json::to_string(&note.payload)?;
        conn.execute(
            "INSERT INTO chronicle_notes (id, event_type, project_id, payload) VALUES (?, ?, ?, ?)",
            libsql::params![id.to_string(), note.event_type, note.project_id, payload],
        )
        .await
        .map_err(|e| Error::Store(format!("failed to record Chronicle note: {e}")))?;
        Ok(id)
    }

    async fn pool_metrics(&self) -> PoolMetrics {
        // No connection pool in front of this crate's libsql handle: every
        // call opens a fresh logical connection, matching the teacher's
        // "legacy mode" fallback when pooling is disabled.
        PoolMetrics { size: 1, checked_in: 1, checked_out: 0, overflow: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analytics_row(project_id: &str) -> ProjectAnalytics {
        ProjectAnalytics {
            project_id: project_id.to_string(),
            team_size: 5.0,
            avg_task_complexity: 3.0,
            domain_category_code: 1.0,
            project_duration_weeks: 8.0,
            completion_rate: 0.8,
            avg_sprint_duration: 2.0,
            optimal_task_count: 6.0,
            completed_tasks_per_sprint: vec![4.0, 5.0, 6.0],
        }
    }

    #[tokio::test]
    async fn seeded_analytics_round_trip_regardless_of_project_filter() {
        let store = TursoStore::open_in_memory().await.expect("open store");
        store.seed_analytics(&[analytics_row("P1"), analytics_row("P2")]).await.expect("seed analytics");

        let fetched = store.get_analytics("P1").await.expect("fetch analytics");
        assert_eq!(fetched.len(), 2);
    }

    #[tokio::test]
    async fn recorded_notes_get_distinct_ids() {
        let store = TursoStore::open_in_memory().await.expect("open store");
        let note =
            ChronicleNote { event_type: "decision_audit".to_string(), project_id: "P1".to_string(), payload: serde_json::json!({"ok": true}) };
        let first = store.record_note(note.clone()).await.expect("record note");
        let second = store.record_note(note).await.expect("record note");
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn rejects_insecure_urls() {
        let err = TursoStore::open("http://example.com", "").await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}

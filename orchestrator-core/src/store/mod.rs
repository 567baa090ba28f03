//! Durable storage traits (spec §4.C3, §4.C4, §5): `orchestrator-core` depends
//! only on these traits, never on a concrete database, so the redb and Turso
//! backend crates can each implement the slice they own.

mod in_memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Episode, Strategy, StrategyPerformanceLog};

pub use in_memory::{InMemoryChronicleStore, InMemoryEpisodeStore, InMemoryKnowledgeStore};

/// Connection-pool health, exposed for monitoring (spec §4.C3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PoolMetrics {
    /// Configured pool size.
    pub size: u32,
    /// Connections currently idle in the pool.
    pub checked_in: u32,
    /// Connections currently lent out.
    pub checked_out: u32,
    /// Requests that had to wait beyond `max_connections`.
    pub overflow: u32,
}

/// An episode returned from a similarity query, paired with its cosine similarity.
#[derive(Debug, Clone)]
pub struct SimilarEpisode {
    /// The matched episode.
    pub episode: Episode,
    /// Cosine similarity to the query vector, in `[0, 1]`.
    pub similarity: f64,
}

/// Durable episode row store + vector index (spec §4.C3).
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Writes a new episode row; the embedding column starts empty.
    async fn store(&self, episode: &Episode) -> Result<Uuid>;

    /// Idempotently sets an episode's fingerprint vector.
    async fn update_embedding(&self, id: Uuid, vector: Vec<f32>) -> Result<()>;

    /// Attaches an outcome, setting `outcome_recorded_at = now`; must not
    /// alter any other field.
    async fn update_outcome(&self, id: Uuid, success: bool, quality: f64, now: DateTime<Utc>) -> Result<()>;

    /// Fetches a page of a project's episodes, optionally restricted to a date range.
    async fn get_by_project(
        &self,
        project_id: &str,
        limit: usize,
        offset: usize,
        date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<Episode>>;

    /// Fetches a project's episodes from the last `hours` hours.
    async fn get_recent(&self, project_id: &str, hours: i64, limit: usize) -> Result<Vec<Episode>>;

    /// Cosine-similarity search, ordered by descending similarity. Skips rows
    /// without an embedding; filters by `similarity >= min_similarity`.
    async fn similar(
        &self,
        query_vector: &[f32],
        project_id: Option<&str>,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarEpisode>>;

    /// Counts episodes, optionally restricted to one project.
    async fn count(&self, project_id: Option<&str>) -> Result<usize>;

    /// Distinct project ids with at least one episode, for batch jobs that
    /// must scan every project (spec §4.C16 phase 1).
    async fn list_projects(&self) -> Result<Vec<String>>;

    /// Connection-pool metrics for monitoring.
    async fn pool_metrics(&self) -> PoolMetrics;
}

/// Durable strategy + performance-log store (spec §4.C4).
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Creates a strategy, returning its id.
    async fn create_strategy(
        &self,
        strategy_type: &str,
        content: serde_json::Value,
        description: &str,
        confidence: f64,
        supporting_episodes: Vec<Uuid>,
    ) -> Result<Uuid>;

    /// Active strategies, optionally filtered by type, ordered by confidence
    /// desc then success_rate desc (nulls last).
    async fn get_active(&self, strategy_type: Option<&str>, limit: usize, offset: usize) -> Result<Vec<Strategy>>;

    /// Atomically records an application outcome: increments counters,
    /// recomputes `success_rate`, appends the episode id to the appropriate
    /// set without duplicating it, and sets `last_applied = now`.
    async fn update_performance(
        &self,
        id: Uuid,
        success: bool,
        supporting_episode: Option<Uuid>,
        contradicting_episode: Option<Uuid>,
    ) -> Result<()>;

    /// Deactivates a strategy, recording `reason` for audit purposes.
    async fn deactivate(&self, id: Uuid, reason: &str) -> Result<()>;

    /// Overwrites a strategy's confidence score (spec §4.C16 phase 3's
    /// confidence nudge), independent of `update_performance`'s counters.
    async fn adjust_confidence(&self, id: Uuid, confidence: f64) -> Result<()>;

    /// Strategies of `strategy_type` with confidence `>= min_confidence`,
    /// most confident first. Strategy-specific applicability predicates
    /// (spec §4.C16) are evaluated by the caller, not the store.
    async fn find_applicable(&self, strategy_type: &str, min_confidence: f64, limit: usize) -> Result<Vec<Strategy>>;

    /// Appends a performance-log entry.
    async fn log_performance(&self, entry: StrategyPerformanceLog) -> Result<()>;

    /// Performance-log entries for one strategy logged since `since`, oldest
    /// first (spec §4.C16 phase 3's per-strategy performance analysis).
    async fn get_performance_history(&self, strategy_id: Uuid, since: DateTime<Utc>) -> Result<Vec<StrategyPerformanceLog>>;

    /// Deletes performance-log entries logged before `before`, returning the
    /// number of rows removed (spec §4.C16 phase 4 cleanup).
    async fn prune_performance_log(&self, before: DateTime<Utc>) -> Result<usize>;
}

/// A project's longitudinal analytics record, as tracked by Chronicle (spec §4.C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAnalytics {
    /// Project id.
    pub project_id: String,
    /// Team size.
    pub team_size: f64,
    /// Average task complexity (unitless score).
    pub avg_task_complexity: f64,
    /// Domain category, embedded as a fixed small integer code.
    pub domain_category_code: f64,
    /// Typical project duration, in weeks.
    pub project_duration_weeks: f64,
    /// Historical completion rate in `[0, 1]`.
    pub completion_rate: f64,
    /// Average sprint duration, in weeks.
    pub avg_sprint_duration: f64,
    /// Optimal task count observed for this project.
    pub optimal_task_count: f64,
    /// Completed-tasks-per-sprint series, oldest first.
    pub completed_tasks_per_sprint: Vec<f64>,
}

/// A durable note appended to the Chronicle log (decision audits,
/// retrospectives, daily scrum reports — spec §4.C13, §4.C15).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronicleNote {
    /// Event type tag, e.g. `"decision_audit"`, `"retrospective"`.
    pub event_type: String,
    /// Project this note concerns.
    pub project_id: String,
    /// Opaque structured payload.
    pub payload: serde_json::Value,
}

/// Chronicle store: longitudinal analytics + append-only note log. This is
/// the orchestrator's second database pool (spec §5), distinct from the
/// Episode+Knowledge pool.
#[async_trait]
pub trait ChronicleStore: Send + Sync {
    /// Fetches analytics for all projects tracked by Chronicle; the Chronicle
    /// Pattern Analyzer (spec §4.C7) computes similarity and filters itself.
    async fn get_analytics(&self, project_id: &str) -> Result<Vec<ProjectAnalytics>>;

    /// Appends a note, returning its assigned id.
    async fn record_note(&self, note: ChronicleNote) -> Result<Uuid>;

    /// Connection-pool metrics for monitoring.
    async fn pool_metrics(&self) -> PoolMetrics;
}

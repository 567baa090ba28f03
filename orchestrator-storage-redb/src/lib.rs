//! redb-backed [`EpisodeStore`] and [`KnowledgeStore`] implementation.
//!
//! `orchestrator-core` depends only on the store traits; this crate supplies
//! the embedded, single-process database those traits are backed by in
//! production (spec §5: "Episode+Knowledge+Working in one pool"). The
//! companion `orchestrator-storage-turso` crate backs the separate Chronicle
//! pool.

mod episodes;
mod knowledge;

use std::sync::Arc;
use std::time::Duration;

use orchestrator_core::error::{Error, Result};
use redb::{Database, TableDefinition};
use tracing::info;

/// Episodes keyed by their UUID, postcard-encoded.
const EPISODES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("episodes");
/// Strategies keyed by their UUID, postcard-encoded.
const STRATEGIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("strategies");
/// Performance-log entries keyed by a synthetic `"{strategy_id}#{uuid}"`,
/// postcard-encoded. There's no secondary index, so readers scan the whole
/// table and filter in memory, same tradeoff the episode queries make.
const PERFORMANCE_LOG_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("performance_log");

/// Every `redb` call is synchronous; this bounds how long a call may block an
/// executor thread before the operation is treated as a store failure.
const DB_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs a blocking `redb` closure on the blocking pool, under a timeout.
async fn with_db_timeout<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::time::timeout(DB_CALL_TIMEOUT, tokio::task::spawn_blocking(f))
        .await
        .map_err(|_| Error::Store("redb call timed out".to_string()))?
        .map_err(|e| Error::Store(format!("redb task join error: {e}")))?
}

/// Embedded redb database backing the Episode and Knowledge stores.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Opens (creating if absent) the database file at `path` and ensures
    /// every table exists.
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), "opening redb store");
        let db = tokio::task::spawn_blocking(move || {
            Database::create(&path).map_err(|e| Error::Store(format!("failed to open redb database: {e}")))
        })
        .await
        .map_err(|e| Error::Store(format!("redb task join error: {e}")))??;

        let store = Self { db: Arc::new(db) };
        store.initialize_tables().await?;
        Ok(store)
    }

    /// Opens a temporary, process-local database, for tests and local runs
    /// of `orchestrator-cli` without a configured data directory.
    pub async fn open_temporary() -> Result<Self> {
        let dir = tempfile::tempdir().map_err(|e| Error::Store(format!("failed to create temp dir: {e}")))?;
        let path = dir.keep().join("orchestrator.redb");
        Self::open(path).await
    }

    async fn initialize_tables(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db.begin_write().map_err(|e| Error::Store(format!("failed to begin write transaction: {e}")))?;
            {
                write_txn
                    .open_table(EPISODES_TABLE)
                    .map_err(|e| Error::Store(format!("failed to open episodes table: {e}")))?;
                write_txn
                    .open_table(STRATEGIES_TABLE)
                    .map_err(|e| Error::Store(format!("failed to open strategies table: {e}")))?;
                write_txn
                    .open_table(PERFORMANCE_LOG_TABLE)
                    .map_err(|e| Error::Store(format!("failed to open performance log table: {e}")))?;
            }
            write_txn.commit().map_err(|e| Error::Store(format!("failed to commit table init: {e}")))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::store::EpisodeStore;
    use orchestrator_core::types::{DecisionMode, Episode};
    use serde_json::json;
    use uuid::Uuid;

    fn episode(project: &str) -> Episode {
        Episode {
            id: Uuid::new_v4(),
            project_id: project.to_string(),
            timestamp: chrono::Utc::now(),
            perception: json!({"team_size": 3}),
            reasoning: json!({}),
            action: json!({}),
            outcome: None,
            agent_version: "0.1.0".into(),
            decision_mode: DecisionMode::RuleBasedOnly,
            fingerprint: Vec::new(),
            sprint_id: None,
            chronicle_note_id: None,
        }
    }

    #[tokio::test]
    async fn open_temporary_initializes_every_table() {
        let store = RedbStore::open_temporary().await.expect("open store");
        let ep = episode("P1");
        let id = store.store(&ep).await.expect("store episode");
        assert_eq!(store.count(Some("P1")).await.expect("count"), 1);
        assert_eq!(store.get_by_project("P1", 10, 0, None).await.expect("fetch")[0].id, id);
    }
}

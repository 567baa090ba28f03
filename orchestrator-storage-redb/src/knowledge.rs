//! [`KnowledgeStore`] implementation over the `strategies` and
//! `performance_log` redb tables.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orchestrator_core::error::{Error, Result};
use orchestrator_core::store::KnowledgeStore;
use orchestrator_core::types::{Strategy, StrategyPerformanceLog};
use redb::ReadableTable;
use uuid::Uuid;

use crate::{with_db_timeout, RedbStore, PERFORMANCE_LOG_TABLE, STRATEGIES_TABLE};

fn encode_strategy(strategy: &Strategy) -> Result<Vec<u8>> {
    postcard::to_allocvec(strategy).map_err(|e| Error::Store(format!("failed to encode strategy: {e}")))
}

fn decode_strategy(bytes: &[u8]) -> Result<Strategy> {
    postcard::from_bytes(bytes).map_err(|e| Error::Store(format!("failed to decode strategy: {e}")))
}

fn encode_log(entry: &StrategyPerformanceLog) -> Result<Vec<u8>> {
    postcard::to_allocvec(entry).map_err(|e| Error::Store(format!("failed to encode performance log entry: {e}")))
}

fn decode_log(bytes: &[u8]) -> Result<StrategyPerformanceLog> {
    postcard::from_bytes(bytes).map_err(|e| Error::Store(format!("failed to decode performance log entry: {e}")))
}

fn scan_strategies(db: &Arc<redb::Database>) -> Result<Vec<Strategy>> {
    let read_txn = db.begin_read().map_err(|e| Error::Store(format!("failed to begin read transaction: {e}")))?;
    let table = read_txn.open_table(STRATEGIES_TABLE).map_err(|e| Error::Store(format!("failed to open strategies table: {e}")))?;
    let mut strategies = Vec::new();
    for entry in table.iter().map_err(|e| Error::Store(format!("failed to iterate strategies: {e}")))? {
        let (_, value) = entry.map_err(|e| Error::Store(format!("failed to read strategy entry: {e}")))?;
        strategies.push(decode_strategy(value.value())?);
    }
    Ok(strategies)
}

fn scan_performance_log(db: &Arc<redb::Database>) -> Result<Vec<StrategyPerformanceLog>> {
    let read_txn = db.begin_read().map_err(|e| Error::Store(format!("failed to begin read transaction: {e}")))?;
    let table =
        read_txn.open_table(PERFORMANCE_LOG_TABLE).map_err(|e| Error::Store(format!("failed to open performance log table: {e}")))?;
    let mut entries = Vec::new();
    for entry in table.iter().map_err(|e| Error::Store(format!("failed to iterate performance log: {e}")))? {
        let (_, value) = entry.map_err(|e| Error::Store(format!("failed to read performance log entry: {e}")))?;
        entries.push(decode_log(value.value())?);
    }
    Ok(entries)
}

fn write_strategy(db: &Arc<redb::Database>, strategy: &Strategy) -> Result<()> {
    let key = strategy.id.to_string();
    let bytes = encode_strategy(strategy)?;
    let write_txn = db.begin_write().map_err(|e| Error::Store(format!("failed to begin write transaction: {e}")))?;
    {
        let mut table = write_txn.open_table(STRATEGIES_TABLE).map_err(|e| Error::Store(format!("failed to open strategies table: {e}")))?;
        table.insert(key.as_str(), bytes.as_slice()).map_err(|e| Error::Store(format!("failed to insert strategy: {e}")))?;
    }
    write_txn.commit().map_err(|e| Error::Store(format!("failed to commit strategy write: {e}")))?;
    Ok(())
}

fn load_strategy(db: &Arc<redb::Database>, id: Uuid) -> Result<Strategy> {
    let read_txn = db.begin_read().map_err(|e| Error::Store(format!("failed to begin read transaction: {e}")))?;
    let table = read_txn.open_table(STRATEGIES_TABLE).map_err(|e| Error::Store(format!("failed to open strategies table: {e}")))?;
    let key = id.to_string();
    table
        .get(key.as_str())
        .map_err(|e| Error::Store(format!("failed to read strategy: {e}")))?
        .map(|g| decode_strategy(g.value()))
        .transpose()?
        .ok_or_else(|| Error::NotFound(format!("strategy {id}")))
}

#[async_trait]
impl KnowledgeStore for RedbStore {
    async fn create_strategy(
        &self,
        strategy_type: &str,
        content: serde_json::Value,
        description: &str,
        confidence: f64,
        supporting_episodes: Vec<Uuid>,
    ) -> Result<Uuid> {
        let db = Arc::clone(&self.db);
        let id = Uuid::new_v4();
        let strategy = Strategy {
            id,
            strategy_type: strategy_type.to_string(),
            content,
            description: description.to_string(),
            confidence,
            times_applied: 0,
            success_count: 0,
            failure_count: 0,
            supporting_episodes: supporting_episodes.into_iter().collect(),
            contradicting_episodes: HashSet::new(),
            created_at: Utc::now(),
            last_applied: None,
            is_active: true,
        };
        with_db_timeout(move || {
            write_strategy(&db, &strategy)?;
            Ok(id)
        })
        .await
    }

    async fn get_active(&self, strategy_type: Option<&str>, limit: usize, offset: usize) -> Result<Vec<Strategy>> {
        let db = Arc::clone(&self.db);
        let strategy_type = strategy_type.map(ToString::to_string);
        with_db_timeout(move || {
            let mut matches: Vec<Strategy> = scan_strategies(&db)?
                .into_iter()
                .filter(|s| s.is_active)
                .filter(|s| strategy_type.as_deref().is_none_or(|t| s.strategy_type == t))
                .collect();
            matches.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.success_rate().partial_cmp(&a.success_rate()).unwrap_or(std::cmp::Ordering::Equal))
            });
            Ok(matches.into_iter().skip(offset).take(limit).collect())
        })
        .await
    }

    async fn update_performance(
        &self,
        id: Uuid,
        success: bool,
        supporting_episode: Option<Uuid>,
        contradicting_episode: Option<Uuid>,
    ) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let mut strategy = load_strategy(&db, id)?;
            strategy.record_application(success, supporting_episode, Utc::now());
            if let Some(ep) = contradicting_episode {
                strategy.contradicting_episodes.insert(ep);
            }
            write_strategy(&db, &strategy)
        })
        .await
    }

    async fn deactivate(&self, id: Uuid, reason: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let reason = reason.to_string();
        with_db_timeout(move || {
            let mut strategy = load_strategy(&db, id)?;
            tracing::info!(strategy_id = %id, reason, "deactivating strategy");
            strategy.deactivate();
            write_strategy(&db, &strategy)
        })
        .await
    }

    async fn adjust_confidence(&self, id: Uuid, confidence: f64) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let mut strategy = load_strategy(&db, id)?;
            strategy.confidence = confidence;
            write_strategy(&db, &strategy)
        })
        .await
    }

    async fn find_applicable(&self, strategy_type: &str, min_confidence: f64, limit: usize) -> Result<Vec<Strategy>> {
        let db = Arc::clone(&self.db);
        let strategy_type = strategy_type.to_string();
        with_db_timeout(move || {
            let mut matches: Vec<Strategy> = scan_strategies(&db)?
                .into_iter()
                .filter(|s| s.is_active && s.strategy_type == strategy_type && s.confidence >= min_confidence)
                .collect();
            matches.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
            matches.truncate(limit);
            Ok(matches)
        })
        .await
    }

    async fn log_performance(&self, entry: StrategyPerformanceLog) -> Result<()> {
        let db = Arc::clone(&self.db);
        let key = format!("{}#{}", entry.strategy_id, Uuid::new_v4());
        let bytes = encode_log(&entry)?;
        with_db_timeout(move || {
            let write_txn = db.begin_write().map_err(|e| Error::Store(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(PERFORMANCE_LOG_TABLE)
                    .map_err(|e| Error::Store(format!("failed to open performance log table: {e}")))?;
                table.insert(key.as_str(), bytes.as_slice()).map_err(|e| Error::Store(format!("failed to insert performance log entry: {e}")))?;
            }
            write_txn.commit().map_err(|e| Error::Store(format!("failed to commit performance log write: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn get_performance_history(&self, strategy_id: Uuid, since: DateTime<Utc>) -> Result<Vec<StrategyPerformanceLog>> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let mut matches: Vec<StrategyPerformanceLog> =
                scan_performance_log(&db)?.into_iter().filter(|e| e.strategy_id == strategy_id && e.logged_at >= since).collect();
            matches.sort_by(|a, b| a.logged_at.cmp(&b.logged_at));
            Ok(matches)
        })
        .await
    }

    async fn prune_performance_log(&self, before: DateTime<Utc>) -> Result<usize> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let stale: Vec<String> = {
                let read_txn = db.begin_read().map_err(|e| Error::Store(format!("failed to begin read transaction: {e}")))?;
                let table = read_txn
                    .open_table(PERFORMANCE_LOG_TABLE)
                    .map_err(|e| Error::Store(format!("failed to open performance log table: {e}")))?;
                let mut stale = Vec::new();
                for entry in table.iter().map_err(|e| Error::Store(format!("failed to iterate performance log: {e}")))? {
                    let (key, value) = entry.map_err(|e| Error::Store(format!("failed to read performance log entry: {e}")))?;
                    let logged = decode_log(value.value())?;
                    if logged.logged_at < before {
                        stale.push(key.value().to_string());
                    }
                }
                stale
            };

            let removed = stale.len();
            let write_txn = db.begin_write().map_err(|e| Error::Store(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(PERFORMANCE_LOG_TABLE)
                    .map_err(|e| Error::Store(format!("failed to open performance log table: {e}")))?;
                for key in &stale {
                    table.remove(key.as_str()).map_err(|e| Error::Store(format!("failed to remove performance log entry: {e}")))?;
                }
            }
            write_txn.commit().map_err(|e| Error::Store(format!("failed to commit performance log prune: {e}")))?;
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RedbStore;
    use serde_json::json;

    #[tokio::test]
    async fn create_and_deactivate_strategy_round_trips() {
        let store = RedbStore::open_temporary().await.expect("open store");
        let id = store
            .create_strategy("task_count", json!({"recommend": 6}), "desc", 0.6, vec![])
            .await
            .expect("create strategy");

        let active = store.get_active(Some("task_count"), 10, 0).await.expect("get active");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id);

        store.deactivate(id, "performance below floor").await.expect("deactivate");
        let active = store.get_active(None, 10, 0).await.expect("get active after deactivate");
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn performance_log_prune_removes_only_stale_entries() {
        let store = RedbStore::open_temporary().await.expect("open store");
        let strategy_id = Uuid::new_v4();
        let old = StrategyPerformanceLog {
            strategy_id,
            episode_id: Uuid::new_v4(),
            predicted_outcome: 0.5,
            actual_outcome: Some(0.4),
            context_similarity: 0.9,
            logged_at: Utc::now() - chrono::Duration::days(100),
        };
        let recent = StrategyPerformanceLog { logged_at: Utc::now(), ..old.clone() };
        store.log_performance(old).await.expect("log old entry");
        store.log_performance(recent).await.expect("log recent entry");

        let removed = store.prune_performance_log(Utc::now() - chrono::Duration::days(30)).await.expect("prune");
        assert_eq!(removed, 1);
        let remaining = store.get_performance_history(strategy_id, Utc::now() - chrono::Duration::days(365)).await.expect("history");
        assert_eq!(remaining.len(), 1);
    }
}

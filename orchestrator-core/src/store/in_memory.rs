//! In-process reference implementations of the store traits: used by tests
//! and by the CLI when no durable backend is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::math::cosine_similarity;
use crate::types::{Episode, Strategy, StrategyPerformanceLog};

use super::{ChronicleNote, ChronicleStore, EpisodeStore, KnowledgeStore, PoolMetrics, ProjectAnalytics, SimilarEpisode};

/// In-memory [`EpisodeStore`], backed by a `parking_lot::RwLock<HashMap<..>>`.
#[derive(Default)]
pub struct InMemoryEpisodeStore {
    rows: RwLock<HashMap<Uuid, Episode>>,
}

#[async_trait]
impl EpisodeStore for InMemoryEpisodeStore {
    async fn store(&self, episode: &Episode) -> Result<Uuid> {
        let id = episode.id;
        self.rows.write().insert(id, episode.clone());
        Ok(id)
    }

    async fn update_embedding(&self, id: Uuid, vector: Vec<f32>) -> Result<()> {
        let mut rows = self.rows.write();
        let episode = rows.get_mut(&id).ok_or(Error::EpisodeNotFound(id))?;
        episode.set_fingerprint(vector)
    }

    async fn update_outcome(&self, id: Uuid, success: bool, quality: f64, now: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.write();
        let episode = rows.get_mut(&id).ok_or(Error::EpisodeNotFound(id))?;
        episode.attach_outcome(success, quality, now);
        Ok(())
    }

    async fn get_by_project(
        &self,
        project_id: &str,
        limit: usize,
        offset: usize,
        date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<Episode>> {
        let rows = self.rows.read();
        let mut matches: Vec<Episode> = rows
            .values()
            .filter(|e| e.project_id == project_id)
            .filter(|e| date_range.is_none_or(|(from, to)| e.timestamp >= from && e.timestamp <= to))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_recent(&self, project_id: &str, hours: i64, limit: usize) -> Result<Vec<Episode>> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours);
        let rows = self.rows.read();
        let mut matches: Vec<Episode> =
            rows.values().filter(|e| e.project_id == project_id && e.timestamp >= cutoff).cloned().collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matches.into_iter().take(limit).collect())
    }

    async fn similar(
        &self,
        query_vector: &[f32],
        project_id: Option<&str>,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarEpisode>> {
        let rows = self.rows.read();
        let mut matches: Vec<SimilarEpisode> = rows
            .values()
            .filter(|e| !e.fingerprint.is_empty())
            .filter(|e| project_id.is_none_or(|p| e.project_id == p))
            .filter_map(|e| {
                let similarity = cosine_similarity(query_vector, &e.fingerprint);
                (similarity >= min_similarity).then(|| SimilarEpisode { episode: e.clone(), similarity })
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal).then_with(|| {
                b.episode.timestamp.cmp(&a.episode.timestamp)
            })
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn count(&self, project_id: Option<&str>) -> Result<usize> {
        let rows = self.rows.read();
        Ok(match project_id {
            Some(p) => rows.values().filter(|e| e.project_id == p).count(),
            None => rows.len(),
        })
    }

    async fn pool_metrics(&self) -> PoolMetrics {
        PoolMetrics { size: 1, checked_in: 1, checked_out: 0, overflow: 0 }
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let rows = self.rows.read();
        let mut ids: Vec<String> = rows.values().map(|e| e.project_id.clone()).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

struct StrategyRow {
    strategy: Strategy,
}

/// In-memory [`KnowledgeStore`].
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    strategies: RwLock<HashMap<Uuid, StrategyRow>>,
    performance_log: RwLock<Vec<StrategyPerformanceLog>>,
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn create_strategy(
        &self,
        strategy_type: &str,
        content: serde_json::Value,
        description: &str,
        confidence: f64,
        supporting_episodes: Vec<Uuid>,
    ) -> Result<Uuid> {
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
            contradicting_episodes: std::collections::HashSet::new(),
            created_at: Utc::now(),
            last_applied: None,
            is_active: true,
        };
        self.strategies.write().insert(id, StrategyRow { strategy });
        Ok(id)
    }

    async fn get_active(&self, strategy_type: Option<&str>, limit: usize, offset: usize) -> Result<Vec<Strategy>> {
        let strategies = self.strategies.read();
        let mut matches: Vec<Strategy> = strategies
            .values()
            .map(|row| &row.strategy)
            .filter(|s| s.is_active)
            .filter(|s| strategy_type.is_none_or(|t| s.strategy_type == t))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.success_rate().partial_cmp(&a.success_rate()).unwrap_or(std::cmp::Ordering::Equal))
        });
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn update_performance(
        &self,
        id: Uuid,
        success: bool,
        supporting_episode: Option<Uuid>,
        contradicting_episode: Option<Uuid>,
    ) -> Result<()> {
        let mut strategies = self.strategies.write();
        let row = strategies.get_mut(&id).ok_or_else(|| Error::NotFound(format!("strategy {id}")))?;
        let now = Utc::now();
        row.strategy.record_application(success, supporting_episode, now);
        if let Some(ep) = contradicting_episode {
            row.strategy.contradicting_episodes.insert(ep);
        }
        Ok(())
    }

    async fn deactivate(&self, id: Uuid, reason: &str) -> Result<()> {
        let mut strategies = self.strategies.write();
        let row = strategies.get_mut(&id).ok_or_else(|| Error::NotFound(format!("strategy {id}")))?;
        tracing::info!(strategy_id = %id, reason, "deactivating strategy");
        row.strategy.deactivate();
        Ok(())
    }

    async fn adjust_confidence(&self, id: Uuid, confidence: f64) -> Result<()> {
        let mut strategies = self.strategies.write();
        let row = strategies.get_mut(&id).ok_or_else(|| Error::NotFound(format!("strategy {id}")))?;
        row.strategy.confidence = confidence;
        Ok(())
    }

    async fn find_applicable(&self, strategy_type: &str, min_confidence: f64, limit: usize) -> Result<Vec<Strategy>> {
        let strategies = self.strategies.read();
        let mut matches: Vec<Strategy> = strategies
            .values()
            .map(|row| &row.strategy)
            .filter(|s| s.is_active && s.strategy_type == strategy_type && s.confidence >= min_confidence)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn log_performance(&self, entry: StrategyPerformanceLog) -> Result<()> {
        self.performance_log.write().push(entry);
        Ok(())
    }

    async fn get_performance_history(&self, strategy_id: Uuid, since: DateTime<Utc>) -> Result<Vec<StrategyPerformanceLog>> {
        let mut matches: Vec<StrategyPerformanceLog> = self
            .performance_log
            .read()
            .iter()
            .filter(|entry| entry.strategy_id == strategy_id && entry.logged_at >= since)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.logged_at.cmp(&b.logged_at));
        Ok(matches)
    }

    async fn prune_performance_log(&self, before: DateTime<Utc>) -> Result<usize> {
        let mut log = self.performance_log.write();
        let before_len = log.len();
        log.retain(|entry| entry.logged_at >= before);
        Ok(before_len - log.len())
    }
}

/// In-memory [`ChronicleStore`].
#[derive(Default)]
pub struct InMemoryChronicleStore {
    analytics: RwLock<Vec<ProjectAnalytics>>,
    notes: RwLock<Vec<ChronicleNote>>,
}

impl InMemoryChronicleStore {
    /// Seeds the store with analytics rows, as a test/demo fixture would.
    pub fn seed_analytics(&self, rows: Vec<ProjectAnalytics>) {
        *self.analytics.write() = rows;
    }

    /// Snapshots every note recorded so far, for test/demo inspection.
    #[must_use]
    pub fn notes(&self) -> Vec<ChronicleNote> {
        self.notes.read().clone()
    }
}

#[async_trait]
impl ChronicleStore for InMemoryChronicleStore {
    async fn get_analytics(&self, _project_id: &str) -> Result<Vec<ProjectAnalytics>> {
        Ok(self.analytics.read().clone())
    }

    async fn record_note(&self, note: ChronicleNote) -> Result<Uuid> {
        self.notes.write().push(note);
        Ok(Uuid::new_v4())
    }

    async fn pool_metrics(&self) -> PoolMetrics {
        PoolMetrics { size: 1, checked_in: 1, checked_out: 0, overflow: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn episode(project: &str, fingerprint: Vec<f32>) -> Episode {
        Episode {
            id: Uuid::new_v4(),
            project_id: project.to_string(),
            timestamp: Utc::now(),
            perception: json!({"team_size": 3}),
            reasoning: json!({}),
            action: json!({}),
            outcome: None,
            agent_version: "0.1.0".into(),
            decision_mode: crate::types::DecisionMode::RuleBasedOnly,
            fingerprint,
            sprint_id: None,
            chronicle_note_id: None,
        }
    }

    #[tokio::test]
    async fn similar_skips_episodes_without_embeddings() {
        let store = InMemoryEpisodeStore::default();
        store.store(&episode("P1", vec![])).await.unwrap();
        let with_embedding = episode("P1", vec![1.0; crate::config::EMBEDDING_DIMENSION]);
        store.store(&with_embedding).await.unwrap();

        let results = store.similar(&vec![1.0; crate::config::EMBEDDING_DIMENSION], Some("P1"), 10, 0.5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].episode.id, with_embedding.id);
    }

    #[tokio::test]
    async fn update_outcome_does_not_alter_other_fields() {
        let store = InMemoryEpisodeStore::default();
        let ep = episode("P1", vec![]);
        let id = store.store(&ep).await.unwrap();
        store.update_outcome(id, true, 0.9, Utc::now()).await.unwrap();

        let fetched = store.get_by_project("P1", 10, 0, None).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].perception, ep.perception);
        assert_eq!(fetched[0].outcome.as_ref().unwrap().quality, 0.9);
    }

    #[tokio::test]
    async fn strategy_performance_updates_success_rate() {
        let store = InMemoryKnowledgeStore::default();
        let id = store
            .create_strategy("task_count", json!({"recommend": 6}), "desc", 0.6, vec![])
            .await
            .unwrap();
        store.update_performance(id, true, Some(Uuid::new_v4()), None).await.unwrap();
        store.update_performance(id, false, None, Some(Uuid::new_v4())).await.unwrap();

        let active = store.get_active(Some("task_count"), 10, 0).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!((active[0].success_rate() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn deactivated_strategies_are_excluded_from_active() {
        let store = InMemoryKnowledgeStore::default();
        let id = store
            .create_strategy("task_count", json!({}), "desc", 0.6, vec![])
            .await
            .unwrap();
        store.deactivate(id, "performance below floor").await.unwrap();
        let active = store.get_active(None, 10, 0).await.unwrap();
        assert!(active.is_empty());
    }
}

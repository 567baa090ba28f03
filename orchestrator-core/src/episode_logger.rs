//! Episode Logger (spec §4.C14): converts a composed decision into an
//! [`Episode`] and hands it off for background persistence. Enqueuing never
//! awaits; a bounded in-memory backlog drops the oldest queued entry on
//! overflow rather than applying backpressure to the caller, mirroring the
//! teacher's learning-queue shape.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Notify;
use tracing::warn;
use uuid::Uuid;

use crate::embeddings::EmbeddingProvider;
use crate::store::EpisodeStore;
use crate::types::{EnhancedDecision, Episode, ProjectSnapshot};

/// Builds an [`Episode`] from one orchestration tick's inputs and outputs.
/// The embedding vector is left empty; [`EpisodeLogger`] fills it in
/// asynchronously after the row is persisted.
#[must_use]
pub fn build_episode(snapshot: &ProjectSnapshot, decision: &EnhancedDecision) -> Episode {
    Episode {
        id: Uuid::new_v4(),
        project_id: snapshot.project_id.clone(),
        timestamp: Utc::now(),
        perception: serde_json::to_value(snapshot).unwrap_or(serde_json::Value::Null),
        reasoning: json!({
            "reasoning_chain": decision.reasoning_chain,
            "confidence_scores": decision.confidence_scores,
            "patterns_considered": decision.patterns_considered,
            "hybrid_evidence_used": decision.hybrid_evidence_used,
        }),
        action: json!({
            "sprint_created": decision.base.sprint_created,
            "sprint_closure_triggered": decision.base.sprint_closure_triggered,
            "cronjob_created": decision.base.cronjob_created,
            "cronjob_deleted": decision.base.cronjob_deleted,
            "tasks_to_assign": decision.tasks_to_assign,
            "sprint_duration_weeks": decision.sprint_duration_weeks,
            "modifications_applied": decision.modifications_applied,
        }),
        outcome: None,
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        decision_mode: decision.decision_mode,
        fingerprint: Vec::new(),
        sprint_id: decision.sprint_id.clone(),
        chronicle_note_id: None,
    }
}

struct Backlog {
    entries: Mutex<VecDeque<Episode>>,
    capacity: usize,
}

impl Backlog {
    fn push(&self, episode: Episode) -> Option<Episode> {
        let mut entries = self.entries.lock();
        let dropped = if entries.len() >= self.capacity { entries.pop_front() } else { None };
        entries.push_back(episode);
        dropped
    }

    fn drain(&self) -> Vec<Episode> {
        self.entries.lock().drain(..).collect()
    }
}

/// Background-backed episode writer: `enqueue` returns immediately, a
/// spawned task persists the row and attaches its embedding.
pub struct EpisodeLogger {
    backlog: Arc<Backlog>,
    notify: Arc<Notify>,
}

impl EpisodeLogger {
    /// Spawns the background worker and returns a handle for enqueuing.
    #[must_use]
    pub fn spawn(store: Arc<dyn EpisodeStore>, embeddings: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let backlog = Arc::new(Backlog { entries: Mutex::new(VecDeque::new()), capacity });
        let notify = Arc::new(Notify::new());

        let worker_backlog = Arc::clone(&backlog);
        let worker_notify = Arc::clone(&notify);
        tokio::spawn(async move {
            loop {
                worker_notify.notified().await;
                for episode in worker_backlog.drain() {
                    Self::persist(&store, &embeddings, episode).await;
                }
            }
        });

        Self { backlog, notify }
    }

    /// Enqueues `episode` for background persistence. Never awaits; if the
    /// backlog is full, the oldest queued entry is dropped and logged.
    pub fn enqueue(&self, episode: Episode) {
        if let Some(dropped) = self.backlog.push(episode) {
            warn!(episode_id = %dropped.id, "episode backlog full, dropping oldest queued entry");
        }
        self.notify.notify_one();
    }

    async fn persist(store: &Arc<dyn EpisodeStore>, embeddings: &Arc<dyn EmbeddingProvider>, episode: Episode) {
        let id = episode.id;
        let embedding_text = episode.reasoning.to_string();
        if let Err(err) = store.store(&episode).await {
            warn!(error = %err, episode_id = %id, "failed to persist episode, dropping");
            return;
        }
        match embeddings.embed(&embedding_text).await {
            Ok(vector) => {
                if let Err(err) = store.update_embedding(id, vector).await {
                    warn!(
                        error = %err,
                        episode_id = %id,
                        "failed to attach embedding, episode remains usable by recency queries"
                    );
                }
            }
            Err(err) => {
                warn!(
                    error = %err,
                    episode_id = %id,
                    "embedding unavailable, episode remains usable by recency queries"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::DeterministicEmbeddingProvider;
    use crate::store::InMemoryEpisodeStore;
    use crate::types::{DecisionMode, PerformanceMetrics, RuleDecision, TeamAvailability};
    use std::time::Duration;

    fn snapshot() -> ProjectSnapshot {
        ProjectSnapshot {
            project_id: "P1".to_string(),
            backlog_task_count: 10,
            unassigned_tasks: 6,
            active_sprint_count: 0,
            team_size: 4,
            team_availability: TeamAvailability { status: "ok".to_string(), conflicts: vec![] },
            active_sprint_id: None,
            sprint_task_summary: None,
        }
    }

    fn decision() -> EnhancedDecision {
        EnhancedDecision {
            project_id: "P1".to_string(),
            sprint_id: Some("P1-S01".to_string()),
            tasks_to_assign: 6,
            sprint_duration_weeks: 2,
            modifications_applied: 0,
            decision_mode: DecisionMode::RuleBasedOnly,
            reasoning_chain: vec!["created new sprint".to_string()],
            confidence_scores: Default::default(),
            patterns_considered: Vec::new(),
            hybrid_evidence_used: false,
            warnings: Vec::new(),
            performance: PerformanceMetrics::default(),
            proposed_adjustments: Vec::new(),
            applied_adjustments: serde_json::Value::Object(Default::default()),
            base: RuleDecision::default(),
        }
    }

    #[test]
    fn build_episode_copies_decision_fields() {
        let episode = build_episode(&snapshot(), &decision());
        assert_eq!(episode.project_id, "P1");
        assert_eq!(episode.sprint_id, Some("P1-S01".to_string()));
        assert_eq!(episode.decision_mode, DecisionMode::RuleBasedOnly);
        assert!(episode.fingerprint.is_empty());
    }

    #[tokio::test]
    async fn enqueued_episode_is_persisted_and_embedded_in_the_background() {
        let store = Arc::new(InMemoryEpisodeStore::default());
        let embeddings = Arc::new(DeterministicEmbeddingProvider);
        let logger = EpisodeLogger::spawn(store.clone(), embeddings, 10);

        let episode = build_episode(&snapshot(), &decision());
        let id = episode.id;
        logger.enqueue(episode);

        for _ in 0..50 {
            if store.count(None).await.unwrap() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let stored = store.get_by_project("P1", 10, 0, None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
    }

    #[test]
    fn backlog_drops_oldest_entry_on_overflow() {
        let backlog = Backlog { entries: Mutex::new(VecDeque::new()), capacity: 2 };
        let first = build_episode(&snapshot(), &decision());
        let first_id = first.id;
        assert!(backlog.push(first).is_none());
        assert!(backlog.push(build_episode(&snapshot(), &decision())).is_none());
        let dropped = backlog.push(build_episode(&snapshot(), &decision()));
        assert_eq!(dropped.map(|e| e.id), Some(first_id));
    }
}

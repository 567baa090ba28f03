//! Episode Retriever (spec §4.C5): wraps the [`EpisodeStore`] with caching,
//! timeout isolation, and a quality filter.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::warn;

use crate::config::RetrieverConfig;
use crate::store::EpisodeStore;
use crate::types::Episode;

/// One retrieved episode paired with its similarity to the query.
#[derive(Debug, Clone)]
pub struct RetrievedEpisode {
    /// The matched episode.
    pub episode: Episode,
    /// Cosine similarity to the query vector.
    pub similarity: f64,
}

/// Parameters identifying one retrieval query, hashed into the cache key.
#[derive(Debug, Clone, Hash)]
struct QueryKey {
    context_hash: u64,
    project_id: Option<String>,
    limit: usize,
    min_quality_bits: Option<u64>,
    min_similarity_bits: u64,
}

impl QueryKey {
    fn new(context: &str, project_id: Option<&str>, limit: usize, min_quality: Option<f64>, min_similarity: f64) -> Self {
        let mut hasher = DefaultHasher::new();
        context.hash(&mut hasher);
        Self {
            context_hash: hasher.finish(),
            project_id: project_id.map(str::to_string),
            limit,
            min_quality_bits: min_quality.map(f64::to_bits),
            min_similarity_bits: min_similarity.to_bits(),
        }
    }

    fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

struct CachedResult {
    results: Arc<[RetrievedEpisode]>,
    cached_at: Instant,
}

/// Wraps an [`EpisodeStore`] with an LRU query cache, soft retrieval timeout,
/// and quality filtering.
pub struct EpisodeRetriever {
    store: Arc<dyn EpisodeStore>,
    config: RetrieverConfig,
    cache: Mutex<LruCache<u64, CachedResult>>,
}

impl EpisodeRetriever {
    /// Builds a retriever wrapping `store`.
    #[must_use]
    pub fn new(store: Arc<dyn EpisodeStore>, config: RetrieverConfig) -> Self {
        let capacity = std::num::NonZeroUsize::new(config.cache_capacity.max(1)).unwrap();
        Self { store, config, cache: Mutex::new(LruCache::new(capacity)) }
    }

    /// Retrieves episodes similar to `context`'s embedding, applying the
    /// cache, soft timeout, and quality filter. A timeout returns an empty
    /// list rather than an error — callers degrade gracefully. Results are
    /// ordered by descending similarity, ties broken by timestamp desc.
    pub async fn retrieve(
        &self,
        query_vector: &[f32],
        context: &str,
        project_id: Option<&str>,
        limit: usize,
        min_quality: Option<f64>,
        min_similarity: f64,
    ) -> Vec<RetrievedEpisode> {
        let key = QueryKey::new(context, project_id, limit, min_quality, min_similarity);
        let hash = key.content_hash();

        if let Some(cached) = self.cache_lookup(hash) {
            return cached;
        }

        let store = Arc::clone(&self.store);
        let query_vector = query_vector.to_vec();
        let project_owned = project_id.map(str::to_string);
        let fetch = async move {
            store.similar(&query_vector, project_owned.as_deref(), limit, min_similarity).await
        };

        let results = match tokio::time::timeout(self.config.timeout(), fetch).await {
            Ok(Ok(results)) => results
                .into_iter()
                .map(|s| RetrievedEpisode { episode: s.episode, similarity: s.similarity })
                .collect::<Vec<_>>(),
            Ok(Err(err)) => {
                warn!(error = %err, "episode retrieval failed, degrading to empty context");
                Vec::new()
            }
            Err(_) => {
                warn!(timeout_ms = self.config.timeout_ms, "episode retrieval timed out, degrading to empty context");
                Vec::new()
            }
        };

        let filtered: Vec<RetrievedEpisode> = results
            .into_iter()
            .filter(|r| min_quality.is_none_or(|min| r.episode.effective_quality() >= min))
            .collect();

        self.cache_store(hash, &filtered);
        filtered
    }

    fn cache_lookup(&self, hash: u64) -> Option<Vec<RetrievedEpisode>> {
        let mut cache = self.cache.lock();
        match cache.get(&hash) {
            Some(entry) if entry.cached_at.elapsed() < self.config.cache_ttl() => Some(entry.results.to_vec()),
            Some(_) => {
                cache.pop(&hash);
                None
            }
            None => None,
        }
    }

    fn cache_store(&self, hash: u64, results: &[RetrievedEpisode]) {
        let entry = CachedResult { results: Arc::from(results), cached_at: Instant::now() };
        self.cache.lock().put(hash, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryEpisodeStore;
    use crate::types::DecisionMode;
    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    fn episode(project: &str, fingerprint: Vec<f32>) -> Episode {
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
            fingerprint,
            sprint_id: None,
            chronicle_note_id: None,
        }
    }

    #[tokio::test]
    async fn cache_hit_returns_bytewise_equal_episodes() {
        let store = Arc::new(InMemoryEpisodeStore::default());
        let dim = crate::config::EMBEDDING_DIMENSION;
        let ep = episode("P1", vec![1.0; dim]);
        store.store(&ep).await.unwrap();

        let retriever = EpisodeRetriever::new(store, RetrieverConfig::default());
        let query = vec![1.0; dim];
        let first = retriever.retrieve(&query, "ctx", Some("P1"), 10, None, 0.5).await;
        let second = retriever.retrieve(&query, "ctx", Some("P1"), 10, None, 0.5).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].episode.id, second[0].episode.id);
        assert_eq!(first[0].episode.perception, second[0].episode.perception);
    }

    struct HangingStore;

    #[async_trait]
    impl EpisodeStore for HangingStore {
        async fn store(&self, _: &Episode) -> crate::error::Result<Uuid> {
            unimplemented!()
        }
        async fn update_embedding(&self, _: Uuid, _: Vec<f32>) -> crate::error::Result<()> {
            unimplemented!()
        }
        async fn update_outcome(&self, _: Uuid, _: bool, _: f64, _: chrono::DateTime<chrono::Utc>) -> crate::error::Result<()> {
            unimplemented!()
        }
        async fn get_by_project(
            &self,
            _: &str,
            _: usize,
            _: usize,
            _: Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)>,
        ) -> crate::error::Result<Vec<Episode>> {
            unimplemented!()
        }
        async fn get_recent(&self, _: &str, _: i64, _: usize) -> crate::error::Result<Vec<Episode>> {
            unimplemented!()
        }
        async fn similar(
            &self,
            _: &[f32],
            _: Option<&str>,
            _: usize,
            _: f64,
        ) -> crate::error::Result<Vec<crate::store::SimilarEpisode>> {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
        async fn count(&self, _: Option<&str>) -> crate::error::Result<usize> {
            unimplemented!()
        }
        async fn pool_metrics(&self) -> crate::store::PoolMetrics {
            crate::store::PoolMetrics::default()
        }
    }

    #[tokio::test]
    async fn timeout_degrades_to_empty_list_not_error() {
        let retriever = EpisodeRetriever::new(
            Arc::new(HangingStore),
            RetrieverConfig { cache_capacity: 10, cache_ttl_secs: 300, timeout_ms: 20 },
        );
        let result = retriever.retrieve(&[0.0; 4], "ctx", None, 10, None, 0.5).await;
        assert!(result.is_empty());
    }
}

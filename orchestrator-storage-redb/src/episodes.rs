//! [`EpisodeStore`] implementation over the `episodes` redb table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orchestrator_core::error::{Error, Result};
use orchestrator_core::store::{EpisodeStore, PoolMetrics, SimilarEpisode};
use orchestrator_core::types::Episode;
use redb::ReadableTable;
use uuid::Uuid;

use crate::{with_db_timeout, RedbStore, EPISODES_TABLE};

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`.
/// Returns `0.0` if either vector is empty or the lengths mismatch. Kept
/// local rather than imported: `orchestrator-core`'s `math` module is
/// private to that crate, by design, since only this crate needs the same
/// computation against rows it alone reads off disk.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn encode(episode: &Episode) -> Result<Vec<u8>> {
    postcard::to_allocvec(episode).map_err(|e| Error::Store(format!("failed to encode episode: {e}")))
}

fn decode(bytes: &[u8]) -> Result<Episode> {
    postcard::from_bytes(bytes).map_err(|e| Error::Store(format!("failed to decode episode: {e}")))
}

fn scan_all(db: &Arc<redb::Database>) -> Result<Vec<Episode>> {
    let read_txn = db.begin_read().map_err(|e| Error::Store(format!("failed to begin read transaction: {e}")))?;
    let table = read_txn.open_table(EPISODES_TABLE).map_err(|e| Error::Store(format!("failed to open episodes table: {e}")))?;
    let mut episodes = Vec::new();
    for entry in table.iter().map_err(|e| Error::Store(format!("failed to iterate episodes: {e}")))? {
        let (_, value) = entry.map_err(|e| Error::Store(format!("failed to read episode entry: {e}")))?;
        episodes.push(decode(value.value())?);
    }
    Ok(episodes)
}

#[async_trait]
impl EpisodeStore for RedbStore {
    async fn store(&self, episode: &Episode) -> Result<Uuid> {
        let db = Arc::clone(&self.db);
        let id = episode.id;
        let key = id.to_string();
        let bytes = encode(episode)?;
        with_db_timeout(move || {
            let write_txn = db.begin_write().map_err(|e| Error::Store(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn.open_table(EPISODES_TABLE).map_err(|e| Error::Store(format!("failed to open episodes table: {e}")))?;
                table.insert(key.as_str(), bytes.as_slice()).map_err(|e| Error::Store(format!("failed to insert episode: {e}")))?;
            }
            write_txn.commit().map_err(|e| Error::Store(format!("failed to commit episode write: {e}")))?;
            Ok(id)
        })
        .await
    }

    async fn update_embedding(&self, id: Uuid, vector: Vec<f32>) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db.begin_write().map_err(|e| Error::Store(format!("failed to begin write transaction: {e}")))?;
            let key = id.to_string();
            let bytes = {
                let table = write_txn.open_table(EPISODES_TABLE).map_err(|e| Error::Store(format!("failed to open episodes table: {e}")))?;
                let existing = table.get(key.as_str()).map_err(|e| Error::Store(format!("failed to read episode: {e}")))?;
                let mut episode = existing.map(|g| decode(g.value())).transpose()?.ok_or(Error::EpisodeNotFound(id))?;
                episode.set_fingerprint(vector)?;
                encode(&episode)?
            };
            {
                let mut table = write_txn.open_table(EPISODES_TABLE).map_err(|e| Error::Store(format!("failed to open episodes table: {e}")))?;
                table.insert(key.as_str(), bytes.as_slice()).map_err(|e| Error::Store(format!("failed to insert episode: {e}")))?;
            }
            write_txn.commit().map_err(|e| Error::Store(format!("failed to commit embedding update: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn update_outcome(&self, id: Uuid, success: bool, quality: f64, now: DateTime<Utc>) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db.begin_write().map_err(|e| Error::Store(format!("failed to begin write transaction: {e}")))?;
            let key = id.to_string();
            let bytes = {
                let table = write_txn.open_table(EPISODES_TABLE).map_err(|e| Error::Store(format!("failed to open episodes table: {e}")))?;
                let existing = table.get(key.as_str()).map_err(|e| Error::Store(format!("failed to read episode: {e}")))?;
                let mut episode = existing.map(|g| decode(g.value())).transpose()?.ok_or(Error::EpisodeNotFound(id))?;
                episode.attach_outcome(success, quality, now);
                encode(&episode)?
            };
            {
                let mut table = write_txn.open_table(EPISODES_TABLE).map_err(|e| Error::Store(format!("failed to open episodes table: {e}")))?;
                table.insert(key.as_str(), bytes.as_slice()).map_err(|e| Error::Store(format!("failed to insert episode: {e}")))?;
            }
            write_txn.commit().map_err(|e| Error::Store(format!("failed to commit outcome update: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn get_by_project(
        &self,
        project_id: &str,
        limit: usize,
        offset: usize,
        date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<Episode>> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_string();
        with_db_timeout(move || {
            let mut matches: Vec<Episode> = scan_all(&db)?
                .into_iter()
                .filter(|e| e.project_id == project_id)
                .filter(|e| date_range.is_none_or(|(from, to)| e.timestamp >= from && e.timestamp <= to))
                .collect();
            matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            Ok(matches.into_iter().skip(offset).take(limit).collect())
        })
        .await
    }

    async fn get_recent(&self, project_id: &str, hours: i64, limit: usize) -> Result<Vec<Episode>> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.to_string();
        let cutoff = Utc::now() - chrono::Duration::hours(hours);
        with_db_timeout(move || {
            let mut matches: Vec<Episode> =
                scan_all(&db)?.into_iter().filter(|e| e.project_id == project_id && e.timestamp >= cutoff).collect();
            matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            matches.truncate(limit);
            Ok(matches)
        })
        .await
    }

    async fn similar(
        &self,
        query_vector: &[f32],
        project_id: Option<&str>,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<SimilarEpisode>> {
        let db = Arc::clone(&self.db);
        let query_vector = query_vector.to_vec();
        let project_id = project_id.map(ToString::to_string);
        with_db_timeout(move || {
            let mut matches: Vec<SimilarEpisode> = scan_all(&db)?
                .into_iter()
                .filter(|e| !e.fingerprint.is_empty())
                .filter(|e| project_id.as_deref().is_none_or(|p| e.project_id == p))
                .filter_map(|episode| {
                    let similarity = cosine_similarity(&query_vector, &episode.fingerprint);
                    (similarity >= min_similarity).then_some(SimilarEpisode { episode, similarity })
                })
                .collect();
            matches.sort_by(|a, b| {
                b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal).then_with(|| b.episode.timestamp.cmp(&a.episode.timestamp))
            });
            matches.truncate(limit);
            Ok(matches)
        })
        .await
    }

    async fn count(&self, project_id: Option<&str>) -> Result<usize> {
        let db = Arc::clone(&self.db);
        let project_id = project_id.map(ToString::to_string);
        with_db_timeout(move || {
            let all = scan_all(&db)?;
            Ok(match &project_id {
                Some(p) => all.iter().filter(|e| &e.project_id == p).count(),
                None => all.len(),
            })
        })
        .await
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let mut ids: Vec<String> = scan_all(&db)?.into_iter().map(|e| e.project_id).collect();
            ids.sort();
            ids.dedup();
            Ok(ids)
        })
        .await
    }

    async fn pool_metrics(&self) -> PoolMetrics {
        // redb is an embedded, single-writer database: there is no connection
        // pool to report on, so this reflects the one always-open handle.
        PoolMetrics { size: 1, checked_in: 1, checked_out: 0, overflow: 0 }
    }
}

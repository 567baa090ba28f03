//! Chronicle Pattern Analyzer (spec §4.C7): turns longitudinal Chronicle
//! analytics into similar-project, velocity-trend, and success-indicator
//! signal. Wraps [`ChronicleStore`] calls in their own circuit breaker, since
//! Chronicle is an independent pool from the Episode+Knowledge store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::CircuitBreakerConfig;
use crate::math::{cosine_similarity, linear_regression_slope, min_max_normalize};
use crate::store::{ChronicleStore, ProjectAnalytics};
use crate::types::{ChronicleAnalysis, SimilarProject, SuccessIndicators, TrendDirection, VelocityTrend};

const TEAM_SIZE_CAP: f64 = 20.0;
const TASK_COMPLEXITY_CAP: f64 = 10.0;
const DOMAIN_CODE_CAP: f64 = 20.0;
const DURATION_WEEKS_CAP: f64 = 52.0;
const TREND_THRESHOLD: f64 = 0.1;
const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

fn feature_vector(row: &ProjectAnalytics) -> [f32; 4] {
    [
        min_max_normalize(row.team_size, 0.0, TEAM_SIZE_CAP) as f32,
        min_max_normalize(row.avg_task_complexity, 0.0, TASK_COMPLEXITY_CAP) as f32,
        min_max_normalize(row.domain_category_code, 0.0, DOMAIN_CODE_CAP) as f32,
        min_max_normalize(row.project_duration_weeks, 0.0, DURATION_WEEKS_CAP) as f32,
    ]
}

struct CacheEntry {
    analysis: Arc<ChronicleAnalysis>,
    cached_at: Instant,
}

/// Computes and caches per-project Chronicle analysis.
pub struct ChronicleAnalyzer {
    store: Arc<dyn ChronicleStore>,
    breaker: CircuitBreaker,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl ChronicleAnalyzer {
    /// Builds an analyzer wrapping `store`, with its own circuit breaker.
    #[must_use]
    pub fn new(store: Arc<dyn ChronicleStore>, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            store,
            breaker: CircuitBreaker::new("chronicle", breaker_config),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached or freshly computed analysis for `project_id`.
    /// Degrades to [`ChronicleAnalysis::empty`] (never an error) if the
    /// store call fails or the breaker is open.
    pub async fn analyze(&self, project_id: &str) -> Arc<ChronicleAnalysis> {
        if let Some(cached) = self.cache_lookup(project_id) {
            return cached;
        }

        let store = Arc::clone(&self.store);
        let owned_id = project_id.to_string();
        let result = self.breaker.call(|| {
            let store = Arc::clone(&store);
            let project_id = owned_id.clone();
            async move { store.get_analytics(&project_id).await }
        }).await;

        let analysis = match result {
            Ok(rows) => Arc::new(Self::compute(project_id, &rows)),
            Err(err) => {
                warn!(error = %err, project_id, "chronicle analysis unavailable, degrading to empty");
                Arc::new(ChronicleAnalysis::empty())
            }
        };

        self.cache.lock().insert(project_id.to_string(), CacheEntry { analysis: Arc::clone(&analysis), cached_at: Instant::now() });
        analysis
    }

    fn cache_lookup(&self, project_id: &str) -> Option<Arc<ChronicleAnalysis>> {
        let cache = self.cache.lock();
        let entry = cache.get(project_id)?;
        (entry.cached_at.elapsed() < CACHE_TTL).then(|| Arc::clone(&entry.analysis))
    }

    fn compute(project_id: &str, rows: &[ProjectAnalytics]) -> ChronicleAnalysis {
        let Some(subject) = rows.iter().find(|r| r.project_id == project_id) else {
            return ChronicleAnalysis::empty();
        };
        let subject_vector = feature_vector(subject);

        let mut similar_projects: Vec<SimilarProject> = rows
            .iter()
            .filter(|r| r.project_id != project_id)
            .map(|r| SimilarProject {
                project_id: r.project_id.clone(),
                similarity_score: cosine_similarity(&subject_vector, &feature_vector(r)),
                team_size: r.team_size,
                completion_rate: r.completion_rate,
                avg_sprint_duration: r.avg_sprint_duration,
                optimal_task_count: r.optimal_task_count,
            })
            .collect();
        similar_projects.sort_by(|a, b| b.similarity_score.partial_cmp(&a.similarity_score).unwrap_or(std::cmp::Ordering::Equal));

        let velocity = Self::velocity_trend(&subject.completed_tasks_per_sprint);
        let success = Self::success_indicators(&similar_projects);

        ChronicleAnalysis { similar_projects, velocity, success }
    }

    fn velocity_trend(series: &[f64]) -> Option<VelocityTrend> {
        if series.is_empty() {
            return None;
        }
        let slope = linear_regression_slope(series);
        let trend_direction = if slope > TREND_THRESHOLD {
            TrendDirection::Increasing
        } else if slope < -TREND_THRESHOLD {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };
        let confidence = (series.len() as f64 / 10.0).min(1.0) * (1.0 - slope.abs()).max(0.0);
        Some(VelocityTrend {
            current: *series.last().expect("checked non-empty above"),
            historical_min: series.iter().copied().fold(f64::INFINITY, f64::min),
            historical_max: series.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            trend_direction,
            confidence,
        })
    }

    fn success_indicators(similar_projects: &[SimilarProject]) -> Option<SuccessIndicators> {
        if similar_projects.is_empty() {
            return None;
        }
        let n = similar_projects.len() as f64;
        let optimal_tasks_per_sprint = similar_projects.iter().map(|p| p.optimal_task_count).sum::<f64>() / n;
        let recommended_duration = similar_projects.iter().map(|p| p.avg_sprint_duration).sum::<f64>() / n;
        let success_probability = similar_projects.iter().filter(|p| p.completion_rate > 0.8).count() as f64 / n;
        Some(SuccessIndicators { optimal_tasks_per_sprint, recommended_duration, success_probability })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryChronicleStore;

    fn row(id: &str, team_size: f64, completion_rate: f64, optimal: f64, series: Vec<f64>) -> ProjectAnalytics {
        ProjectAnalytics {
            project_id: id.to_string(),
            team_size,
            avg_task_complexity: 5.0,
            domain_category_code: 2.0,
            project_duration_weeks: 12.0,
            completion_rate,
            avg_sprint_duration: 2.0,
            optimal_task_count: optimal,
            completed_tasks_per_sprint: series,
        }
    }

    #[tokio::test]
    async fn unknown_project_yields_empty_analysis() {
        let store = Arc::new(InMemoryChronicleStore::default());
        let analyzer = ChronicleAnalyzer::new(store, CircuitBreakerConfig::default());
        let analysis = analyzer.analyze("P404").await;
        assert!(analysis.similar_projects.is_empty());
        assert!(analysis.velocity.is_none());
    }

    #[tokio::test]
    async fn finds_similar_projects_and_velocity_trend() {
        let store = Arc::new(InMemoryChronicleStore::default());
        store.seed_analytics(vec![
            row("P1", 5.0, 0.9, 6.0, vec![4.0, 5.0, 6.0, 7.0]),
            row("P2", 5.0, 0.95, 7.0, vec![]),
            row("P3", 18.0, 0.5, 2.0, vec![]),
        ]);
        let analyzer = ChronicleAnalyzer::new(store, CircuitBreakerConfig::default());
        let analysis = analyzer.analyze("P1").await;
        assert_eq!(analysis.similar_projects.len(), 2);
        assert!(analysis.similar_projects[0].similarity_score >= analysis.similar_projects[1].similarity_score);
        let velocity = analysis.velocity.as_ref().unwrap();
        assert_eq!(velocity.trend_direction, TrendDirection::Increasing);
        let success = analysis.success.as_ref().unwrap();
        assert!((success.success_probability - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn repeated_calls_hit_cache() {
        let store = Arc::new(InMemoryChronicleStore::default());
        store.seed_analytics(vec![row("P1", 5.0, 0.9, 6.0, vec![1.0, 2.0])]);
        let analyzer = ChronicleAnalyzer::new(store, CircuitBreakerConfig::default());
        let first = analyzer.analyze("P1").await;
        let second = analyzer.analyze("P1").await;
        assert!(Arc::ptr_eq(&first, &second));
    }
}

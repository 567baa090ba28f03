//! Strategy Evolver (spec §4.C16): the daily batch pipeline that turns
//! episode history into durable [`Strategy`] rows and retunes them against
//! real outcomes. Four phases — extract, generate, optimize, cleanup — each
//! run independently; a failed phase is recorded in the returned
//! [`EvolutionReport`] and does not prevent the remaining phases from
//! running, the same fault-tolerance posture [`crate::chronicle_analyzer`]
//! uses for its own per-project analysis.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::config::EvolverConfig;
use crate::error::Result;
use crate::math::stdev;
use crate::store::{ChronicleStore, EpisodeStore, KnowledgeStore};
use crate::types::{Episode, StrategyPerformanceLog};

const STRATEGY_TYPE: &str = "context_based";
const RISK_LOW_THRESHOLD: f64 = 0.8;
const RISK_MEDIUM_THRESHOLD: f64 = 0.6;
const TREND_THRESHOLD: f64 = 0.05;
const CONFIDENCE_NUDGE: f64 = 0.05;
const MIN_CONFIDENCE_FLOOR: f64 = 0.1;

/// Risk band assigned to a generated strategy, derived from the same
/// frequency/quality/consistency evidence as its confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// A cluster of successful episodes sharing a context signature (phase 1 output).
#[derive(Debug, Clone)]
struct ExtractedPattern {
    context_signature: String,
    frequency: usize,
    mean_quality: f64,
    consistency: f64,
    supporting_episodes: Vec<Uuid>,
}

impl ExtractedPattern {
    fn is_viable(&self, confidence: f64, config: &EvolverConfig) -> bool {
        confidence >= config.min_pattern_confidence
            && self.frequency >= config.min_pattern_frequency
            && self.mean_quality >= config.success_quality_floor
    }
}

/// Derives a coarse context signature from a perception snapshot: team-size
/// band crossed with whether the backlog had unassigned work. Two episodes
/// with the same signature are assumed comparable for pattern purposes.
fn context_signature(perception: &serde_json::Value) -> String {
    let team_size = perception.get("team_size").and_then(serde_json::Value::as_u64).unwrap_or(0);
    let team_band = match team_size {
        0..=2 => "small",
        3..=7 => "medium",
        _ => "large",
    };
    let backlog_heavy = perception.get("unassigned_tasks").and_then(serde_json::Value::as_u64).unwrap_or(0) > 0;
    format!("team_{team_band}_backlog_{}", if backlog_heavy { "pending" } else { "clear" })
}

fn weighted_confidence(pattern: &ExtractedPattern) -> f64 {
    let frequency_score = (pattern.frequency as f64 / 10.0).min(1.0);
    let quality_score = pattern.mean_quality;
    let consistency_score = pattern.consistency;
    let evidence_strength_score = (pattern.supporting_episodes.len() as f64 / 20.0).min(1.0);

    0.2 * frequency_score + 0.4 * quality_score + 0.3 * consistency_score + 0.1 * evidence_strength_score
}

fn risk_level(pattern: &ExtractedPattern) -> RiskLevel {
    let risk_score = (pattern.frequency as f64 / 10.0 + pattern.mean_quality + pattern.consistency) / 3.0;
    if risk_score >= RISK_LOW_THRESHOLD {
        RiskLevel::Low
    } else if risk_score >= RISK_MEDIUM_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Outcome of one evolution phase: whether it completed and a short detail
/// string describing what happened or why it failed.
#[derive(Debug, Clone, Default)]
pub struct PhaseOutcome {
    pub succeeded: bool,
    pub detail: String,
}

impl PhaseOutcome {
    fn ok(detail: impl Into<String>) -> Self {
        Self { succeeded: true, detail: detail.into() }
    }

    fn failed(phase: &str, err: &crate::error::Error) -> Self {
        warn!(phase, error = %err, "strategy evolution phase failed, continuing with remaining phases");
        Self { succeeded: false, detail: err.to_string() }
    }
}

/// Full result of one `run_daily_evolution` call.
#[derive(Debug, Clone, Default)]
pub struct EvolutionReport {
    pub pattern_extraction: PhaseOutcome,
    pub strategy_generation: PhaseOutcome,
    pub strategy_optimization: PhaseOutcome,
    pub cleanup: PhaseOutcome,
    pub patterns_extracted: usize,
    pub strategies_generated: usize,
    pub strategies_optimized: usize,
    pub strategies_deactivated: usize,
    pub performance_logs_pruned: usize,
}

impl EvolutionReport {
    /// Whether every phase that ran, ran successfully.
    #[must_use]
    pub fn overall_success(&self) -> bool {
        self.pattern_extraction.succeeded
            && self.strategy_generation.succeeded
            && self.strategy_optimization.succeeded
            && self.cleanup.succeeded
    }
}

/// Coordinates the daily strategy evolution batch.
pub struct StrategyEvolver {
    episodes: Arc<dyn EpisodeStore>,
    knowledge: Arc<dyn KnowledgeStore>,
    config: EvolverConfig,
}

impl StrategyEvolver {
    /// Builds an evolver. `_chronicle` is accepted for construction symmetry
    /// with the rest of the engine's collaborators but the evolver only
    /// reads from episode + knowledge storage.
    #[must_use]
    pub fn new(
        episodes: Arc<dyn EpisodeStore>,
        knowledge: Arc<dyn KnowledgeStore>,
        _chronicle: Arc<dyn ChronicleStore>,
        config: EvolverConfig,
    ) -> Self {
        Self { episodes, knowledge, config }
    }

    /// Runs all four phases in order, independent of each other's success.
    pub async fn run_daily_evolution(&self) -> EvolutionReport {
        let mut report = EvolutionReport::default();

        let patterns = match self.extract_patterns().await {
            Ok(patterns) => {
                report.patterns_extracted = patterns.len();
                report.pattern_extraction = PhaseOutcome::ok(format!("{} viable context signatures", patterns.len()));
                patterns
            }
            Err(err) => {
                report.pattern_extraction = PhaseOutcome::failed("pattern_extraction", &err);
                Vec::new()
            }
        };

        match self.generate_strategies(&patterns).await {
            Ok(generated) => {
                report.strategies_generated = generated;
                report.strategy_generation = PhaseOutcome::ok(format!("{generated} strategies generated"));
            }
            Err(err) => report.strategy_generation = PhaseOutcome::failed("strategy_generation", &err),
        }

        match self.optimize_strategies().await {
            Ok((optimized, deactivated)) => {
                report.strategies_optimized = optimized;
                report.strategies_deactivated = deactivated;
                report.strategy_optimization =
                    PhaseOutcome::ok(format!("{optimized} confidence adjustments, {deactivated} deactivations"));
            }
            Err(err) => report.strategy_optimization = PhaseOutcome::failed("strategy_optimization", &err),
        }

        match self.cleanup().await {
            Ok(pruned) => {
                report.performance_logs_pruned = pruned;
                report.cleanup = PhaseOutcome::ok(format!("{pruned} performance log rows pruned"));
            }
            Err(err) => report.cleanup = PhaseOutcome::failed("cleanup", &err),
        }

        report
    }

    /// Phase 1: scan recent successful episodes project by project, grouping
    /// by context signature.
    async fn extract_patterns(&self) -> Result<Vec<ExtractedPattern>> {
        let cutoff = Utc::now() - Duration::days(self.config.pattern_extraction_days);
        let projects = self.episodes.list_projects().await?;

        let mut by_signature: HashMap<String, Vec<&Episode>> = HashMap::new();
        let mut all_episodes: Vec<Episode> = Vec::new();
        for project_id in &projects {
            let page = self.episodes.get_by_project(project_id, usize::MAX, 0, Some((cutoff, Utc::now()))).await?;
            all_episodes.extend(page.into_iter().filter(|e| e.effective_quality() >= self.config.success_quality_floor));
        }
        for episode in &all_episodes {
            by_signature.entry(context_signature(&episode.perception)).or_default().push(episode);
        }

        let mut patterns: Vec<ExtractedPattern> = by_signature
            .into_iter()
            .filter(|(_, episodes)| episodes.len() >= self.config.min_pattern_frequency)
            .map(|(context_signature, episodes)| {
                let qualities: Vec<f64> = episodes.iter().map(|e| e.effective_quality()).collect();
                let mean_quality = qualities.iter().sum::<f64>() / qualities.len() as f64;
                let consistency = (1.0 - stdev(&qualities)).max(0.0);
                ExtractedPattern {
                    context_signature,
                    frequency: episodes.len(),
                    mean_quality,
                    consistency,
                    supporting_episodes: episodes.iter().map(|e| e.id).collect(),
                }
            })
            .collect();
        patterns.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        Ok(patterns)
    }

    /// Phase 2: convert viable patterns into durable [`crate::types::Strategy`] rows.
    async fn generate_strategies(&self, patterns: &[ExtractedPattern]) -> Result<usize> {
        let mut generated = 0;
        for pattern in patterns {
            let confidence = weighted_confidence(pattern);
            if !pattern.is_viable(confidence, &self.config) {
                continue;
            }

            let content = json!({
                "context_signature": pattern.context_signature,
                "applicability_conditions": { "context_signature": pattern.context_signature },
                "risk_level": risk_level(pattern).as_str(),
                "supporting_evidence": {
                    "frequency": pattern.frequency,
                    "mean_quality": pattern.mean_quality,
                    "consistency": pattern.consistency,
                },
            });
            let description = format!(
                "Strategy for {} contexts: {} supporting episodes, {:.0}% average outcome quality.",
                pattern.context_signature.replace('_', " "),
                pattern.frequency,
                pattern.mean_quality * 100.0
            );

            self.knowledge
                .create_strategy(STRATEGY_TYPE, content, &description, confidence, pattern.supporting_episodes.clone())
                .await?;
            generated += 1;
        }
        Ok(generated)
    }

    /// Phase 3: re-score active strategies against recent performance-log history.
    async fn optimize_strategies(&self) -> Result<(usize, usize)> {
        let active = self.knowledge.get_active(None, usize::MAX, 0).await?;
        let cutoff = Utc::now() - Duration::days(self.config.pattern_extraction_days);

        let mut optimized = 0;
        let mut deactivated = 0;
        for strategy in active {
            let history = self.knowledge.get_performance_history(strategy.id, cutoff).await?;
            if history.len() < self.config.min_pattern_frequency {
                continue;
            }

            let avg_quality = mean_outcome(&history);
            let trend = performance_trend(&history);

            if avg_quality <= self.config.deactivation_quality_floor {
                self.knowledge
                    .deactivate(strategy.id, &format!("performance at or below floor: avg_quality={avg_quality:.3}"))
                    .await?;
                deactivated += 1;
            } else if avg_quality >= self.config.success_quality_floor && trend != Trend::Declining {
                let new_confidence = (strategy.confidence + CONFIDENCE_NUDGE).min(1.0);
                self.knowledge.adjust_confidence(strategy.id, new_confidence).await?;
                optimized += 1;
            } else if trend == Trend::Declining {
                let new_confidence = (strategy.confidence - CONFIDENCE_NUDGE).max(MIN_CONFIDENCE_FLOOR);
                self.knowledge.adjust_confidence(strategy.id, new_confidence).await?;
                optimized += 1;
            }
        }
        Ok((optimized, deactivated))
    }

    /// Phase 4: prune performance-log rows older than the retention window.
    async fn cleanup(&self) -> Result<usize> {
        let retention = Duration::days(self.config.pattern_extraction_days * self.config.cleanup_window_multiplier);
        self.knowledge.prune_performance_log(Utc::now() - retention).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Improving,
    Stable,
    Declining,
}

fn mean_outcome(history: &[StrategyPerformanceLog]) -> f64 {
    let qualities: Vec<f64> = history.iter().filter_map(|h| h.actual_outcome).collect();
    if qualities.is_empty() {
        return 0.0;
    }
    qualities.iter().sum::<f64>() / qualities.len() as f64
}

/// Splits `history` (already sorted oldest-first by the store) into older and
/// recent halves and compares mean quality, mirroring the split-period trend
/// comparison the Chronicle analyzer uses for velocity.
fn performance_trend(history: &[StrategyPerformanceLog]) -> Trend {
    if history.len() < 3 {
        return Trend::Stable;
    }
    let mid = history.len() / 2;
    let older_avg = mean_outcome(&history[..mid]);
    let recent_avg = mean_outcome(&history[mid..]);
    let diff = recent_avg - older_avg;
    if diff.abs() < TREND_THRESHOLD {
        Trend::Stable
    } else if diff > 0.0 {
        Trend::Improving
    } else {
        Trend::Declining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryChronicleStore, InMemoryEpisodeStore, InMemoryKnowledgeStore};
    use crate::types::DecisionMode;
    use serde_json::json;

    fn episode(project: &str, team_size: u64, quality: f64) -> Episode {
        let mut ep = Episode {
            id: Uuid::new_v4(),
            project_id: project.to_string(),
            timestamp: Utc::now(),
            perception: json!({"team_size": team_size, "unassigned_tasks": 2}),
            reasoning: json!({}),
            action: json!({}),
            outcome: None,
            agent_version: "0.1.0".into(),
            decision_mode: DecisionMode::IntelligenceEnhanced,
            fingerprint: Vec::new(),
            sprint_id: None,
            chronicle_note_id: None,
        };
        ep.attach_outcome(true, quality, Utc::now());
        ep
    }

    fn evolver_with(episodes: Arc<InMemoryEpisodeStore>, knowledge: Arc<InMemoryKnowledgeStore>) -> StrategyEvolver {
        StrategyEvolver::new(episodes, knowledge, Arc::new(InMemoryChronicleStore::default()), EvolverConfig::default())
    }

    #[tokio::test]
    async fn extract_patterns_groups_by_context_signature_and_drops_sparse_clusters() {
        let episodes = Arc::new(InMemoryEpisodeStore::default());
        for _ in 0..3 {
            episodes.store(&episode("P1", 4, 0.9)).await.unwrap();
        }
        episodes.store(&episode("P1", 15, 0.9)).await.unwrap();

        let evolver = evolver_with(episodes, Arc::new(InMemoryKnowledgeStore::default()));
        let patterns = evolver.extract_patterns().await.unwrap();

        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].frequency, 3);
        assert_eq!(patterns[0].context_signature, "team_medium_backlog_pending");
    }

    #[tokio::test]
    async fn generate_strategies_skips_patterns_below_viability_thresholds() {
        let episodes = Arc::new(InMemoryEpisodeStore::default());
        for _ in 0..3 {
            episodes.store(&episode("P1", 4, 0.3)).await.unwrap();
        }
        let knowledge = Arc::new(InMemoryKnowledgeStore::default());
        let evolver = evolver_with(episodes, knowledge.clone());

        let patterns = evolver.extract_patterns().await.unwrap();
        assert_eq!(patterns.len(), 1);
        let generated = evolver.generate_strategies(&patterns).await.unwrap();

        assert_eq!(generated, 0);
        assert!(knowledge.get_active(None, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_strategies_creates_a_strategy_for_a_viable_pattern() {
        let episodes = Arc::new(InMemoryEpisodeStore::default());
        for _ in 0..5 {
            episodes.store(&episode("P1", 4, 0.9)).await.unwrap();
        }
        let knowledge = Arc::new(InMemoryKnowledgeStore::default());
        let evolver = evolver_with(episodes, knowledge.clone());

        let patterns = evolver.extract_patterns().await.unwrap();
        let generated = evolver.generate_strategies(&patterns).await.unwrap();

        assert_eq!(generated, 1);
        let active = knowledge.get_active(None, 10, 0).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].confidence > 0.0);
    }

    #[tokio::test]
    async fn optimize_strategies_deactivates_poor_performers() {
        let knowledge = Arc::new(InMemoryKnowledgeStore::default());
        let strategy_id =
            knowledge.create_strategy(STRATEGY_TYPE, json!({}), "desc", 0.6, Vec::new()).await.unwrap();
        for _ in 0..3 {
            knowledge
                .log_performance(StrategyPerformanceLog {
                    strategy_id,
                    episode_id: Uuid::new_v4(),
                    predicted_outcome: 0.6,
                    actual_outcome: Some(0.1),
                    context_similarity: 0.8,
                    logged_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let evolver = evolver_with(Arc::new(InMemoryEpisodeStore::default()), knowledge.clone());
        let (optimized, deactivated) = evolver.optimize_strategies().await.unwrap();

        assert_eq!(optimized, 0);
        assert_eq!(deactivated, 1);
        assert!(knowledge.get_active(None, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn optimize_strategies_nudges_confidence_up_for_strong_performers() {
        let knowledge = Arc::new(InMemoryKnowledgeStore::default());
        let strategy_id =
            knowledge.create_strategy(STRATEGY_TYPE, json!({}), "desc", 0.6, Vec::new()).await.unwrap();
        for _ in 0..4 {
            knowledge
                .log_performance(StrategyPerformanceLog {
                    strategy_id,
                    episode_id: Uuid::new_v4(),
                    predicted_outcome: 0.8,
                    actual_outcome: Some(0.9),
                    context_similarity: 0.9,
                    logged_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let evolver = evolver_with(Arc::new(InMemoryEpisodeStore::default()), knowledge.clone());
        let (optimized, deactivated) = evolver.optimize_strategies().await.unwrap();

        assert_eq!(optimized, 1);
        assert_eq!(deactivated, 0);
        let active = knowledge.get_active(None, 10, 0).await.unwrap();
        assert!((active[0].confidence - 0.65).abs() < 1e-9);
    }

    #[tokio::test]
    async fn run_daily_evolution_continues_past_phase_failures_and_reports_them() {
        let episodes = Arc::new(InMemoryEpisodeStore::default());
        let knowledge = Arc::new(InMemoryKnowledgeStore::default());
        let evolver = evolver_with(episodes, knowledge);

        let report = evolver.run_daily_evolution().await;

        assert!(report.pattern_extraction.succeeded);
        assert!(report.strategy_generation.succeeded);
        assert!(report.strategy_optimization.succeeded);
        assert!(report.cleanup.succeeded);
        assert_eq!(report.patterns_extracted, 0);
    }
}

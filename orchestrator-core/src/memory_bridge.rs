//! Memory Bridge (spec §4.C6): translates retrieved episodes into a
//! [`DecisionContext`]. Never panics on malformed episodes — missing fields
//! degrade confidence rather than aborting the translation.

use crate::config::MemoryBridgeConfig;
use crate::retrieval::RetrievedEpisode;
use crate::types::{DecisionContext, Pattern, PatternSource, PatternType, PatternWeightSplit};

/// Translates episode memory into a transient per-invocation context.
pub struct MemoryBridge {
    config: MemoryBridgeConfig,
}

fn field_u64(value: &serde_json::Value, key: &str) -> Option<u64> {
    value.get(key).and_then(serde_json::Value::as_u64)
}

fn has_required_fields(retrieved: &RetrievedEpisode) -> bool {
    let e = &retrieved.episode;
    !e.perception.get("team_size").is_none_or(serde_json::Value::is_null)
        && !e.action.is_null()
        && !e.reasoning.is_null()
}

impl MemoryBridge {
    /// Builds a bridge with the given thresholds.
    #[must_use]
    pub fn new(config: MemoryBridgeConfig) -> Self {
        Self { config }
    }

    /// Step 1: drops episodes below the similarity/quality threshold or
    /// missing required fields.
    fn filter<'a>(&self, episodes: &'a [RetrievedEpisode]) -> Vec<&'a RetrievedEpisode> {
        episodes
            .iter()
            .filter(|r| r.similarity >= self.config.min_similarity_threshold)
            .filter(|r| r.episode.effective_quality() >= self.config.min_quality)
            .filter(|r| has_required_fields(r))
            .collect()
    }

    /// Step 2: one-line insight summarizing the action taken.
    fn insight_for(episode: &RetrievedEpisode) -> Option<String> {
        let tasks = field_u64(&episode.episode.action, "tasks_to_assign")?;
        let weeks = field_u64(&episode.episode.action, "sprint_duration_weeks").unwrap_or(2);
        Some(format!("Created sprint with {tasks} tasks, {weeks}-week sprint"))
    }

    /// Step 3a: task-count pattern — cluster by `tasks_to_assign` (±1), pick
    /// the cluster with highest mean quality ≥ 0.7.
    fn task_count_pattern(&self, episodes: &[&RetrievedEpisode]) -> Option<Pattern> {
        let values: Vec<(u64, f64)> = episodes
            .iter()
            .filter_map(|r| field_u64(&r.episode.action, "tasks_to_assign").map(|v| (v, r.episode.effective_quality())))
            .collect();
        self.best_cluster(&values, PatternType::TaskCount)
    }

    /// Step 3b: sprint-duration pattern — same clustering over
    /// `sprint_duration_weeks`, requiring ≥ 2 supporters.
    fn sprint_duration_pattern(&self, episodes: &[&RetrievedEpisode]) -> Option<Pattern> {
        let values: Vec<(u64, f64)> = episodes
            .iter()
            .filter_map(|r| {
                field_u64(&r.episode.action, "sprint_duration_weeks").map(|v| (v, r.episode.effective_quality()))
            })
            .collect();
        self.best_cluster(&values, PatternType::SprintDuration)
    }

    fn best_cluster(&self, values: &[(u64, f64)], pattern_type: PatternType) -> Option<Pattern> {
        if values.len() < self.config.min_episodes_for_patterns {
            return None;
        }
        let mut distinct: Vec<u64> = values.iter().map(|(v, _)| *v).collect();
        distinct.sort_unstable();
        distinct.dedup();

        let n = values.len();
        let mut best: Option<(u64, Vec<f64>)> = None;
        for &center in &distinct {
            let cluster: Vec<f64> =
                values.iter().filter(|(v, _)| v.abs_diff(center) <= 1).map(|(_, q)| *q).collect();
            let mean = cluster.iter().sum::<f64>() / cluster.len() as f64;
            if mean < 0.7 {
                continue;
            }
            let better = best.as_ref().is_none_or(|(_, best_cluster)| {
                let best_mean = best_cluster.iter().sum::<f64>() / best_cluster.len() as f64;
                mean > best_mean
            });
            if better {
                best = Some((center, cluster));
            }
        }

        let (center, cluster) = best?;
        if pattern_type == PatternType::SprintDuration && cluster.len() < 2 {
            return None;
        }
        let success_rate = cluster.iter().sum::<f64>() / cluster.len() as f64;
        let confidence = (cluster.len() as f64 / n as f64).min(1.0);
        Some(Pattern {
            pattern_type,
            value: center as f64,
            success_rate,
            confidence,
            weight: PatternWeightSplit::default(),
            evidence_count: cluster.len(),
            source: PatternSource::EpisodesOnly,
        })
    }

    /// Overall confidence: mean of quantity/quality/pattern/success-metric confidences.
    fn overall_confidence(&self, filtered: &[&RetrievedEpisode], patterns: &[Pattern]) -> f64 {
        let n = filtered.len();
        if n == 0 {
            return 0.0;
        }
        let quantity_confidence = (n as f64 / 5.0).min(1.0);
        let mean_quality = filtered.iter().map(|r| r.episode.effective_quality()).sum::<f64>() / n as f64;
        let mean_pattern_confidence = if patterns.is_empty() {
            0.0
        } else {
            patterns.iter().map(|p| p.confidence).sum::<f64>() / patterns.len() as f64
        };
        let success_metric = filtered
            .iter()
            .filter(|r| r.episode.outcome.as_ref().is_some_and(|o| o.success))
            .count() as f64
            / n as f64;
        (quantity_confidence + mean_quality + mean_pattern_confidence + success_metric) / 4.0
    }

    /// Episode share of weight in later fusion: `0.6*quantity + 0.4*quality`, capped at 0.8.
    fn pattern_weight(&self, filtered: &[&RetrievedEpisode]) -> f64 {
        let n = filtered.len();
        if n == 0 {
            return 0.0;
        }
        let quantity_weight = (n as f64 / 5.0).min(1.0);
        let quality_weight = filtered.iter().map(|r| r.episode.effective_quality()).sum::<f64>() / n as f64;
        (0.6 * quantity_weight + 0.4 * quality_weight).min(0.8)
    }

    /// Translates retrieved episodes into a [`DecisionContext`].
    #[must_use]
    pub fn build_context(&self, episodes: &[RetrievedEpisode]) -> DecisionContext {
        let filtered = self.filter(episodes);
        let episodes_used = filtered.len();

        let average_similarity = if filtered.is_empty() {
            0.0
        } else {
            filtered.iter().map(|r| r.similarity).sum::<f64>() / filtered.len() as f64
        };

        let mut identified_patterns = Vec::new();
        if episodes_used >= self.config.min_episodes_for_patterns {
            identified_patterns.extend(self.task_count_pattern(&filtered));
            identified_patterns.extend(self.sprint_duration_pattern(&filtered));
        }

        let recommendations: Vec<String> = identified_patterns
            .iter()
            .filter(|p| p.confidence > 0.5)
            .map(|p| format!("{:?}: {}", p.pattern_type, p.rounded_value()))
            .collect();

        let key_insights: Vec<String> = filtered.iter().filter_map(|r| Self::insight_for(r)).collect();

        let overall_confidence = self.overall_confidence(&filtered, &identified_patterns);
        let risk_factors = if episodes_used == 0 {
            vec!["no comparable historical episodes found".to_string()]
        } else {
            Vec::new()
        };

        DecisionContext {
            similar_episodes_found: episodes.len(),
            episodes_used,
            average_similarity,
            identified_patterns,
            recommendations,
            overall_confidence,
            key_insights,
            risk_factors,
        }
        .with_pattern_weight(self.pattern_weight(&filtered))
    }
}

trait WithPatternWeight {
    fn with_pattern_weight(self, weight: f64) -> Self;
}

impl WithPatternWeight for DecisionContext {
    fn with_pattern_weight(mut self, weight: f64) -> Self {
        for pattern in &mut self.identified_patterns {
            pattern.weight = PatternWeightSplit { episode: weight, chronicle: 1.0 - weight };
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DecisionMode, Episode, EpisodeOutcome};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn retrieved(tasks: u64, quality: f64, similarity: f64) -> RetrievedEpisode {
        let episode = Episode {
            id: Uuid::new_v4(),
            project_id: "P1".into(),
            timestamp: Utc::now(),
            perception: json!({"team_size": 3}),
            reasoning: json!({"rationale": "cold start"}),
            action: json!({"tasks_to_assign": tasks, "sprint_duration_weeks": 2}),
            outcome: Some(EpisodeOutcome { success: quality >= 0.7, quality, recorded_at: Utc::now() }),
            agent_version: "0.1.0".into(),
            decision_mode: DecisionMode::RuleBasedOnly,
            fingerprint: vec![],
            sprint_id: None,
            chronicle_note_id: None,
        };
        RetrievedEpisode { episode, similarity }
    }

    #[test]
    fn filters_below_similarity_threshold() {
        let bridge = MemoryBridge::new(MemoryBridgeConfig::default());
        let episodes = vec![retrieved(6, 0.9, 0.3)];
        let ctx = bridge.build_context(&episodes);
        assert_eq!(ctx.episodes_used, 0);
    }

    #[test]
    fn identifies_task_count_pattern_from_cluster() {
        let bridge = MemoryBridge::new(MemoryBridgeConfig::default());
        let episodes = vec![retrieved(6, 0.8, 0.9), retrieved(6, 0.9, 0.8), retrieved(7, 0.75, 0.85)];
        let ctx = bridge.build_context(&episodes);
        assert_eq!(ctx.episodes_used, 3);
        assert!(ctx.identified_patterns.iter().any(|p| p.pattern_type == PatternType::TaskCount));
    }

    #[test]
    fn never_panics_on_missing_fields() {
        let bridge = MemoryBridge::new(MemoryBridgeConfig::default());
        let mut ep = retrieved(6, 0.8, 0.9);
        ep.episode.action = serde_json::Value::Null;
        let ctx = bridge.build_context(&[ep]);
        assert_eq!(ctx.episodes_used, 0);
    }

    #[test]
    fn empty_input_yields_empty_context_with_risk_factor() {
        let bridge = MemoryBridge::new(MemoryBridgeConfig::default());
        let ctx = bridge.build_context(&[]);
        assert!(ctx.is_empty());
        assert!(!ctx.risk_factors.is_empty());
    }
}

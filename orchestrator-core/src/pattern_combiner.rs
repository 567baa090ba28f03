//! Pattern Combiner (spec §4.C8): fuses the episode-derived [`DecisionContext`]
//! with Chronicle's [`ChronicleAnalysis`] into a single set of hybrid patterns.

use crate::config::PatternCombinerConfig;
use crate::types::{
    ChronicleAnalysis, DecisionContext, Pattern, PatternSource, PatternType, PatternWeightSplit,
};

const SINGLE_SOURCE_MULTIPLIER: f64 = 0.8;
const WEIGHT_FLOOR: f64 = 0.1;

/// Output of a combiner run: the fused patterns plus one overall confidence.
#[derive(Debug, Clone, Default)]
pub struct CombinedPatterns {
    /// Fused (or single-source passthrough) patterns, confidence-filtered.
    pub patterns: Vec<Pattern>,
    /// Overall confidence across the combined pattern set.
    pub overall_confidence: f64,
}

/// One source's contribution to a combined pattern before fusion.
struct SourceCandidate {
    value: f64,
    confidence: f64,
    success_rate: f64,
}

/// Fuses episode and Chronicle pattern evidence per configured thresholds.
pub struct PatternCombiner {
    config: PatternCombinerConfig,
}

impl PatternCombiner {
    /// Builds a combiner with the given thresholds.
    #[must_use]
    pub fn new(config: PatternCombinerConfig) -> Self {
        Self { config }
    }

    fn normalized_weights(&self, episode_quality: Option<f64>, chronicle_quality: Option<f64>) -> (f64, f64) {
        match (episode_quality, chronicle_quality) {
            (Some(eq), Some(cq)) => {
                let total = (eq + cq).max(f64::EPSILON);
                let episode = (eq / total).max(WEIGHT_FLOOR);
                let chronicle = (cq / total).max(WEIGHT_FLOOR);
                let renorm = episode + chronicle;
                (episode / renorm, chronicle / renorm)
            }
            (Some(_), None) => (1.0, 0.0),
            (None, Some(_)) => (0.0, 1.0),
            (None, None) => (0.0, 0.0),
        }
    }

    fn episode_quality(episode: &DecisionContext) -> f64 {
        let episode_count_score = (episode.episodes_used as f64 / 5.0).min(1.0);
        0.3 * episode_count_score + 0.4 * episode.average_similarity + 0.3 * episode.overall_confidence
    }

    fn chronicle_quality(chronicle: &ChronicleAnalysis) -> f64 {
        let n = chronicle.similar_projects.len();
        let project_count_score = (n as f64 / 5.0).min(1.0);
        let avg_similarity = if n == 0 {
            0.0
        } else {
            chronicle.similar_projects.iter().map(|p| p.similarity_score).sum::<f64>() / n as f64
        };
        0.5 * project_count_score + 0.5 * avg_similarity
    }

    fn episode_task_count(episode: &DecisionContext) -> Option<SourceCandidate> {
        episode.identified_patterns.iter().find(|p| p.pattern_type == PatternType::TaskCount).map(|p| {
            SourceCandidate { value: p.value, confidence: p.confidence, success_rate: p.success_rate }
        })
    }

    fn episode_sprint_duration(episode: &DecisionContext) -> Option<SourceCandidate> {
        episode.identified_patterns.iter().find(|p| p.pattern_type == PatternType::SprintDuration).map(|p| {
            SourceCandidate { value: p.value, confidence: p.confidence, success_rate: p.success_rate }
        })
    }

    fn chronicle_task_count(chronicle: &ChronicleAnalysis) -> Option<SourceCandidate> {
        let success = chronicle.success.as_ref()?;
        Some(SourceCandidate {
            value: success.optimal_tasks_per_sprint,
            confidence: success.success_probability,
            success_rate: success.success_probability,
        })
    }

    fn chronicle_sprint_duration(chronicle: &ChronicleAnalysis) -> Option<SourceCandidate> {
        let success = chronicle.success.as_ref()?;
        Some(SourceCandidate {
            value: success.recommended_duration,
            confidence: success.success_probability,
            success_rate: success.success_probability,
        })
    }

    fn fuse_task_count(
        &self,
        episode: Option<SourceCandidate>,
        chronicle: Option<SourceCandidate>,
        episode_weight: f64,
        chronicle_weight: f64,
    ) -> Option<Pattern> {
        let (value, confidence, success_rate, evidence_count, source) = match (episode, chronicle) {
            (Some(e), Some(c)) => (
                (episode_weight * e.value + chronicle_weight * c.value).round(),
                episode_weight * e.confidence + chronicle_weight * c.confidence,
                episode_weight * e.success_rate + chronicle_weight * c.success_rate,
                2,
                PatternSource::Hybrid,
            ),
            (Some(e), None) => (e.value.round(), e.confidence * SINGLE_SOURCE_MULTIPLIER, e.success_rate, 1, PatternSource::EpisodesOnly),
            (None, Some(c)) => (c.value.round(), c.confidence * SINGLE_SOURCE_MULTIPLIER, c.success_rate, 1, PatternSource::ChronicleOnly),
            (None, None) => return None,
        };
        Some(Pattern {
            pattern_type: PatternType::TaskCount,
            value,
            success_rate,
            confidence,
            weight: PatternWeightSplit { episode: episode_weight, chronicle: chronicle_weight },
            evidence_count,
            source,
        })
    }

    fn fuse_sprint_duration(
        &self,
        episode: Option<SourceCandidate>,
        chronicle: Option<SourceCandidate>,
        episode_weight: f64,
        chronicle_weight: f64,
    ) -> Option<Pattern> {
        let (value, confidence, success_rate, evidence_count, source) = match (episode, chronicle) {
            (Some(e), Some(c)) => {
                if (e.value.round() - c.value.round()).abs() < f64::EPSILON {
                    (e.value.round(), (e.confidence + c.confidence).min(1.0), (e.success_rate + c.success_rate) / 2.0, 2, PatternSource::Hybrid)
                } else {
                    let weighted = episode_weight * e.confidence + chronicle_weight * c.confidence;
                    let value = if e.confidence >= c.confidence { e.value } else { c.value };
                    (value.round(), weighted, (e.success_rate + c.success_rate) / 2.0, 2, PatternSource::Hybrid)
                }
            }
            (Some(e), None) => (e.value.round(), e.confidence * SINGLE_SOURCE_MULTIPLIER, e.success_rate, 1, PatternSource::EpisodesOnly),
            (None, Some(c)) => (c.value.round(), c.confidence * SINGLE_SOURCE_MULTIPLIER, c.success_rate, 1, PatternSource::ChronicleOnly),
            (None, None) => return None,
        };
        Some(Pattern {
            pattern_type: PatternType::SprintDuration,
            value,
            success_rate,
            confidence,
            weight: PatternWeightSplit { episode: episode_weight, chronicle: chronicle_weight },
            evidence_count,
            source,
        })
    }

    /// Fuses episode context (if any) with Chronicle analysis into combined
    /// patterns, discarding anything below `min_confidence_threshold`.
    #[must_use]
    pub fn combine(&self, episode: Option<&DecisionContext>, chronicle: &ChronicleAnalysis) -> CombinedPatterns {
        let has_episode = episode.is_some_and(|e| !e.is_empty());
        let has_chronicle = chronicle.success.is_some();

        let episode_quality = has_episode.then(|| Self::episode_quality(episode.expect("checked above")));
        let chronicle_quality = has_chronicle.then(|| Self::chronicle_quality(chronicle));
        let (episode_weight, chronicle_weight) = self.normalized_weights(episode_quality, chronicle_quality);

        let mut patterns = Vec::new();
        patterns.extend(self.fuse_task_count(
            episode.and_then(Self::episode_task_count),
            Self::chronicle_task_count(chronicle),
            episode_weight,
            chronicle_weight,
        ));
        patterns.extend(self.fuse_sprint_duration(
            episode.and_then(Self::episode_sprint_duration),
            Self::chronicle_sprint_duration(chronicle),
            episode_weight,
            chronicle_weight,
        ));

        patterns.retain(|p| p.confidence >= self.config.min_confidence_threshold);

        let overall_confidence = if patterns.is_empty() {
            0.0
        } else {
            let mean_confidence = patterns.iter().map(|p| p.confidence).sum::<f64>() / patterns.len() as f64;
            let bonus = (if has_episode { 0.4 } else { 0.0 }) + (if has_chronicle { 0.4 } else { 0.0 })
                + (if has_episode && has_chronicle { 0.2 } else { 0.0 });
            mean_confidence * bonus
        };

        CombinedPatterns { patterns, overall_confidence }
    }
}

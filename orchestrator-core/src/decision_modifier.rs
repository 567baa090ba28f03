//! Decision Modifier (spec §4.C9): proposes typed adjustments to the base
//! rule decision from Chronicle's similar-project and velocity-trend signal.
//! A pure function — no I/O.

use crate::config::DecisionModifierConfig;
use crate::types::{ProposedAdjustment, SimilarProject, TrendDirection, VelocityTrend};

/// Proposes a task-count adjustment when enough highly-similar projects agree
/// on a materially different optimal task count.
fn propose_task_count(
    base_task_count: u32,
    similar_projects: &[SimilarProject],
    config: &DecisionModifierConfig,
) -> Option<ProposedAdjustment> {
    let strong_matches: Vec<&SimilarProject> = similar_projects
        .iter()
        .filter(|p| p.similarity_score > config.min_similarity_for_adjustment_proposal)
        .collect();
    if strong_matches.len() < config.min_similar_projects {
        return None;
    }

    let n = strong_matches.len() as f64;
    let mean_optimal = strong_matches.iter().map(|p| p.optimal_task_count).sum::<f64>() / n;
    let mean_confidence = strong_matches.iter().map(|p| p.completion_rate).sum::<f64>() / n;

    let recommended = mean_optimal.round();
    let difference = recommended - f64::from(base_task_count);
    if difference.abs() <= config.task_adjustment_difference_threshold as f64
        || mean_confidence <= config.min_confidence_for_task_proposal
    {
        return None;
    }

    Some(ProposedAdjustment {
        kind: "task_count".to_string(),
        recommended_value: serde_json::json!(recommended),
        confidence: mean_confidence,
        rationale: format!(
            "{} similar projects (similarity > {:.2}) average {mean_optimal:.1} optimal tasks vs base {base_task_count}",
            strong_matches.len(),
            config.min_similarity_for_adjustment_proposal
        ),
        expected_improvement: None,
        evidence_details: format!("similar_project_count={}", strong_matches.len()),
    })
}

/// Proposes a one-week sprint-duration nudge when the velocity trend is
/// confident and the base duration has room to move.
fn propose_duration(
    base_duration_weeks: u32,
    velocity: Option<&VelocityTrend>,
    config: &DecisionModifierConfig,
) -> Option<ProposedAdjustment> {
    let velocity = velocity?;
    if velocity.confidence <= config.min_velocity_confidence_for_duration_adjustment {
        return None;
    }

    let recommended = match velocity.trend_direction {
        TrendDirection::Increasing if base_duration_weeks > 1 => base_duration_weeks - 1,
        TrendDirection::Decreasing if base_duration_weeks < 4 => base_duration_weeks + 1,
        _ => return None,
    };

    Some(ProposedAdjustment {
        kind: "sprint_duration".to_string(),
        recommended_value: serde_json::json!(recommended),
        confidence: velocity.confidence,
        rationale: format!(
            "velocity trend is {:?} with confidence {:.2}, base duration {base_duration_weeks} weeks",
            velocity.trend_direction, velocity.confidence
        ),
        expected_improvement: None,
        evidence_details: format!(
            "velocity current={:.1} min={:.1} max={:.1}",
            velocity.current, velocity.historical_min, velocity.historical_max
        ),
    })
}

/// Proposes every adjustment type the Chronicle signal supports.
#[must_use]
pub fn propose_adjustments(
    base_task_count: u32,
    base_duration_weeks: u32,
    similar_projects: &[SimilarProject],
    velocity: Option<&VelocityTrend>,
    config: &DecisionModifierConfig,
) -> Vec<ProposedAdjustment> {
    [
        propose_task_count(base_task_count, similar_projects, config),
        propose_duration(base_duration_weeks, velocity, config),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(similarity: f64, optimal: f64) -> SimilarProject {
        SimilarProject {
            project_id: "P".to_string(),
            similarity_score: similarity,
            team_size: 5.0,
            completion_rate: 0.9,
            avg_sprint_duration: 2.0,
            optimal_task_count: optimal,
        }
    }

    #[test]
    fn proposes_task_count_when_enough_strong_matches_disagree() {
        let config = DecisionModifierConfig::default();
        let similar = vec![project(0.8, 9.0), project(0.9, 10.0), project(0.75, 8.0)];
        let adjustments = propose_adjustments(5, 2, &similar, None, &config);
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].kind, "task_count");
    }

    #[test]
    fn skips_task_count_below_minimum_similar_projects() {
        let config = DecisionModifierConfig::default();
        let similar = vec![project(0.8, 9.0), project(0.9, 10.0)];
        let adjustments = propose_adjustments(5, 2, &similar, None, &config);
        assert!(adjustments.is_empty());
    }

    #[test]
    fn proposes_duration_decrease_on_increasing_trend() {
        let config = DecisionModifierConfig::default();
        let velocity = VelocityTrend {
            current: 8.0,
            historical_min: 4.0,
            historical_max: 8.0,
            trend_direction: TrendDirection::Increasing,
            confidence: 0.8,
        };
        let adjustments = propose_adjustments(5, 2, &[], Some(&velocity), &config);
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].kind, "sprint_duration");
        assert_eq!(adjustments[0].recommended_value, serde_json::json!(1));
    }

    #[test]
    fn skips_duration_when_confidence_too_low() {
        let config = DecisionModifierConfig::default();
        let velocity = VelocityTrend {
            current: 8.0,
            historical_min: 4.0,
            historical_max: 8.0,
            trend_direction: TrendDirection::Increasing,
            confidence: 0.5,
        };
        let adjustments = propose_adjustments(5, 2, &[], Some(&velocity), &config);
        assert!(adjustments.is_empty());
    }
}

//! Strategy: a learned rule mapping a context signature to recommended values.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A learned rule produced by the Strategy Evolver (spec §4.C16).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    /// Strategy id.
    pub id: Uuid,
    /// Type tag, e.g. `"task_count"` or `"sprint_duration"`.
    pub strategy_type: String,
    /// Applicability conditions + decision rules.
    pub content: Value,
    /// Human-readable description.
    pub description: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Number of times this strategy has been applied.
    pub times_applied: u64,
    /// Number of successful applications.
    pub success_count: u64,
    /// Number of unsuccessful applications.
    pub failure_count: u64,
    /// Episodes that support this strategy.
    pub supporting_episodes: HashSet<Uuid>,
    /// Episodes that contradict this strategy.
    pub contradicting_episodes: HashSet<Uuid>,
    /// When the strategy was created.
    pub created_at: DateTime<Utc>,
    /// When the strategy was last applied.
    pub last_applied: Option<DateTime<Utc>>,
    /// Whether the strategy is still eligible for use.
    pub is_active: bool,
}

impl Strategy {
    /// Derived success rate: `success_count / times_applied`, `0.0` if never applied.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.times_applied == 0 {
            0.0
        } else {
            self.success_count as f64 / self.times_applied as f64
        }
    }

    /// Records an application outcome, updating counters and episode sets without
    /// duplicating an episode id already present.
    pub fn record_application(&mut self, success: bool, episode: Option<Uuid>, now: DateTime<Utc>) {
        self.times_applied += 1;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        if let Some(ep) = episode {
            if success {
                self.supporting_episodes.insert(ep);
            } else {
                self.contradicting_episodes.insert(ep);
            }
        }
        self.last_applied = Some(now);
    }

    /// Deactivates the strategy, e.g. because performance dropped below a floor.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

/// Append-only performance log entry for one strategy application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyPerformanceLog {
    /// Strategy this entry concerns.
    pub strategy_id: Uuid,
    /// Episode this entry concerns.
    pub episode_id: Uuid,
    /// Predicted outcome quality at application time.
    pub predicted_outcome: f64,
    /// Actual outcome quality, attached once known.
    pub actual_outcome: Option<f64>,
    /// Similarity between the strategy's context and the episode's context.
    pub context_similarity: f64,
    /// When this entry was logged.
    pub logged_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strategy() -> Strategy {
        Strategy {
            id: Uuid::new_v4(),
            strategy_type: "task_count".into(),
            content: json!({"recommend": 6}),
            description: "smaller batches improve completion".into(),
            confidence: 0.6,
            times_applied: 0,
            success_count: 0,
            failure_count: 0,
            supporting_episodes: HashSet::new(),
            contradicting_episodes: HashSet::new(),
            created_at: Utc::now(),
            last_applied: None,
            is_active: true,
        }
    }

    #[test]
    fn success_rate_is_zero_before_any_application() {
        assert_eq!(strategy().success_rate(), 0.0);
    }

    #[test]
    fn recording_applications_updates_rate_and_sets() {
        let mut s = strategy();
        let ep1 = Uuid::new_v4();
        s.record_application(true, Some(ep1), Utc::now());
        s.record_application(false, Some(Uuid::new_v4()), Utc::now());
        assert_eq!(s.times_applied, 2);
        assert!((s.success_rate() - 0.5).abs() < 1e-9);
        assert!(s.supporting_episodes.contains(&ep1));
        assert_eq!(s.contradicting_episodes.len(), 1);
    }

    #[test]
    fn duplicate_episode_does_not_duplicate_in_set() {
        let mut s = strategy();
        let ep = Uuid::new_v4();
        s.record_application(true, Some(ep), Utc::now());
        s.record_application(true, Some(ep), Utc::now());
        assert_eq!(s.supporting_episodes.len(), 1);
    }
}

//! Chronicle Pattern Analyzer output types (spec §4.C7).

use serde::{Deserialize, Serialize};

/// A project found similar to the one under analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarProject {
    /// The similar project's id.
    pub project_id: String,
    /// Cosine similarity over the 4-feature normalized vector, in `[0, 1]`.
    pub similarity_score: f64,
    /// Its team size.
    pub team_size: f64,
    /// Its historical completion rate.
    pub completion_rate: f64,
    /// Its average sprint duration, in weeks.
    pub avg_sprint_duration: f64,
    /// Its observed optimal task count.
    pub optimal_task_count: f64,
}

/// Direction of the velocity trend over recent sprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Slope above the `+0.1` threshold.
    Increasing,
    /// Slope below the `-0.1` threshold.
    Decreasing,
    /// Slope within `[-0.1, 0.1]`.
    Stable,
}

/// Velocity trend computed from a completed-tasks-per-sprint series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityTrend {
    /// Most recent observed velocity.
    pub current: f64,
    /// Minimum velocity across the observed window.
    pub historical_min: f64,
    /// Maximum velocity across the observed window.
    pub historical_max: f64,
    /// Direction implied by the linear-regression slope.
    pub trend_direction: TrendDirection,
    /// Confidence in `[0, 1]`: `min(n/10, 1) * (1 - |slope|)`.
    pub confidence: f64,
}

/// Aggregate success indicators derived from the similar-project set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessIndicators {
    /// Average optimal task count across similar projects.
    pub optimal_tasks_per_sprint: f64,
    /// Average sprint duration across similar projects.
    pub recommended_duration: f64,
    /// Fraction of similar projects with `completion_rate > 0.8`.
    pub success_probability: f64,
}

/// Full Chronicle analysis for one project (spec §4.C7 output, cached 30 min).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronicleAnalysis {
    /// Projects found similar to the subject project.
    pub similar_projects: Vec<SimilarProject>,
    /// Velocity trend, if a completed-tasks-per-sprint series was available.
    pub velocity: Option<VelocityTrend>,
    /// Success indicators, if at least one similar project was found.
    pub success: Option<SuccessIndicators>,
}

impl ChronicleAnalysis {
    /// An analysis with no supporting data: every field empty/absent.
    #[must_use]
    pub fn empty() -> Self {
        Self { similar_projects: Vec::new(), velocity: None, success: None }
    }
}

//! Core data model (spec §3): projects, sprints, tasks, episodes, strategies,
//! patterns, decision context, and audit records.

mod audit;
mod chronicle;
mod decision;
mod decision_context;
mod enhanced_decision;
mod episode;
mod pattern;
mod project;
mod sprint;
mod strategy;
mod task;

pub use audit::{AuditRecord, ProposedAdjustment};
pub use chronicle::{ChronicleAnalysis, SimilarProject, SuccessIndicators, TrendDirection, VelocityTrend};
pub use decision::RuleDecision;
pub use decision_context::DecisionContext;
pub use enhanced_decision::{EnhancedDecision, PerformanceMetrics};
pub use episode::{DecisionMode, Episode, EpisodeOutcome};
pub use pattern::{Pattern, PatternSource, PatternType, PatternWeightSplit};
pub use project::{ProjectSnapshot, SprintTaskSummary, TeamAvailability};
pub use sprint::{Sprint, SprintStatus};
pub use strategy::{Strategy, StrategyPerformanceLog};
pub use task::{Task, TaskStatus};

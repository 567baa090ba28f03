//! Ambient configuration for the orchestration core.
//!
//! A single [`Config`] is built once at process startup (typically from a TOML
//! file via [`Config::from_toml_str`]) and handed to every component as a shared,
//! immutable `Arc<Config>` — no mutable globals, per the "cyclic object graphs"
//! note in the design notes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Recognized per-invocation options (spec §6 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationOptions {
    /// Propose a new sprint when none is active.
    pub create_sprint_if_needed: bool,
    /// Forwarded to downstream services; unused by the core itself.
    pub assign_tasks: bool,
    /// Schedule a daily job alongside sprint creation.
    pub create_cronjob: bool,
    /// Cron spec for the scheduled job.
    pub schedule: String,
    /// Default sprint duration in weeks.
    pub sprint_duration_weeks: u32,
    /// Upper bound on auto-assignment per sprint.
    pub max_tasks_per_sprint: u32,
    /// Toggle the hybrid (episode + Chronicle) intelligence path.
    pub enable_pattern_recognition: bool,
}

impl Default for OrchestrationOptions {
    fn default() -> Self {
        Self {
            create_sprint_if_needed: true,
            assign_tasks: true,
            create_cronjob: true,
            schedule: "0 14 * * 1-5".to_string(),
            sprint_duration_weeks: 2,
            max_tasks_per_sprint: 10,
            enable_pattern_recognition: true,
        }
    }
}

/// Circuit breaker configuration, one instance per downstream service client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Error ratio that must be exceeded, within `monitor_window`, to open the circuit.
    pub error_ratio: f64,
    /// Sliding window, in seconds, over which the error ratio is evaluated.
    pub monitor_window_secs: u64,
    /// Cool-down period, in seconds, before a single probe is admitted.
    pub broken_time_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            error_ratio: 0.5,
            monitor_window_secs: 60,
            broken_time_secs: 30,
        }
    }
}

impl CircuitBreakerConfig {
    /// Monitor window as a [`Duration`].
    #[must_use]
    pub fn monitor_window(&self) -> Duration {
        Duration::from_secs(self.monitor_window_secs)
    }

    /// Broken-time cool-down as a [`Duration`].
    #[must_use]
    pub fn broken_time(&self) -> Duration {
        Duration::from_secs(self.broken_time_secs)
    }
}

/// Retry policy configuration shared by every service client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, including the first (spec: at most 3).
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub max_delay_ms: u64,
    /// Per-request timeout.
    pub request_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// Base delay as a [`Duration`].
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Max delay as a [`Duration`].
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Episode Retriever configuration (spec §4.C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Maximum number of cached query results.
    pub cache_capacity: usize,
    /// Cache entry TTL, in seconds.
    pub cache_ttl_secs: u64,
    /// Soft timeout for a retrieval call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            cache_ttl_secs: 300,
            timeout_ms: 3_000,
        }
    }
}

impl RetrieverConfig {
    /// Cache TTL as a [`Duration`].
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Retrieval timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Memory Bridge thresholds (spec §4.C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryBridgeConfig {
    /// Episodes below this similarity are dropped during filtering.
    pub min_similarity_threshold: f64,
    /// Episodes below this recorded/derived quality are dropped.
    pub min_quality: f64,
    /// Minimum episode count required before pattern identification runs.
    pub min_episodes_for_patterns: usize,
}

impl Default for MemoryBridgeConfig {
    fn default() -> Self {
        Self {
            min_similarity_threshold: 0.6,
            min_quality: 0.5,
            min_episodes_for_patterns: 2,
        }
    }
}

/// Pattern Combiner thresholds (spec §4.C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternCombinerConfig {
    /// Base weight assigned to episode-sourced patterns before quality weighting.
    pub episode_weight_base: f64,
    /// Base weight assigned to Chronicle-sourced patterns before quality weighting.
    pub chronicle_weight_base: f64,
    /// Combined patterns below this confidence are discarded.
    pub min_confidence_threshold: f64,
}

impl Default for PatternCombinerConfig {
    fn default() -> Self {
        Self {
            episode_weight_base: 0.4,
            chronicle_weight_base: 0.6,
            min_confidence_threshold: 0.3,
        }
    }
}

/// Decision Modifier thresholds (spec §4.C9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionModifierConfig {
    /// Minimum similarity for a similar project to count as supporting evidence.
    pub min_similarity_for_adjustment_proposal: f64,
    /// Minimum number of similar projects required to propose a task-count adjustment.
    pub min_similar_projects: usize,
    /// Minimum |base - recommended| task-count difference required to propose an adjustment.
    pub task_adjustment_difference_threshold: i64,
    /// Minimum average confidence across supporting projects required to propose.
    pub min_confidence_for_task_proposal: f64,
    /// Minimum velocity-trend confidence required to propose a duration adjustment.
    pub min_velocity_confidence_for_duration_adjustment: f64,
}

impl Default for DecisionModifierConfig {
    fn default() -> Self {
        Self {
            min_similarity_for_adjustment_proposal: 0.7,
            min_similar_projects: 3,
            task_adjustment_difference_threshold: 2,
            min_confidence_for_task_proposal: 0.5,
            min_velocity_confidence_for_duration_adjustment: 0.6,
        }
    }
}

/// Confidence Gate thresholds (spec §4.C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceGateConfig {
    /// Minimum adjustment confidence required to pass the gate.
    pub confidence_threshold: f64,
    /// Minimum supporting-project count required for task-count adjustments.
    pub min_similar_projects: usize,
    /// Maximum allowed fractional change from the original recommendation.
    pub max_adjustment_percent: f64,
}

impl Default for ConfidenceGateConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.75,
            min_similar_projects: 3,
            max_adjustment_percent: 0.5,
        }
    }
}

/// Strategy Evolver thresholds (spec §4.C16).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolverConfig {
    /// Lookback window, in days, for pattern extraction.
    pub pattern_extraction_days: i64,
    /// Minimum occurrences of a context signature to count as a viable pattern.
    pub min_pattern_frequency: usize,
    /// Minimum episode quality to count as "successful" for extraction.
    pub success_quality_floor: f64,
    /// Minimum pattern confidence required to generate a strategy.
    pub min_pattern_confidence: f64,
    /// Performance floor below which a strategy is deactivated.
    pub deactivation_quality_floor: f64,
    /// Retention multiplier for performance logs relative to the analysis window.
    pub cleanup_window_multiplier: i64,
}

impl Default for EvolverConfig {
    fn default() -> Self {
        Self {
            pattern_extraction_days: 30,
            min_pattern_frequency: 3,
            success_quality_floor: 0.7,
            min_pattern_confidence: 0.6,
            deactivation_quality_floor: 0.25,
            cleanup_window_multiplier: 3,
        }
    }
}

/// Performance budgets for one engine invocation (spec §4.C12).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceBudgetConfig {
    /// Total invocation budget, in milliseconds.
    pub total_ms: u64,
    /// Pattern-analysis budget, in milliseconds.
    pub pattern_analysis_ms: u64,
    /// Episode-retrieval budget, in milliseconds.
    pub episode_retrieval_ms: u64,
    /// Memory-bridge budget, in milliseconds.
    pub memory_bridge_ms: u64,
}

impl Default for PerformanceBudgetConfig {
    fn default() -> Self {
        Self {
            total_ms: 3_000,
            pattern_analysis_ms: 1_500,
            episode_retrieval_ms: 500,
            memory_bridge_ms: 300,
        }
    }
}

/// Episode Logger configuration (spec §4.C14).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeLoggerConfig {
    /// Maximum number of episodes queued for background persistence before
    /// the oldest queued entry is dropped.
    pub queue_capacity: usize,
}

impl Default for EpisodeLoggerConfig {
    fn default() -> Self {
        Self { queue_capacity: 500 }
    }
}

/// The embedding vector dimension used across the system.
pub const EMBEDDING_DIMENSION: usize = 1024;

/// Top-level configuration record, passed by shared handle to every component.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Default per-invocation options, overridable per call.
    pub options: OrchestrationOptions,
    /// Circuit breaker configuration (applies to all downstream clients).
    pub circuit_breaker: CircuitBreakerConfig,
    /// Retry policy configuration (applies to all downstream clients).
    pub retry: RetryConfig,
    /// Episode Retriever configuration.
    pub retriever: RetrieverConfig,
    /// Memory Bridge configuration.
    pub memory_bridge: MemoryBridgeConfig,
    /// Pattern Combiner configuration.
    pub pattern_combiner: PatternCombinerConfig,
    /// Decision Modifier configuration.
    pub decision_modifier: DecisionModifierConfig,
    /// Confidence Gate configuration.
    pub confidence_gate: ConfidenceGateConfig,
    /// Strategy Evolver configuration.
    pub evolver: EvolverConfig,
    /// Performance budgets.
    pub performance: PerformanceBudgetConfig,
    /// Episode Logger configuration.
    pub episode_logger: EpisodeLoggerConfig,
    /// Whether learning (episode retrieval + memory bridge) is enabled at all.
    pub learning_enabled: bool,
}

impl Config {
    /// Parse configuration from a TOML document. Missing sections fall back to
    /// their defaults, since every sub-config derives `Default` and is
    /// `#[serde(default)]`.
    pub fn from_toml_str(input: &str) -> crate::error::Result<Self> {
        toml::from_str(input)
            .map_err(|e| crate::error::Error::Configuration(format!("invalid config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = Config {
            learning_enabled: true,
            ..Config::default()
        };
        let text = toml::to_string(&cfg).expect("serialize");
        let parsed = Config::from_toml_str(&text).expect("parse");
        assert_eq!(parsed.options.max_tasks_per_sprint, 10);
        assert!(parsed.learning_enabled);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed = Config::from_toml_str("[options]\nmax_tasks_per_sprint = 7\n")
            .expect("parse partial config");
        assert_eq!(parsed.options.max_tasks_per_sprint, 7);
        assert_eq!(parsed.confidence_gate.confidence_threshold, 0.75);
    }
}

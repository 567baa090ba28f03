//! Enhanced Decision Engine (spec §4.C12): orchestrates one tick end to end,
//! fusing the deterministic rule-based decision with episode and Chronicle
//! intelligence, gated by confidence, and budgeted against wall-clock limits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::warn;
use uuid::Uuid;

use crate::action_executor::{ActionExecutor, ActionOutcome};
use crate::chronicle_analyzer::ChronicleAnalyzer;
use crate::clients::control_plane::cronjob_name;
use crate::clients::ControlPlaneClient;
use crate::config::{Config, OrchestrationOptions};
use crate::confidence_gate::ConfidenceGate;
use crate::decision_auditor::DecisionAuditor;
use crate::decision_modifier;
use crate::embeddings::EmbeddingProvider;
use crate::episode_logger::{self, EpisodeLogger};
use crate::memory_bridge::MemoryBridge;
use crate::pattern_combiner::PatternCombiner;
use crate::retrieval::EpisodeRetriever;
use crate::rule_decision;
use crate::types::{
    AuditRecord, DecisionContext, DecisionMode, EnhancedDecision, Pattern, PatternType,
    PerformanceMetrics, ProjectSnapshot, ProposedAdjustment,
};

/// Collaborators the engine orchestrates across one tick.
pub struct EnhancedDecisionEngine {
    config: Arc<Config>,
    retriever: Arc<EpisodeRetriever>,
    memory_bridge: MemoryBridge,
    chronicle_analyzer: Arc<ChronicleAnalyzer>,
    pattern_combiner: PatternCombiner,
    confidence_gate: ConfidenceGate,
    control_plane: Arc<dyn ControlPlaneClient>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    action_executor: Arc<ActionExecutor>,
    episode_logger: Arc<EpisodeLogger>,
    decision_auditor: Arc<DecisionAuditor>,
}

/// Everything one orchestration tick produced: the composed decision, the
/// outcome of applying it (spec §4.C13), and the audit record persisted for
/// it (spec §4.C15). Episode logging (spec §4.C14) happens inline too, but
/// is enqueued rather than awaited to completion.
#[derive(Debug, Clone)]
pub struct TickResult {
    /// The composed decision for this tick.
    pub decision: EnhancedDecision,
    /// Outcome of each action the executor attempted.
    pub action_outcomes: Vec<ActionOutcome>,
    /// The audit record persisted to Chronicle for this tick.
    pub audit: AuditRecord,
}

fn perception_summary(snapshot: &ProjectSnapshot) -> String {
    format!(
        "project={} backlog={} unassigned={} active_sprints={} team={}",
        snapshot.project_id,
        snapshot.backlog_task_count,
        snapshot.unassigned_tasks,
        snapshot.active_sprint_count,
        snapshot.team_size
    )
}

fn pattern_to_adjustment(pattern: &Pattern) -> ProposedAdjustment {
    let kind = match pattern.pattern_type {
        PatternType::TaskCount => "task_count",
        PatternType::SprintDuration => "sprint_duration",
    };
    ProposedAdjustment {
        kind: kind.to_string(),
        recommended_value: serde_json::json!(pattern.rounded_value()),
        confidence: pattern.confidence,
        rationale: format!(
            "hybrid pattern ({:?} source, {} evidence) recommends {}",
            pattern.source, pattern.evidence_count, pattern.rounded_value()
        ),
        expected_improvement: None,
        evidence_details: format!("similar_project_count={}", pattern.evidence_count),
    }
}

impl EnhancedDecisionEngine {
    /// Builds an engine from its collaborators and shared configuration.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        retriever: Arc<EpisodeRetriever>,
        chronicle_analyzer: Arc<ChronicleAnalyzer>,
        control_plane: Arc<dyn ControlPlaneClient>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        action_executor: Arc<ActionExecutor>,
        episode_logger: Arc<EpisodeLogger>,
        decision_auditor: Arc<DecisionAuditor>,
    ) -> Self {
        Self {
            memory_bridge: MemoryBridge::new(config.memory_bridge.clone()),
            pattern_combiner: PatternCombiner::new(config.pattern_combiner.clone()),
            confidence_gate: ConfidenceGate::new(config.confidence_gate.clone()),
            retriever,
            chronicle_analyzer,
            control_plane,
            embedding_provider,
            action_executor,
            episode_logger,
            decision_auditor,
            config,
        }
    }

    async fn cronjob_exists(&self, snapshot: &ProjectSnapshot) -> bool {
        let Some(active_sprint_id) = &snapshot.active_sprint_id else { return false };
        let name = cronjob_name(&snapshot.project_id, active_sprint_id);
        match self.control_plane.cronjob_exists(&name).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(error = %err, name, "could not check cronjob existence, assuming missing");
                false
            }
        }
    }

    async fn gather_episode_context(
        &self,
        snapshot: &ProjectSnapshot,
    ) -> (Option<DecisionContext>, std::time::Duration, std::time::Duration) {
        let started = Instant::now();
        let context_text = perception_summary(snapshot);
        let query_vector = match self.embedding_provider.embed(&context_text).await {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "embedding unavailable, skipping episode retrieval");
                return (None, started.elapsed(), std::time::Duration::ZERO);
            }
        };
        let retrieved = self
            .retriever
            .retrieve(&query_vector, &context_text, Some(snapshot.project_id.as_str()), 10, None, 0.0)
            .await;
        let retrieval_elapsed = started.elapsed();

        let bridge_started = Instant::now();
        let context = self.memory_bridge.build_context(&retrieved);
        let bridge_elapsed = bridge_started.elapsed();

        (if context.is_empty() { None } else { Some(context) }, retrieval_elapsed, bridge_elapsed)
    }

    /// Runs one orchestration tick.
    pub async fn orchestrate(&self, snapshot: &ProjectSnapshot, options: &OrchestrationOptions) -> EnhancedDecision {
        let tick_started = Instant::now();
        let mut reasoning_chain = Vec::new();
        let mut confidence_scores = HashMap::new();
        let mut warnings = Vec::new();

        let (episode_context, episode_retrieval_elapsed, memory_bridge_elapsed) =
            if self.config.learning_enabled && options.enable_pattern_recognition {
                self.gather_episode_context(snapshot).await
            } else {
                (None, std::time::Duration::ZERO, std::time::Duration::ZERO)
            };

        let cronjob_exists = self.cronjob_exists(snapshot).await;
        let base = rule_decision::make_decision(snapshot, options, cronjob_exists);
        reasoning_chain.push(base.reasoning.clone());
        warnings.extend(base.warnings.clone());
        confidence_scores.insert("base".to_string(), 1.0);

        let pattern_analysis_started = Instant::now();
        let chronicle_analysis = self.chronicle_analyzer.analyze(&snapshot.project_id).await;
        let combined = episode_context
            .as_ref()
            .map(|ctx| self.pattern_combiner.combine(Some(ctx), &chronicle_analysis));
        let pattern_analysis_elapsed = pattern_analysis_started.elapsed();

        let hybrid_evidence_used = combined.as_ref().is_some_and(|c| !c.patterns.is_empty());
        let mut candidate_adjustments: Vec<ProposedAdjustment> = Vec::new();
        let mut patterns_considered = Vec::new();

        if let Some(combined) = &combined {
            patterns_considered.extend(combined.patterns.iter().cloned());
            for pattern in &combined.patterns {
                let differs = match pattern.pattern_type {
                    PatternType::TaskCount => {
                        (pattern.rounded_value() - i64::from(base.tasks_to_assign)).abs() > 1
                    }
                    PatternType::SprintDuration => {
                        pattern.rounded_value() != i64::from(base.sprint_duration_weeks)
                    }
                };
                if differs {
                    candidate_adjustments.push(pattern_to_adjustment(pattern));
                }
            }
        }
        if candidate_adjustments.is_empty() {
            candidate_adjustments = decision_modifier::propose_adjustments(
                base.tasks_to_assign,
                base.sprint_duration_weeks,
                &chronicle_analysis.similar_projects,
                chronicle_analysis.velocity.as_ref(),
                &self.config.decision_modifier,
            );
        }

        let mut tasks_to_assign = base.tasks_to_assign;
        let mut sprint_duration_weeks = base.sprint_duration_weeks;
        let mut modifications_applied = 0;
        let mut applied_adjustments = serde_json::Map::new();

        let mut ordered = candidate_adjustments;
        ordered.sort_by_key(|a| if a.kind == "task_count" { 0 } else { 1 });

        for adjustment in &ordered {
            let original_value = if adjustment.kind == "task_count" {
                f64::from(tasks_to_assign)
            } else {
                f64::from(sprint_duration_weeks)
            };
            let gate_decision = self.confidence_gate.evaluate(adjustment, original_value);
            if !gate_decision.approved {
                reasoning_chain.push(format!(
                    "rejected {} adjustment: {}",
                    adjustment.kind,
                    gate_decision.failures.join(", ")
                ));
                continue;
            }

            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            if let Some(value) = adjustment.recommended_value.as_f64() {
                let rounded = value.round().max(0.0) as u32;
                if adjustment.kind == "task_count" {
                    tasks_to_assign = rounded;
                } else {
                    sprint_duration_weeks = rounded;
                }
                modifications_applied += 1;
                confidence_scores.insert(adjustment.kind.clone(), adjustment.confidence);
                applied_adjustments.insert(adjustment.kind.clone(), adjustment.recommended_value.clone());
                reasoning_chain.push(format!("applied {} adjustment: {}", adjustment.kind, adjustment.rationale));
            }
        }

        let decision_mode =
            if modifications_applied > 0 { DecisionMode::IntelligenceEnhanced } else { DecisionMode::RuleBasedOnly };

        let total_elapsed = tick_started.elapsed();
        let budget = &self.config.performance;
        let performance = PerformanceMetrics {
            #[allow(clippy::cast_possible_truncation)]
            total_ms: total_elapsed.as_millis() as u64,
            #[allow(clippy::cast_possible_truncation)]
            pattern_analysis_ms: pattern_analysis_elapsed.as_millis() as u64,
            #[allow(clippy::cast_possible_truncation)]
            episode_retrieval_ms: episode_retrieval_elapsed.as_millis() as u64,
            #[allow(clippy::cast_possible_truncation)]
            memory_bridge_ms: memory_bridge_elapsed.as_millis() as u64,
            total_over_budget: total_elapsed.as_millis() as u64 > budget.total_ms,
            pattern_analysis_over_budget: pattern_analysis_elapsed.as_millis() as u64 > budget.pattern_analysis_ms,
            episode_retrieval_over_budget: episode_retrieval_elapsed.as_millis() as u64 > budget.episode_retrieval_ms,
            memory_bridge_over_budget: memory_bridge_elapsed.as_millis() as u64 > budget.memory_bridge_ms,
        };
        if performance.total_over_budget {
            warnings.push("total tick duration exceeded performance budget".to_string());
        }

        EnhancedDecision {
            project_id: snapshot.project_id.clone(),
            sprint_id: base.sprint_id.clone(),
            tasks_to_assign,
            sprint_duration_weeks,
            modifications_applied,
            decision_mode,
            reasoning_chain,
            confidence_scores,
            patterns_considered,
            hybrid_evidence_used,
            warnings,
            performance,
            proposed_adjustments: ordered,
            applied_adjustments: serde_json::Value::Object(applied_adjustments),
            base,
        }
    }

    /// Runs one full tick: composes a decision, applies it (spec §4.C13),
    /// enqueues its episode for background logging (spec §4.C14), and
    /// persists its audit record (spec §4.C15).
    pub async fn run(&self, snapshot: &ProjectSnapshot, options: &OrchestrationOptions, correlation_id: Uuid) -> TickResult {
        let decision = self.orchestrate(snapshot, options).await;
        let action_outcomes = self.action_executor.execute(snapshot, &decision, options).await;

        self.episode_logger.enqueue(episode_logger::build_episode(snapshot, &decision));

        let audit = DecisionAuditor::build_record(&decision, correlation_id);
        self.decision_auditor.record(&audit).await;

        TickResult { decision, action_outcomes, audit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::control_plane::CronJobManifest;
    use crate::clients::sprint::CreateSprintRequest;
    use crate::clients::{BacklogClient, SprintClient};
    use crate::config::Config;
    use crate::embeddings::DeterministicEmbeddingProvider;
    use crate::error::Result;
    use crate::events::InMemoryEventStream;
    use crate::store::InMemoryChronicleStore;
    use crate::types::{Sprint, SprintTaskSummary, TeamAvailability};
    use async_trait::async_trait;

    struct StubControlPlane {
        exists: bool,
    }

    #[async_trait]
    impl ControlPlaneClient for StubControlPlane {
        async fn cronjob_exists(&self, _name: &str) -> Result<bool> {
            Ok(self.exists)
        }
        async fn create_cronjob(&self, manifest: CronJobManifest) -> Result<String> {
            Ok(manifest.name)
        }
        async fn delete_cronjob(&self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    struct StubSprintClient;

    #[async_trait]
    impl SprintClient for StubSprintClient {
        async fn create_sprint(&self, _project_id: &str, request: CreateSprintRequest) -> Result<String> {
            Ok(request.sprint_name)
        }
        async fn close_sprint(&self, _project_id: &str, _sprint_id: &str) -> Result<()> {
            Ok(())
        }
        async fn get_sprint(&self, _project_id: &str, _sprint_id: &str) -> Result<Option<Sprint>> {
            Ok(None)
        }
    }

    struct StubBacklog;

    #[async_trait]
    impl BacklogClient for StubBacklog {
        async fn assign_tasks(&self, request: crate::clients::AssignTasksRequest) -> Result<u32> {
            Ok(request.count)
        }
    }

    fn snapshot() -> ProjectSnapshot {
        ProjectSnapshot {
            project_id: "P1".to_string(),
            backlog_task_count: 10,
            unassigned_tasks: 6,
            active_sprint_count: 0,
            team_size: 4,
            team_availability: TeamAvailability { status: "ok".to_string(), conflicts: vec![] },
            active_sprint_id: None,
            sprint_task_summary: None,
        }
    }

    fn engine() -> EnhancedDecisionEngine {
        let config = Arc::new(Config { learning_enabled: true, ..Config::default() });
        let episode_store = Arc::new(crate::store::InMemoryEpisodeStore::default());
        let retriever = Arc::new(EpisodeRetriever::new(episode_store.clone(), config.retriever.clone()));
        let chronicle_store = Arc::new(InMemoryChronicleStore::default());
        let chronicle_analyzer = Arc::new(ChronicleAnalyzer::new(chronicle_store.clone(), config.circuit_breaker.clone()));
        let control_plane: Arc<dyn ControlPlaneClient> = Arc::new(StubControlPlane { exists: false });
        let embedding_provider = Arc::new(DeterministicEmbeddingProvider);

        let action_executor = Arc::new(crate::action_executor::ActionExecutor::new(
            Arc::new(StubSprintClient),
            control_plane.clone(),
            Arc::new(StubBacklog),
            chronicle_store.clone(),
            Arc::new(InMemoryEventStream::default()),
        ));
        let episode_logger =
            Arc::new(EpisodeLogger::spawn(episode_store, Arc::new(DeterministicEmbeddingProvider), config.episode_logger.queue_capacity));
        let decision_auditor = Arc::new(DecisionAuditor::new(chronicle_store));

        EnhancedDecisionEngine::new(
            config,
            retriever,
            chronicle_analyzer,
            control_plane,
            embedding_provider,
            action_executor,
            episode_logger,
            decision_auditor,
        )
    }

    #[tokio::test]
    async fn orchestrates_sprint_creation_with_no_historical_evidence() {
        let engine = engine();
        let decision = engine.orchestrate(&snapshot(), &OrchestrationOptions::default()).await;
        assert!(decision.base.sprint_created);
        assert_eq!(decision.tasks_to_assign, 6);
        assert_eq!(decision.modifications_applied, 0);
        assert_eq!(decision.decision_mode, DecisionMode::RuleBasedOnly);
    }

    #[tokio::test]
    async fn flags_sprint_closure_when_pending_is_zero() {
        let mut snap = snapshot();
        snap.active_sprint_id = Some("P1-S01".to_string());
        snap.sprint_task_summary = Some(SprintTaskSummary { pending_tasks: 0, completed_tasks: 5 });
        let engine = engine();
        let decision = engine.orchestrate(&snap, &OrchestrationOptions::default()).await;
        assert!(decision.base.sprint_closure_triggered);
    }

    #[tokio::test]
    async fn run_applies_actions_and_persists_an_audit_record() {
        let engine = engine();
        let result = engine.run(&snapshot(), &OrchestrationOptions::default(), Uuid::new_v4()).await;

        assert!(result.decision.base.sprint_created);
        assert!(result.action_outcomes.iter().any(|o| o.action == "create_sprint"));
        assert_eq!(result.audit.project_id, "P1");
        assert_eq!(result.audit.sprint_id, result.decision.sprint_id);
    }
}

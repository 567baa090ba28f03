//! Action Executor (spec §4.C13): applies a composed decision to the world.
//! Each action is attempted independently and recorded as succeeded or
//! failed; one failed action never aborts the remaining ones.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clients::backlog::AssignTasksRequest;
use crate::clients::control_plane::CronJobManifest;
use crate::clients::sprint::CreateSprintRequest;
use crate::clients::{BacklogClient, ControlPlaneClient, SprintClient};
use crate::config::OrchestrationOptions;
use crate::events::{EventStream, OrchestrationEvent};
use crate::store::{ChronicleNote, ChronicleStore};
use crate::types::{EnhancedDecision, ProjectSnapshot, RuleDecision};

/// One action attempted this tick, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Action name, e.g. `"close_sprint"`, `"create_cronjob"`.
    pub action: String,
    /// Whether the action succeeded.
    pub succeeded: bool,
    /// On success, the resulting id or count; on failure, the error message.
    pub detail: String,
}

impl ActionOutcome {
    fn ok(action: &str, detail: impl Into<String>) -> Self {
        Self { action: action.to_string(), succeeded: true, detail: detail.into() }
    }

    fn failed(action: &str, err: impl std::fmt::Display) -> Self {
        warn!(action, error = %err, "action failed, continuing with remaining actions");
        Self { action: action.to_string(), succeeded: false, detail: err.to_string() }
    }
}

/// Applies one [`EnhancedDecision`] against the downstream services.
pub struct ActionExecutor {
    sprint: Arc<dyn SprintClient>,
    control_plane: Arc<dyn ControlPlaneClient>,
    backlog: Arc<dyn BacklogClient>,
    chronicle: Arc<dyn ChronicleStore>,
    events: Arc<dyn EventStream>,
}

impl ActionExecutor {
    /// Builds an executor from its downstream collaborators.
    #[must_use]
    pub fn new(
        sprint: Arc<dyn SprintClient>,
        control_plane: Arc<dyn ControlPlaneClient>,
        backlog: Arc<dyn BacklogClient>,
        chronicle: Arc<dyn ChronicleStore>,
        events: Arc<dyn EventStream>,
    ) -> Self {
        Self { sprint, control_plane, backlog, chronicle, events }
    }

    /// Applies `decision`'s actions in the fixed order the original
    /// application used: CronJob delete before sprint close, sprint create
    /// before CronJob create.
    pub async fn execute(
        &self,
        snapshot: &ProjectSnapshot,
        decision: &EnhancedDecision,
        options: &OrchestrationOptions,
    ) -> Vec<ActionOutcome> {
        let base = &decision.base;
        let mut outcomes = Vec::new();

        if base.sprint_closure_triggered {
            self.close_sprint(snapshot, base, &mut outcomes).await;
        } else if base.sprint_created {
            self.create_sprint(snapshot, decision, options, &mut outcomes).await;
        } else if base.cronjob_created {
            self.create_cronjob(base, &options.schedule, &mut outcomes).await;
        }

        self.record_daily_scrum_report(snapshot, decision, &mut outcomes).await;
        self.publish_event(snapshot, decision).await;

        outcomes
    }

    async fn close_sprint(&self, snapshot: &ProjectSnapshot, base: &RuleDecision, outcomes: &mut Vec<ActionOutcome>) {
        let Some(sprint_id) = &base.sprint_id_to_close else { return };

        if base.cronjob_deleted {
            if let Some(name) = &base.cronjob_name {
                match self.control_plane.delete_cronjob(name).await {
                    Ok(()) => outcomes.push(ActionOutcome::ok("delete_cronjob", name.clone())),
                    Err(err) => outcomes.push(ActionOutcome::failed("delete_cronjob", err)),
                }
            }
        }

        match self.sprint.close_sprint(&snapshot.project_id, sprint_id).await {
            Ok(()) => {
                outcomes.push(ActionOutcome::ok("close_sprint", sprint_id.clone()));
                self.record_retrospective(snapshot, sprint_id, outcomes).await;
            }
            Err(err) => outcomes.push(ActionOutcome::failed("close_sprint", err)),
        }
    }

    async fn record_retrospective(&self, snapshot: &ProjectSnapshot, sprint_id: &str, outcomes: &mut Vec<ActionOutcome>) {
        let note = ChronicleNote {
            event_type: "retrospective".to_string(),
            project_id: snapshot.project_id.clone(),
            payload: serde_json::json!({ "sprint_id": sprint_id }),
        };
        match self.chronicle.record_note(note).await {
            Ok(_) => outcomes.push(ActionOutcome::ok("record_retrospective", sprint_id.to_string())),
            Err(err) => outcomes.push(ActionOutcome::failed("record_retrospective", err)),
        }
    }

    async fn create_sprint(
        &self,
        snapshot: &ProjectSnapshot,
        decision: &EnhancedDecision,
        options: &OrchestrationOptions,
        outcomes: &mut Vec<ActionOutcome>,
    ) {
        let Some(sprint_name) = decision.base.sprint_name.clone() else { return };
        let request = CreateSprintRequest { sprint_name, duration_weeks: decision.sprint_duration_weeks };
        let sprint_id = match self.sprint.create_sprint(&snapshot.project_id, request).await {
            Ok(id) => {
                outcomes.push(ActionOutcome::ok("create_sprint", id.clone()));
                id
            }
            Err(err) => {
                outcomes.push(ActionOutcome::failed("create_sprint", err));
                return;
            }
        };

        if options.assign_tasks && decision.tasks_to_assign > 0 {
            let request = AssignTasksRequest {
                project_id: snapshot.project_id.clone(),
                sprint_id: sprint_id.clone(),
                count: decision.tasks_to_assign,
            };
            match self.backlog.assign_tasks(request).await {
                Ok(assigned) => outcomes.push(ActionOutcome::ok("assign_tasks", assigned.to_string())),
                Err(err) => outcomes.push(ActionOutcome::failed("assign_tasks", err)),
            }
        }

        if decision.base.cronjob_created {
            self.create_cronjob(&decision.base, &options.schedule, outcomes).await;
        }
    }

    async fn create_cronjob(&self, base: &RuleDecision, schedule: &str, outcomes: &mut Vec<ActionOutcome>) {
        let (Some(name), Some(sprint_id)) = (&base.cronjob_name, &base.sprint_id) else { return };
        let manifest = CronJobManifest { name: name.clone(), schedule: schedule.to_string(), sprint_id: sprint_id.clone() };
        match self.control_plane.create_cronjob(manifest).await {
            Ok(created_name) => outcomes.push(ActionOutcome::ok("create_cronjob", created_name)),
            Err(err) => outcomes.push(ActionOutcome::failed("create_cronjob", err)),
        }
    }

    async fn record_daily_scrum_report(&self, snapshot: &ProjectSnapshot, decision: &EnhancedDecision, outcomes: &mut Vec<ActionOutcome>) {
        let note = ChronicleNote {
            event_type: "daily_scrum_report".to_string(),
            project_id: snapshot.project_id.clone(),
            payload: serde_json::json!({
                "sprint_id": decision.sprint_id,
                "tasks_to_assign": decision.tasks_to_assign,
                "decision_mode": decision.decision_mode,
                "reasoning_chain": decision.reasoning_chain,
            }),
        };
        match self.chronicle.record_note(note).await {
            Ok(_) => outcomes.push(ActionOutcome::ok("record_daily_scrum_report", snapshot.project_id.clone())),
            Err(err) => outcomes.push(ActionOutcome::failed("record_daily_scrum_report", err)),
        }
    }

    async fn publish_event(&self, snapshot: &ProjectSnapshot, decision: &EnhancedDecision) {
        let event = if decision.base.sprint_created {
            OrchestrationEvent::SprintStarted {
                project_id: snapshot.project_id.clone(),
                sprint_id: decision.sprint_id.clone().unwrap_or_default(),
                tasks_assigned: decision.tasks_to_assign,
            }
        } else {
            OrchestrationEvent::DailyScrumReport {
                project_id: snapshot.project_id.clone(),
                sprint_id: decision.sprint_id.clone().unwrap_or_default(),
                payload: serde_json::json!({ "decision_mode": decision.decision_mode }),
            }
        };
        if let Err(err) = self.events.publish(event).await {
            warn!(error = %err, "failed to publish orchestration event, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::events::InMemoryEventStream;
    use crate::store::InMemoryChronicleStore;
    use crate::types::{DecisionMode, PerformanceMetrics, Sprint, TeamAvailability};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubSprintClient {
        created: AtomicU32,
        closed: AtomicU32,
    }

    #[async_trait]
    impl SprintClient for StubSprintClient {
        async fn create_sprint(&self, _project_id: &str, request: CreateSprintRequest) -> Result<String> {
            self.created.fetch_add(1, Ordering::Relaxed);
            Ok(request.sprint_name)
        }
        async fn close_sprint(&self, _project_id: &str, _sprint_id: &str) -> Result<()> {
            self.closed.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
        async fn get_sprint(&self, _project_id: &str, _sprint_id: &str) -> Result<Option<Sprint>> {
            Ok(None)
        }
    }

    struct StubControlPlane;

    #[async_trait]
    impl ControlPlaneClient for StubControlPlane {
        async fn cronjob_exists(&self, _name: &str) -> Result<bool> {
            Ok(false)
        }
        async fn create_cronjob(&self, manifest: CronJobManifest) -> Result<String> {
            Ok(manifest.name)
        }
        async fn delete_cronjob(&self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    struct StubBacklog;

    #[async_trait]
    impl BacklogClient for StubBacklog {
        async fn assign_tasks(&self, request: AssignTasksRequest) -> Result<u32> {
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

    fn decision(base: RuleDecision) -> EnhancedDecision {
        EnhancedDecision {
            project_id: "P1".to_string(),
            sprint_id: base.sprint_id.clone(),
            tasks_to_assign: base.tasks_to_assign,
            sprint_duration_weeks: base.sprint_duration_weeks,
            modifications_applied: 0,
            decision_mode: DecisionMode::RuleBasedOnly,
            reasoning_chain: vec!["created new sprint".to_string()],
            confidence_scores: Default::default(),
            patterns_considered: Vec::new(),
            hybrid_evidence_used: false,
            warnings: Vec::new(),
            performance: PerformanceMetrics::default(),
            proposed_adjustments: Vec::new(),
            applied_adjustments: serde_json::Value::Object(Default::default()),
            base,
        }
    }

    #[tokio::test]
    async fn creating_a_sprint_also_assigns_tasks_and_creates_a_cronjob() {
        let executor = ActionExecutor::new(
            Arc::new(StubSprintClient { created: AtomicU32::new(0), closed: AtomicU32::new(0) }),
            Arc::new(StubControlPlane),
            Arc::new(StubBacklog),
            Arc::new(InMemoryChronicleStore::default()),
            Arc::new(InMemoryEventStream::default()),
        );

        let base = RuleDecision {
            sprint_created: true,
            sprint_id: Some("P1-S01".to_string()),
            sprint_name: Some("P1-S01".to_string()),
            cronjob_created: true,
            cronjob_name: Some("run-dailyscrum-p1-p1-s01".to_string()),
            tasks_to_assign: 6,
            sprint_duration_weeks: 2,
            ..RuleDecision::default()
        };
        let outcomes = executor.execute(&snapshot(), &decision(base), &OrchestrationOptions::default()).await;

        let names: Vec<&str> = outcomes.iter().map(|o| o.action.as_str()).collect();
        assert!(names.contains(&"create_sprint"));
        assert!(names.contains(&"assign_tasks"));
        assert!(names.contains(&"create_cronjob"));
        assert!(outcomes.iter().all(|o| o.succeeded));
    }

    #[tokio::test]
    async fn closing_a_sprint_deletes_its_cronjob_first() {
        let executor = ActionExecutor::new(
            Arc::new(StubSprintClient { created: AtomicU32::new(0), closed: AtomicU32::new(0) }),
            Arc::new(StubControlPlane),
            Arc::new(StubBacklog),
            Arc::new(InMemoryChronicleStore::default()),
            Arc::new(InMemoryEventStream::default()),
        );

        let base = RuleDecision {
            sprint_closure_triggered: true,
            sprint_id_to_close: Some("P1-S01".to_string()),
            cronjob_deleted: true,
            cronjob_name: Some("run-dailyscrum-p1-p1-s01".to_string()),
            ..RuleDecision::default()
        };
        let outcomes = executor.execute(&snapshot(), &decision(base), &OrchestrationOptions::default()).await;

        let delete_index = outcomes.iter().position(|o| o.action == "delete_cronjob").unwrap();
        let close_index = outcomes.iter().position(|o| o.action == "close_sprint").unwrap();
        assert!(delete_index < close_index, "cronjob delete must precede sprint close");
    }
}

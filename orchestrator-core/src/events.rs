//! Event stream (spec §6): a tagged envelope published for each notable
//! outcome, plus a narrow trait abstracting the backing transport so a
//! Redis-streams implementation can be swapped in without this crate
//! depending on a Redis client directly.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

/// Tagged event published onto the orchestration event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum OrchestrationEvent {
    /// A new sprint was created and started.
    SprintStarted {
        /// Project the sprint belongs to.
        project_id: String,
        /// Newly created sprint id.
        sprint_id: String,
        /// Task count assigned at creation time.
        tasks_assigned: u32,
    },
    /// A task's status or progress changed.
    TaskUpdated {
        /// Project the task belongs to.
        project_id: String,
        /// Task id.
        task_id: String,
        /// New status, as a string tag.
        status: String,
    },
    /// Full provenance of one orchestration decision, mirroring the
    /// persisted `AuditRecord` (spec §4.C15).
    OrchestrationDecisionAudit {
        /// Project the decision concerned.
        project_id: String,
        /// Id of the audit record this event mirrors.
        audit_id: Uuid,
        /// Decision mode tag (`"rule_based_only"` / `"intelligence_enhanced"`).
        decision_mode: String,
    },
    /// A daily scrum summary for the active sprint.
    DailyScrumReport {
        /// Project the sprint belongs to.
        project_id: String,
        /// Sprint the report concerns.
        sprint_id: String,
        /// Opaque structured report payload.
        payload: Value,
    },
}

/// One envelope as read back from the stream, with transport-assigned metadata.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    /// Transport-assigned message id, unique within the stream.
    pub id: String,
    /// The decoded event.
    pub event: OrchestrationEvent,
    /// When the event was published.
    pub published_at: DateTime<Utc>,
}

/// Narrow append/read-group/ack interface over the orchestration event stream.
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Appends an event, returning its assigned message id.
    async fn publish(&self, event: OrchestrationEvent) -> Result<String>;

    /// Reads up to `count` messages not yet delivered to or acked by
    /// `consumer_group`.
    async fn read_group(&self, consumer_group: &str, count: usize) -> Result<Vec<StreamMessage>>;

    /// Acknowledges a message for `consumer_group`, removing it from that
    /// group's pending-entries list.
    async fn ack(&self, consumer_group: &str, message_id: &str) -> Result<()>;
}

#[derive(Default)]
struct GroupState {
    /// Delivered to this group, not yet acked.
    pending: HashSet<String>,
    /// Acked by this group; never redelivered.
    acked: HashSet<String>,
}

/// In-memory [`EventStream`]: backs tests and the CLI's `--ephemeral` mode.
/// Redelivery on ack timeout is not modeled — a message stays pending for a
/// group until explicitly acked.
#[derive(Default)]
pub struct InMemoryEventStream {
    messages: Mutex<Vec<StreamMessage>>,
    groups: Mutex<HashMap<String, GroupState>>,
    next_id: AtomicU64,
}

#[async_trait]
impl EventStream for InMemoryEventStream {
    async fn publish(&self, event: OrchestrationEvent) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.messages.lock().push(StreamMessage { id: id.clone(), event, published_at: Utc::now() });
        Ok(id)
    }

    async fn read_group(&self, consumer_group: &str, count: usize) -> Result<Vec<StreamMessage>> {
        let messages = self.messages.lock();
        let mut groups = self.groups.lock();
        let state = groups.entry(consumer_group.to_string()).or_default();

        let mut delivered = Vec::new();
        for message in messages.iter() {
            if delivered.len() >= count {
                break;
            }
            if state.pending.contains(&message.id) || state.acked.contains(&message.id) {
                continue;
            }
            state.pending.insert(message.id.clone());
            delivered.push(message.clone());
        }
        Ok(delivered)
    }

    async fn ack(&self, consumer_group: &str, message_id: &str) -> Result<()> {
        let mut groups = self.groups.lock();
        let state = groups.entry(consumer_group.to_string()).or_default();
        state.pending.remove(message_id);
        state.acked.insert(message_id.to_string());
        Ok(())
    }
}

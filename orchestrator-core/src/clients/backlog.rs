//! Backlog service client: task assignment (spec §4.C1, §6 `assign_tasks` option).

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use crate::error::Result;

use super::facade::ServiceClient;

/// Request to assign a batch of unassigned tasks to a sprint.
#[derive(Debug, Serialize)]
pub struct AssignTasksRequest {
    /// Project the tasks belong to.
    pub project_id: String,
    /// Sprint to assign into.
    pub sprint_id: String,
    /// Number of unassigned tasks to pull into the sprint.
    pub count: u32,
}

/// Narrow interface to the Backlog service.
#[async_trait]
pub trait BacklogClient: Send + Sync {
    /// Assigns up to `count` unassigned tasks to a sprint, returning the number
    /// actually assigned (may be fewer than requested if the backlog shrank).
    async fn assign_tasks(&self, request: AssignTasksRequest) -> Result<u32>;
}

/// HTTP-backed [`BacklogClient`].
pub struct HttpBacklogClient {
    client: ServiceClient,
}

impl HttpBacklogClient {
    /// Wraps an already-configured [`ServiceClient`].
    #[must_use]
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, serde::Deserialize)]
struct AssignTasksResponse {
    assigned: u32,
}

#[async_trait]
impl BacklogClient for HttpBacklogClient {
    async fn assign_tasks(&self, request: AssignTasksRequest) -> Result<u32> {
        let requested = request.count;
        let response: Option<AssignTasksResponse> =
            self.client.request_json(Method::POST, "/tasks/assign", Some(&request)).await?;
        Ok(response.map_or(requested, |r| r.assigned))
    }
}

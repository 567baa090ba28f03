//! Sprint service client (spec §4.C1, §4.C13).

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Sprint;

use super::facade::ServiceClient;

/// Request body for creating a sprint.
#[derive(Debug, Serialize)]
pub struct CreateSprintRequest {
    /// Proposed sprint name/id.
    pub sprint_name: String,
    /// Sprint duration, in weeks.
    pub duration_weeks: u32,
}

#[derive(Debug, Deserialize)]
struct CreateSprintResponse {
    sprint_id: String,
}

/// Narrow interface to the Sprint CRUD service.
#[async_trait]
pub trait SprintClient: Send + Sync {
    /// Creates a sprint, returning its assigned id.
    async fn create_sprint(&self, project_id: &str, request: CreateSprintRequest) -> Result<String>;

    /// Closes a sprint.
    async fn close_sprint(&self, project_id: &str, sprint_id: &str) -> Result<()>;

    /// Fetches a sprint by id, `None` if it does not exist.
    async fn get_sprint(&self, project_id: &str, sprint_id: &str) -> Result<Option<Sprint>>;
}

/// HTTP-backed [`SprintClient`].
pub struct HttpSprintClient {
    client: ServiceClient,
}

impl HttpSprintClient {
    /// Wraps an already-configured [`ServiceClient`].
    #[must_use]
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SprintClient for HttpSprintClient {
    async fn create_sprint(&self, project_id: &str, request: CreateSprintRequest) -> Result<String> {
        let path = format!("/projects/{project_id}/sprints");
        let response: Option<CreateSprintResponse> =
            self.client.request_json(Method::POST, &path, Some(&request)).await?;
        Ok(response.map(|r| r.sprint_id).unwrap_or(request.sprint_name))
    }

    async fn close_sprint(&self, project_id: &str, sprint_id: &str) -> Result<()> {
        let path = format!("/projects/{project_id}/sprints/{sprint_id}/close");
        let _: Option<serde_json::Value> =
            self.client.request_json::<(), _>(Method::POST, &path, None).await?;
        Ok(())
    }

    async fn get_sprint(&self, project_id: &str, sprint_id: &str) -> Result<Option<Sprint>> {
        let path = format!("/projects/{project_id}/sprints/{sprint_id}");
        self.client.request_json::<(), _>(Method::GET, &path, None).await
    }
}

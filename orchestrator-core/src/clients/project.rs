//! Project service client: perception snapshots (spec §4.C1, §4.C12 step 1).

use async_trait::async_trait;
use reqwest::Method;

use crate::error::Result;
use crate::types::ProjectSnapshot;

use super::facade::ServiceClient;

/// Narrow interface to the Project service.
#[async_trait]
pub trait ProjectClient: Send + Sync {
    /// Fetches the current snapshot for a project. `None` if the project is
    /// unknown (the service's 404 semantics, spec §6).
    async fn get_snapshot(&self, project_id: &str) -> Result<Option<ProjectSnapshot>>;
}

/// HTTP-backed [`ProjectClient`].
pub struct HttpProjectClient {
    client: ServiceClient,
}

impl HttpProjectClient {
    /// Wraps an already-configured [`ServiceClient`].
    #[must_use]
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProjectClient for HttpProjectClient {
    async fn get_snapshot(&self, project_id: &str) -> Result<Option<ProjectSnapshot>> {
        let path = format!("/projects/{project_id}/snapshot");
        self.client.request_json::<(), _>(Method::GET, &path, None).await
    }
}

//! Kubernetes control-plane client: CronJob lifecycle (spec §4.C1, §4.C11, §4.C13).

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use crate::error::Result;

use super::facade::ServiceClient;

/// Renders the deterministic CronJob name for a project/sprint pair (spec §6).
#[must_use]
pub fn cronjob_name(project_id: &str, sprint_id: &str) -> String {
    format!("run-dailyscrum-{}-{}", project_id.to_lowercase(), sprint_id.to_lowercase())
}

/// Manifest fields for a daily-scrum CronJob.
#[derive(Debug, Serialize)]
pub struct CronJobManifest {
    /// Deterministic name, see [`cronjob_name`].
    pub name: String,
    /// Cron schedule expression.
    pub schedule: String,
    /// Sprint this job reports against.
    pub sprint_id: String,
}

/// Narrow interface to the Kubernetes control plane.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// Whether a CronJob with this name currently exists.
    async fn cronjob_exists(&self, name: &str) -> Result<bool>;

    /// Deploys a CronJob, returning its name.
    async fn create_cronjob(&self, manifest: CronJobManifest) -> Result<String>;

    /// Deletes a CronJob by name. Idempotent: deleting an absent job is not an error.
    async fn delete_cronjob(&self, name: &str) -> Result<()>;
}

/// HTTP-backed [`ControlPlaneClient`].
pub struct HttpControlPlaneClient {
    client: ServiceClient,
}

impl HttpControlPlaneClient {
    /// Wraps an already-configured [`ServiceClient`].
    #[must_use]
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ControlPlaneClient for HttpControlPlaneClient {
    async fn cronjob_exists(&self, name: &str) -> Result<bool> {
        let path = format!("/cronjobs/{name}");
        let response: Option<serde_json::Value> =
            self.client.request_json::<(), _>(Method::GET, &path, None).await?;
        Ok(response.is_some())
    }

    async fn create_cronjob(&self, manifest: CronJobManifest) -> Result<String> {
        let name = manifest.name.clone();
        let _: Option<serde_json::Value> =
            self.client.request_json(Method::POST, "/cronjobs", Some(&manifest)).await?;
        Ok(name)
    }

    async fn delete_cronjob(&self, name: &str) -> Result<()> {
        let path = format!("/cronjobs/{name}");
        let _: Option<serde_json::Value> =
            self.client.request_json::<(), _>(Method::DELETE, &path, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cronjob_name_is_lowercased_and_deterministic() {
        assert_eq!(cronjob_name("P1", "P1-S01"), "run-dailyscrum-p1-p1-s01");
    }
}

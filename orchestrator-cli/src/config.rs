//! CLI-level configuration: wraps [`orchestrator_core::config::Config`] with
//! the deployment details the core crate deliberately has no opinion on —
//! storage locations and downstream service base URLs — the same split the
//! teacher's `memory-cli` draws between its library's `MemoryConfig` and its
//! own `DatabaseConfig`/`StorageConfig`.

use std::path::Path;

use anyhow::Context;
use orchestrator_core::config::Config;
use serde::{Deserialize, Serialize};

/// Base URLs for the five downstream HTTP collaborators (spec §4.C1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceEndpoints {
    pub project_url: String,
    pub backlog_url: String,
    pub sprint_url: String,
    pub control_plane_url: String,
    pub embedding_url: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            project_url: "http://localhost:8081".to_string(),
            backlog_url: "http://localhost:8082".to_string(),
            sprint_url: "http://localhost:8083".to_string(),
            control_plane_url: "http://localhost:8084".to_string(),
            embedding_url: "http://localhost:8085".to_string(),
        }
    }
}

/// Where the two storage pools (spec §5) live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the redb Episode+Knowledge+Working database file. `None` opens
    /// a temporary database, for `--ephemeral` runs.
    pub redb_path: Option<String>,
    /// Chronicle database URL (`libsql://...`, `file:...`, or `:memory:`).
    /// Ignored unless the crate was built with the `turso` feature.
    pub turso_url: Option<String>,
    /// Chronicle authentication token, required for `libsql://` URLs.
    pub turso_token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { redb_path: Some("orchestrator.redb".to_string()), turso_url: None, turso_token: None }
    }
}

/// Top-level CLI configuration, loaded once from a TOML file and handed to
/// every subcommand.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CliConfig {
    /// Engine-level configuration (spec §4 thresholds, budgets, options).
    pub engine: Config,
    /// Downstream service locations.
    pub endpoints: ServiceEndpoints,
    /// Storage pool locations.
    pub storage: StorageConfig,
}

impl CliConfig {
    /// Loads configuration from `path`, falling back to defaults for any
    /// missing section (every nested struct is `#[serde(default)]`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else { return Ok(Self::default()) };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config file: {}", path.display()))
    }
}

//! Wires one [`EnhancedDecisionEngine`] and one [`StrategyEvolver`] from a
//! [`CliConfig`], the way the teacher's `memory-cli` config module turns its
//! own `DatabaseConfig` into a concrete `SelfLearningMemory` instance.

use std::sync::Arc;

use orchestrator_core::action_executor::ActionExecutor;
use orchestrator_core::chronicle_analyzer::ChronicleAnalyzer;
use orchestrator_core::clients::{
    ControlPlaneClient, HttpBacklogClient, HttpControlPlaneClient, HttpProjectClient, HttpSprintClient, ProjectClient,
    ServiceClient,
};
use orchestrator_core::config::Config;
use orchestrator_core::decision_auditor::DecisionAuditor;
use orchestrator_core::decision_engine::EnhancedDecisionEngine;
use orchestrator_core::embeddings::{DeterministicEmbeddingProvider, EmbeddingProvider, HttpEmbeddingProvider};
use orchestrator_core::episode_logger::EpisodeLogger;
use orchestrator_core::error::Result;
use orchestrator_core::events::{EventStream, InMemoryEventStream};
use orchestrator_core::retrieval::EpisodeRetriever;
#[cfg(not(feature = "turso"))]
use orchestrator_core::store::InMemoryChronicleStore;
use orchestrator_core::store::{ChronicleStore, EpisodeStore, KnowledgeStore};
use orchestrator_core::strategy_evolver::StrategyEvolver;
use orchestrator_storage_redb::RedbStore;

use crate::config::CliConfig;

/// Every collaborator a `tick` or `evolve` invocation needs, assembled once
/// per CLI run.
pub struct Runtime {
    /// Shared engine configuration.
    pub config: Arc<Config>,
    /// The Enhanced Decision Engine, ready to run ticks.
    pub decision_engine: EnhancedDecisionEngine,
    /// The Strategy Evolver, ready to run the daily batch.
    pub strategy_evolver: StrategyEvolver,
    /// The control-plane client, exposed for health checks.
    pub control_plane: Arc<dyn ControlPlaneClient>,
    /// The project client used to fetch a snapshot when one isn't supplied on the command line.
    pub project_client: Arc<dyn ProjectClient>,
}

async fn open_episode_knowledge_store(cli: &CliConfig, ephemeral: bool) -> Result<Arc<RedbStore>> {
    if ephemeral {
        return Ok(Arc::new(RedbStore::open_temporary().await?));
    }
    match &cli.storage.redb_path {
        Some(path) => Ok(Arc::new(RedbStore::open(path).await?)),
        None => Ok(Arc::new(RedbStore::open_temporary().await?)),
    }
}

#[cfg(feature = "turso")]
async fn open_chronicle_store(cli: &CliConfig, ephemeral: bool) -> Result<Arc<dyn ChronicleStore>> {
    if !ephemeral {
        if let Some(url) = &cli.storage.turso_url {
            let token = cli.storage.turso_token.as_deref().unwrap_or("");
            return Ok(Arc::new(orchestrator_storage_turso::TursoStore::open(url, token).await?));
        }
    }
    Ok(Arc::new(orchestrator_storage_turso::TursoStore::open_in_memory().await?))
}

#[cfg(not(feature = "turso"))]
async fn open_chronicle_store(_cli: &CliConfig, _ephemeral: bool) -> Result<Arc<dyn ChronicleStore>> {
    Ok(Arc::new(InMemoryChronicleStore::default()))
}

fn service_client(name: &str, base_url: &str, config: &Config) -> Result<ServiceClient> {
    ServiceClient::new(name, base_url, config.circuit_breaker.clone(), config.retry.clone())
}

fn build_embedding_provider(cli: &CliConfig, config: &Config, ephemeral: bool) -> Result<Arc<dyn EmbeddingProvider>> {
    if ephemeral {
        return Ok(Arc::new(DeterministicEmbeddingProvider));
    }
    let client = service_client("embedding", &cli.endpoints.embedding_url, config)?;
    Ok(Arc::new(HttpEmbeddingProvider::new(client)))
}

/// Assembles every collaborator `tick`/`evolve` need. `ephemeral` swaps every
/// durable backend (redb file, Chronicle database, HTTP clients) for an
/// in-memory/deterministic stand-in, for local demos and dry runs.
pub async fn build(cli: &CliConfig, ephemeral: bool) -> Result<Runtime> {
    let config = Arc::new(cli.engine.clone());

    // redb's `Database` is internally an `Arc`, so opening one handle and
    // cloning it for each collaborator that needs a different trait view is
    // cheap and keeps all three (retriever, logger, evolver) on the same file.
    let episode_knowledge: Arc<RedbStore> = open_episode_knowledge_store(cli, ephemeral).await?;
    let episode_store: Arc<dyn EpisodeStore> = episode_knowledge.clone();
    let evolver_episode_store: Arc<dyn EpisodeStore> = episode_knowledge.clone();
    let knowledge_store: Arc<dyn KnowledgeStore> = episode_knowledge;
    let chronicle_store: Arc<dyn ChronicleStore> = open_chronicle_store(cli, ephemeral).await?;

    let retriever = Arc::new(EpisodeRetriever::new(episode_store.clone(), config.retriever.clone()));
    let chronicle_analyzer = Arc::new(ChronicleAnalyzer::new(chronicle_store.clone(), config.circuit_breaker.clone()));
    let embedding_provider = build_embedding_provider(cli, &config, ephemeral)?;

    let control_plane: Arc<dyn ControlPlaneClient> = if ephemeral {
        Arc::new(EphemeralControlPlane::default())
    } else {
        Arc::new(HttpControlPlaneClient::new(service_client("control-plane", &cli.endpoints.control_plane_url, &config)?))
    };

    let events: Arc<dyn EventStream> = Arc::new(InMemoryEventStream::default());
    let action_executor = if ephemeral {
        Arc::new(ActionExecutor::new(
            Arc::new(EphemeralSprintClient::default()),
            control_plane.clone(),
            Arc::new(EphemeralBacklogClient),
            chronicle_store.clone(),
            events,
        ))
    } else {
        Arc::new(ActionExecutor::new(
            Arc::new(HttpSprintClient::new(service_client("sprint", &cli.endpoints.sprint_url, &config)?)),
            control_plane.clone(),
            Arc::new(HttpBacklogClient::new(service_client("backlog", &cli.endpoints.backlog_url, &config)?)),
            chronicle_store.clone(),
            events,
        ))
    };

    let episode_logger =
        Arc::new(EpisodeLogger::spawn(episode_store, embedding_provider.clone(), config.episode_logger.queue_capacity));
    let decision_auditor = Arc::new(DecisionAuditor::new(chronicle_store.clone()));

    let decision_engine = EnhancedDecisionEngine::new(
        config.clone(),
        retriever,
        chronicle_analyzer,
        control_plane.clone(),
        embedding_provider,
        action_executor,
        episode_logger,
        decision_auditor,
    );

    let strategy_evolver =
        StrategyEvolver::new(evolver_episode_store, knowledge_store, chronicle_store, config.evolver.clone());

    let project_client: Arc<dyn ProjectClient> = if ephemeral {
        Arc::new(EphemeralProjectClient)
    } else {
        Arc::new(HttpProjectClient::new(service_client("project", &cli.endpoints.project_url, &config)?))
    };

    Ok(Runtime { config, decision_engine, strategy_evolver, control_plane, project_client })
}

#[derive(Default)]
struct EphemeralControlPlane {
    existing: parking_lot::Mutex<std::collections::HashSet<String>>,
}

#[async_trait::async_trait]
impl ControlPlaneClient for EphemeralControlPlane {
    async fn cronjob_exists(&self, name: &str) -> Result<bool> {
        Ok(self.existing.lock().contains(name))
    }
    async fn create_cronjob(&self, manifest: orchestrator_core::clients::CronJobManifest) -> Result<String> {
        self.existing.lock().insert(manifest.name.clone());
        Ok(manifest.name)
    }
    async fn delete_cronjob(&self, name: &str) -> Result<()> {
        self.existing.lock().remove(name);
        Ok(())
    }
}

#[derive(Default)]
struct EphemeralSprintClient {
    counter: std::sync::atomic::AtomicU64,
}

#[async_trait::async_trait]
impl orchestrator_core::clients::SprintClient for EphemeralSprintClient {
    async fn create_sprint(
        &self,
        _project_id: &str,
        request: orchestrator_core::clients::CreateSprintRequest,
    ) -> Result<String> {
        self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(request.sprint_name)
    }
    async fn close_sprint(&self, _project_id: &str, _sprint_id: &str) -> Result<()> {
        Ok(())
    }
    async fn get_sprint(&self, _project_id: &str, _sprint_id: &str) -> Result<Option<orchestrator_core::types::Sprint>> {
        Ok(None)
    }
}

struct EphemeralBacklogClient;

#[async_trait::async_trait]
impl orchestrator_core::clients::BacklogClient for EphemeralBacklogClient {
    async fn assign_tasks(&self, request: orchestrator_core::clients::AssignTasksRequest) -> Result<u32> {
        Ok(request.count)
    }
}

/// Ephemeral runs expect the caller to supply a snapshot file (`tick
/// --snapshot`); this stand-in only exists so `Runtime` always has a
/// `ProjectClient` to hand to callers that ask for one anyway.
struct EphemeralProjectClient;

#[async_trait::async_trait]
impl ProjectClient for EphemeralProjectClient {
    async fn get_snapshot(&self, _project_id: &str) -> Result<Option<orchestrator_core::types::ProjectSnapshot>> {
        Ok(None)
    }
}

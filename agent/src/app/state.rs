//! Application state management

use std::sync::Arc;

use tracing::{info, warn};

use crate::advisor::chat::ChatAdvisor;
use crate::advisor::Advisor;
use crate::cache::tasks::TaskRegistry;
use crate::deploy::executor::{CommandExecutor, ShellExecutor};
use crate::deploy::pipeline::Pipeline;
use crate::errors::AgentError;
use crate::notify::serverchan::ServerChanNotifier;
use crate::notify::{LogNotifier, Notifier};
use crate::storage::settings::Settings;
use crate::workers::deployer::Deployer;

/// Main application state
pub struct AppState {
    /// Settings, read-only after startup
    pub settings: Arc<Settings>,

    /// Task snapshots for the status endpoints
    pub registry: Arc<TaskRegistry>,

    /// Request intake
    pub deployer: Arc<Deployer>,
}

impl AppState {
    /// Initialize application state with the production collaborators
    pub fn init(settings: Arc<Settings>) -> Result<Self, AgentError> {
        info!("Initializing application state...");

        let executor: Arc<dyn CommandExecutor> = Arc::new(ShellExecutor::new());
        let advisor: Arc<dyn Advisor> = Arc::new(ChatAdvisor::new(settings.clone())?);

        if settings.advisor.api_key.is_none() {
            warn!("No advisor API key configured, failure reports will carry no advice");
        }
        let notifier: Arc<dyn Notifier> = if settings.notifier.send_key.is_some() {
            Arc::new(ServerChanNotifier::new(settings.clone())?)
        } else {
            warn!("No notifier send key configured, notifications go to the log only");
            Arc::new(LogNotifier)
        };

        Ok(Self::with_collaborators(settings, executor, advisor, notifier))
    }

    /// Assemble state around explicit collaborators
    pub fn with_collaborators(
        settings: Arc<Settings>,
        executor: Arc<dyn CommandExecutor>,
        advisor: Arc<dyn Advisor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let registry = Arc::new(TaskRegistry::new(settings.pipeline.registry_capacity));
        let pipeline = Arc::new(Pipeline::new(
            executor,
            advisor,
            notifier,
            settings.clone(),
            registry.clone(),
        ));

        Self {
            settings,
            registry,
            deployer: Arc::new(Deployer::new(pipeline)),
        }
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        info!("Shutting down application state...");

        // In-flight runs are abandoned with the process
        let in_flight = self
            .registry
            .list()
            .iter()
            .filter(|t| !t.is_terminal())
            .count();
        if in_flight > 0 {
            warn!(in_flight, "abandoning in-flight deployments");
        }
        Ok(())
    }
}

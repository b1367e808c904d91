//! Deployment submission worker

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::deploy::pipeline::Pipeline;
use crate::errors::AgentError;
use crate::models::deployment::{DeploymentRequest, DeploymentTask};
use crate::utils::generate_task_id;

/// Accepts deployment requests and runs each in its own spawned task
pub struct Deployer {
    pipeline: Arc<Pipeline>,
}

/// Acknowledgment for an accepted request
#[derive(Debug)]
pub struct Submission {
    pub task_id: String,

    /// Handle to the pipeline run. Dropping it detaches the run.
    pub handle: JoinHandle<DeploymentTask>,
}

impl Deployer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Validate and register a request, then start its pipeline run without waiting
    pub fn submit(&self, request: DeploymentRequest) -> Result<Submission, AgentError> {
        request.validate()?;

        let registry = self.pipeline.registry();
        let base_id = generate_task_id(&request.app_name, request.port);
        let mut task_id = base_id.clone();
        let mut attempt = 1;
        // Same app and port within one millisecond
        let task = loop {
            let task = DeploymentTask::new(task_id.clone(), request.clone());
            match registry.insert(task.clone()) {
                Ok(()) => break task,
                Err(_) if attempt < 100 => {
                    task_id = format!("{}_{}", base_id, attempt);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        info!(task_id = %task_id, app = %task.request.app_name, port = task.request.port, "deployment accepted");

        let pipeline = self.pipeline.clone();
        let handle = tokio::spawn(async move { pipeline.run(task).await });
        Ok(Submission { task_id, handle })
    }
}

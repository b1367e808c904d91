//! Finite State Machine for a single deployment run

use serde::{Deserialize, Serialize};

/// Deployment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    /// Accepted, not started
    Pending,

    /// Fetching the source tree
    Cloning,

    /// Installing dependencies
    Installing,

    /// Launching the service process
    Starting,

    /// Probing the service port
    Verifying,

    /// Service is listening
    Succeeded,

    /// A stage was classified as failed
    Failed,

    /// An unexpected fault aborted the run
    Errored,
}

impl DeploymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::Pending => "pending",
            DeploymentState::Cloning => "cloning",
            DeploymentState::Installing => "installing",
            DeploymentState::Starting => "starting",
            DeploymentState::Verifying => "verifying",
            DeploymentState::Succeeded => "succeeded",
            DeploymentState::Failed => "failed",
            DeploymentState::Errored => "errored",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentState::Succeeded | DeploymentState::Failed | DeploymentState::Errored
        )
    }
}

/// Deployment event
#[derive(Debug, Clone)]
pub enum DeploymentEvent {
    /// Start the run
    Begin,

    /// Current stage finished and the run may advance
    StageComplete,

    /// Port probe found the service listening
    Verified,

    /// Current stage was classified as failed
    Fail(String),

    /// Unexpected fault
    Fault(String),
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: DeploymentState,
    error: Option<String>,
}

impl DeploymentFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: DeploymentState::Pending,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> DeploymentState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<DeploymentState, String> {
        let new_state = match (&self.state, &event) {
            (DeploymentState::Pending, DeploymentEvent::Begin) => DeploymentState::Cloning,

            (DeploymentState::Cloning, DeploymentEvent::StageComplete) => DeploymentState::Installing,
            (DeploymentState::Installing, DeploymentEvent::StageComplete) => DeploymentState::Starting,
            (DeploymentState::Starting, DeploymentEvent::StageComplete) => DeploymentState::Verifying,

            (DeploymentState::Verifying, DeploymentEvent::Verified) => DeploymentState::Succeeded,

            (
                DeploymentState::Cloning
                | DeploymentState::Installing
                | DeploymentState::Starting
                | DeploymentState::Verifying,
                DeploymentEvent::Fail(reason),
            ) => {
                self.error = Some(reason.clone());
                DeploymentState::Failed
            }

            (state, DeploymentEvent::Fault(msg)) if !state.is_terminal() => {
                self.error = Some(msg.clone());
                DeploymentState::Errored
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}

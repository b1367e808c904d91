//! Deployment models

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use openapi_server::models::{
    DeployWebRequest, ProcessView, StageResultView, TaskResponse, TaskSummary,
};
use serde::{Deserialize, Serialize};

use crate::deploy::executor::CommandResult;
use crate::deploy::fsm::DeploymentState;
use crate::errors::AgentError;

/// A deployment request accepted from a client. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Application name, also the deploy directory name
    pub app_name: String,

    /// Source repository
    pub repo_url: String,

    /// Port the application must listen on
    pub port: u16,
}

impl DeploymentRequest {
    /// Validate a request before accepting it
    pub fn validate(&self) -> Result<(), AgentError> {
        let name = self.app_name.trim();
        if name.is_empty() {
            return Err(AgentError::ValidationError("app_name must not be empty".to_string()));
        }
        if name == "." || name == ".." {
            return Err(AgentError::ValidationError(format!(
                "app_name {:?} is not a valid directory name",
                name
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(AgentError::ValidationError(format!(
                "app_name {:?} may only contain letters, digits, '.', '_' and '-'",
                name
            )));
        }
        if self.repo_url.trim().is_empty() {
            return Err(AgentError::ValidationError("repo_url must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(AgentError::ValidationError("port must be between 1 and 65535".to_string()));
        }
        Ok(())
    }
}

impl From<DeployWebRequest> for DeploymentRequest {
    fn from(req: DeployWebRequest) -> Self {
        Self {
            app_name: req.app_name.trim().to_string(),
            repo_url: req.repo_url.trim().to_string(),
            port: req.port,
        }
    }
}

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Cloning,
    Installing,
    Starting,
    Verifying,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Cloning => "cloning",
            Stage::Installing => "installing",
            Stage::Starting => "starting",
            Stage::Verifying => "verifying",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one attempted stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
}

impl StageResult {
    pub fn new(stage: Stage, result: CommandResult) -> Self {
        Self {
            stage,
            command: result.command,
            stdout: result.stdout,
            stderr: result.stderr,
            timed_out: result.timed_out,
            exit_code: result.exit_code,
        }
    }

    /// Standard output followed by standard error
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Command and its full output, the same text the classifier reads
    pub fn failure_context(&self) -> String {
        if self.timed_out {
            format!("Command timed out: {}", self.command)
        } else {
            format!(
                "Command: {}\nOutput:\n{}",
                self.command,
                self.combined_output().trim_end()
            )
        }
    }

    /// Human-readable account for the notification body
    pub fn summary(&self) -> String {
        if self.timed_out {
            format!("Command timed out: {}", self.command)
        } else if !self.stderr.trim().is_empty() {
            format!(
                "Command reported errors: {}\nError output:\n{}",
                self.command,
                self.stderr.trim_end()
            )
        } else {
            format!(
                "Command completed: {}\nOutput:\n{}",
                self.command,
                self.stdout.trim_end()
            )
        }
    }
}

/// Detached service process started by the Starting stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    /// PID echoed by the launcher, when it could be parsed
    pub pid: Option<u32>,

    /// Service output log
    pub log_path: PathBuf,
}

/// A deployment task tracked from acceptance to a terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentTask {
    pub task_id: String,
    pub request: DeploymentRequest,
    pub status: DeploymentState,
    pub stage_log: Vec<StageResult>,

    /// Reason for a `Failed` or `Errored` outcome
    pub failure: Option<String>,

    pub process: Option<ProcessHandle>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DeploymentTask {
    pub fn new(task_id: String, request: DeploymentRequest) -> Self {
        Self {
            task_id,
            request,
            status: DeploymentState::Pending,
            stage_log: Vec::new(),
            failure: None,
            process: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Stages attempted so far, in order
    pub fn stages(&self) -> Vec<Stage> {
        self.stage_log.iter().map(|r| r.stage).collect()
    }
}

impl From<&DeploymentTask> for TaskSummary {
    fn from(task: &DeploymentTask) -> Self {
        Self {
            task_id: task.task_id.clone(),
            app_name: task.request.app_name.clone(),
            port: task.request.port,
            status: task.status.as_str().to_string(),
            created_at: task.created_at.to_rfc3339(),
        }
    }
}

impl From<&DeploymentTask> for TaskResponse {
    fn from(task: &DeploymentTask) -> Self {
        Self {
            task_id: task.task_id.clone(),
            app_name: task.request.app_name.clone(),
            repo_url: task.request.repo_url.clone(),
            port: task.request.port,
            status: task.status.as_str().to_string(),
            failure: task.failure.clone(),
            process: task.process.as_ref().map(|p| ProcessView {
                pid: p.pid,
                log_path: p.log_path.display().to_string(),
            }),
            stages: task
                .stage_log
                .iter()
                .map(|r| StageResultView {
                    stage: r.stage.as_str().to_string(),
                    command: r.command.clone(),
                    stdout: r.stdout.clone(),
                    stderr: r.stderr.clone(),
                    timed_out: r.timed_out,
                    exit_code: r.exit_code,
                })
                .collect(),
            created_at: task.created_at.to_rfc3339(),
            finished_at: task.finished_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Terminal notification produced once per task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub title: String,
    pub body: String,
}

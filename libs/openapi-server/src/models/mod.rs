//! Agent API models

use serde::{Deserialize, Serialize};

/// Deployment request body for `POST /deploy_web`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployWebRequest {
    pub app_name: String,
    pub repo_url: String,
    pub port: u16,
}

/// Immediate acknowledgment of an accepted deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployWebResponse {
    pub code: u16,
    pub msg: String,
    pub task_id: String,
    pub tips: String,
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub msg: String,
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub code: u16,
    pub msg: String,
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Result of one attempted stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResultView {
    pub stage: String,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
}

/// Launched service process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessView {
    pub pid: Option<u32>,
    pub log_path: String,
}

/// Full task snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: String,
    pub app_name: String,
    pub repo_url: String,
    pub port: u16,
    pub status: String,
    pub failure: Option<String>,
    pub process: Option<ProcessView>,
    pub stages: Vec<StageResultView>,
    pub created_at: String,
    pub finished_at: Option<String>,
}

/// Task summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub app_name: String,
    pub port: u16,
    pub status: String,
    pub created_at: String,
}

/// Task list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskSummary>,
    pub total: usize,
}

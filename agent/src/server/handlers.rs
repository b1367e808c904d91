//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use openapi_server::models::{
    DeployWebRequest, DeployWebResponse, ErrorResponse, HealthResponse, TaskListResponse,
    TaskResponse, TaskSummary, VersionResponse,
};
use tracing::{error, warn};

use crate::errors::AgentError;
use crate::models::deployment::DeploymentRequest;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error body with a matching status code
pub struct ApiError(pub AgentError);

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self.0 {
            AgentError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AgentError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            e => {
                error!("request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        let body = ErrorResponse {
            code: status.as_u16(),
            msg,
        };
        (status, Json(body)).into_response()
    }
}

/// Deploy handler: accepts the request and returns before the pipeline runs
pub async fn deploy_web_handler(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<DeployWebRequest>, JsonRejection>,
) -> Result<Json<DeployWebResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!("rejected deploy request: {}", e.body_text());
        AgentError::ValidationError(e.body_text())
    })?;

    let request = DeploymentRequest::from(payload);
    let port = request.port;
    let submission = state.deployer.submit(request)?;

    Ok(Json(DeployWebResponse {
        code: 200,
        msg: "Deployment task started".to_string(),
        task_id: submission.task_id,
        tips: format!(
            "Wait for the push notification, or check {} later",
            state.settings.access_url(port)
        ),
    }))
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        code: 200,
        msg: "Deploy agent is running".to_string(),
        status: "healthy".to_string(),
        service: "deploy-agent".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Task list handler
pub async fn tasks_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let tasks: Vec<TaskSummary> = state.registry.list().iter().map(TaskSummary::from).collect();
    let total = tasks.len();
    Json(TaskListResponse { tasks, total })
}

/// Task snapshot handler
pub async fn task_handler(
    State(state): State<Arc<ServerState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = state
        .registry
        .get(&task_id)
        .ok_or_else(|| AgentError::NotFound(format!("task {} not found", task_id)))?;
    Ok(Json(TaskResponse::from(&task)))
}

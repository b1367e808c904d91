//! HTTP route tests, served in-process

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use deploy_agent::app::state::AppState;
use deploy_agent::cache::tasks::TaskRegistry;
use deploy_agent::server::serve::create_router;
use deploy_agent::server::state::ServerState;

use crate::common::{test_settings, CountingAdvisor, RecordingNotifier, Reply, ScriptedExecutor};

struct TestApp {
    router: Router,
    registry: Arc<TaskRegistry>,
    notifier: Arc<RecordingNotifier>,
    _root: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let settings = Arc::new(test_settings(root.path()));
    let notifier = Arc::new(RecordingNotifier::default());
    let executor = ScriptedExecutor::new().on("netstat", Reply::stdout("LISTEN 1/python3.9\n"));

    let state = AppState::with_collaborators(
        settings,
        Arc::new(executor),
        Arc::new(CountingAdvisor::default()),
        notifier.clone(),
    );
    let server_state = ServerState::new(
        state.settings.clone(),
        state.registry.clone(),
        state.deployer.clone(),
    );

    TestApp {
        router: create_router(Arc::new(server_state)),
        registry: state.registry.clone(),
        notifier,
        _root: root,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn wait_until_terminal(registry: &TaskRegistry, task_id: &str) {
    let wait = async {
        loop {
            if registry.get(task_id).is_some_and(|t| t.is_terminal()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("task did not finish");
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "deploy-agent");
}

#[tokio::test]
async fn test_version() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/version")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_deploy_web_acknowledges_and_runs() {
    let app = test_app();
    let (status, body) = send(
        &app.router,
        post_json(
            "/deploy_web",
            r#"{"app_name":"web","repo_url":"https://github.com/acme/web.git","port":8080}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    let task_id = body["task_id"].as_str().unwrap().to_string();
    assert!(task_id.starts_with("web_8080_"));
    assert!(body["tips"].as_str().unwrap().contains("http://203.0.113.7:8080"));

    wait_until_terminal(&app.registry, &task_id).await;
    assert_eq!(app.notifier.events().len(), 1);

    let (status, body) = send(&app.router, get(&format!("/tasks/{}", task_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "succeeded");
    assert_eq!(body["stages"].as_array().unwrap().len(), 4);
    assert_eq!(body["stages"][0]["stage"], "cloning");

    let (status, body) = send(&app.router, get("/tasks")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["tasks"][0]["task_id"], task_id.as_str());
}

#[tokio::test]
async fn test_deploy_web_rejects_invalid_request() {
    let app = test_app();

    let (status, body) = send(
        &app.router,
        post_json("/deploy_web", r#"{"app_name":"..","repo_url":"x","port":8080}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    let (status, body) = send(
        &app.router,
        post_json("/deploy_web", r#"{"app_name":"web","repo_url":"x","port":70000}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    let (status, _) = send(&app.router, post_json("/deploy_web", "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.registry.is_empty());
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/tasks/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

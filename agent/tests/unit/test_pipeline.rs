//! Pipeline scenario tests

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deploy_agent::advisor::chat::ChatAdvisor;
use deploy_agent::cache::tasks::TaskRegistry;
use deploy_agent::deploy::classifier::{ClassificationPolicy, ContainsKeyword};
use deploy_agent::deploy::executor::{ShellExecutor, EXECUTION_EXCEPTION_MARKER};
use deploy_agent::deploy::fsm::DeploymentState;
use deploy_agent::deploy::pipeline::Pipeline;
use deploy_agent::models::deployment::{DeploymentTask, Stage};
use deploy_agent::workers::deployer::Deployer;
use secrecy::SecretString;

use crate::common::{request, test_settings, CountingAdvisor, Harness, RecordingNotifier, Reply, ScriptedExecutor};

const LISTENING: &str = "tcp  0  0 0.0.0.0:8080  0.0.0.0:*  LISTEN  4242/python3.9\n";

fn task(id: &str) -> DeploymentTask {
    DeploymentTask::new(id.to_string(), request("web", 8080))
}

#[tokio::test]
async fn test_successful_deployment() {
    let harness = Harness::new(
        ScriptedExecutor::new()
            .on("git clone", Reply::stderr("Cloning into '/opt/web'...\n"))
            .on("nohup", Reply::stdout("4242\n"))
            .on("netstat", Reply::stdout(LISTENING)),
    );

    let task = harness.pipeline.run(task("web_8080_1")).await;

    assert_eq!(task.status, DeploymentState::Succeeded);
    assert_eq!(
        task.stages(),
        vec![Stage::Cloning, Stage::Installing, Stage::Starting, Stage::Verifying]
    );
    assert_eq!(task.process.as_ref().and_then(|p| p.pid), Some(4242));
    assert!(task.finished_at.is_some());
    assert!(harness.advisor.contexts().is_empty());

    let events = harness.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Deployment succeeded [web_8080_1]");
    assert!(events[0].body.contains("http://203.0.113.7:8080"));

    // Registry holds the final snapshot
    let snapshot = harness.registry.get("web_8080_1").unwrap();
    assert_eq!(snapshot.status, DeploymentState::Succeeded);
    assert_eq!(snapshot.stage_log.len(), 4);
}

#[tokio::test]
async fn test_clone_keyword_fails_and_stops() {
    let harness = Harness::new(ScriptedExecutor::new().on(
        "git clone",
        Reply::stderr("remote: Repository not found.\nfatal: repository 'x' not found\n"),
    ));

    let task = harness.pipeline.run(task("web_8080_2")).await;

    assert_eq!(task.status, DeploymentState::Failed);
    assert_eq!(task.stages(), vec![Stage::Cloning]);
    assert!(task.failure.as_deref().unwrap().starts_with("cloning stage failed"));

    // Install and start never ran
    let commands = harness.executor.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].starts_with("git clone"));

    let contexts = harness.advisor.contexts();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].contains("Repository not found"));

    let events = harness.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Deployment failed [web_8080_2]");
    assert!(events[0].body.contains(CountingAdvisor::ADVICE));
}

#[tokio::test]
async fn test_clone_keyword_on_stdout_reaches_advisor() {
    let harness = Harness::new(ScriptedExecutor::new().on(
        "git clone",
        Reply::Output {
            stdout: "remote: Repository not found.\n".to_string(),
            stderr: "Cloning into '/opt/web'...\n".to_string(),
        },
    ));

    let task = harness.pipeline.run(task("web_8080_12")).await;

    assert_eq!(task.status, DeploymentState::Failed);
    let contexts = harness.advisor.contexts();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].contains("Repository not found"));
    assert!(contexts[0].contains("Cloning into"));
}

#[tokio::test]
async fn test_install_errors_pass_through() {
    let harness = Harness::new(
        ScriptedExecutor::new()
            .on("pip install", Reply::stderr("WARNING: Retrying connection\nCould not find a version\n"))
            .on("netstat", Reply::stdout(LISTENING)),
    );

    let task = harness.pipeline.run(task("web_8080_3")).await;

    assert_eq!(task.status, DeploymentState::Succeeded);
    assert!(task.stages().contains(&Stage::Starting));
    assert!(!task.stage_log[1].stderr.is_empty());
}

#[tokio::test]
async fn test_unbound_port_fails_with_advice() {
    let harness = Harness::new(
        ScriptedExecutor::new()
            .on("nohup", Reply::stdout("4242\n"))
            .on("netstat", Reply::stdout("")),
    );

    let task = harness.pipeline.run(task("web_8080_4")).await;

    assert_eq!(task.status, DeploymentState::Failed);
    assert_eq!(task.stages().last(), Some(&Stage::Verifying));

    let contexts = harness.advisor.contexts();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].contains("gunicorn"));
    assert!(contexts[0].contains("8080"));

    let events = harness.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Deployment failed [web_8080_4]");
    assert!(events[0].body.contains(CountingAdvisor::ADVICE));
    assert!(events[0].body.contains("app.log"));
}

#[tokio::test]
async fn test_clone_spawn_fault_proceeds() {
    let harness = Harness::new(
        ScriptedExecutor::new()
            .on("git clone", Reply::Exception(ErrorKind::NotFound, "git binary missing".to_string()))
            .on("netstat", Reply::stdout(LISTENING)),
    );

    let task = harness.pipeline.run(task("web_8080_5")).await;

    assert!(task.stage_log[0].stderr.starts_with(EXECUTION_EXCEPTION_MARKER));
    assert_eq!(task.stages().len(), 4);
    assert_eq!(task.status, DeploymentState::Succeeded);
    assert_eq!(harness.notifier.events().len(), 1);
}

#[tokio::test]
async fn test_clone_spawn_fault_with_keyword_fails() {
    let harness = Harness::new(ScriptedExecutor::new().on(
        "git clone",
        Reply::Exception(ErrorKind::PermissionDenied, "Permission denied".to_string()),
    ));

    let task = harness.pipeline.run(task("web_8080_6")).await;

    assert_eq!(task.status, DeploymentState::Failed);
    assert_eq!(task.stages(), vec![Stage::Cloning]);
}

#[tokio::test]
async fn test_panic_in_stage_errors_and_notifies_once() {
    let harness = Harness::new(
        ScriptedExecutor::new().on("pip install", Reply::Panic("executor exploded".to_string())),
    );

    let task = harness.pipeline.run(task("web_8080_7")).await;

    assert_eq!(task.status, DeploymentState::Errored);
    assert!(task.failure.as_deref().unwrap().contains("executor exploded"));
    assert!(task.finished_at.is_some());

    let events = harness.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Deployment errored [web_8080_7]");
    assert!(events[0].body.contains("executor exploded"));
    assert_eq!(
        harness.registry.get("web_8080_7").unwrap().status,
        DeploymentState::Errored
    );
}

#[tokio::test]
async fn test_configured_install_predicate_fails_install() {
    let harness = Harness::new(
        ScriptedExecutor::new()
            .on("pip install", Reply::stderr("ERROR: No matching distribution found for flask\n")),
    );
    let pipeline = Pipeline::new(
        harness.executor.clone(),
        harness.advisor.clone(),
        harness.notifier.clone(),
        harness.settings.clone(),
        harness.registry.clone(),
    )
    .with_policy(
        ClassificationPolicy::new()
            .with(Stage::Installing, ContainsKeyword("No matching distribution".to_string())),
    );

    let task = pipeline.run(task("web_8080_8")).await;

    assert_eq!(task.status, DeploymentState::Failed);
    assert_eq!(task.stages(), vec![Stage::Cloning, Stage::Installing]);
    assert_eq!(harness.advisor.contexts().len(), 1);
}

#[tokio::test]
async fn test_timeout_bounds_wall_clock() {
    let harness = Harness::with_settings(
        ScriptedExecutor::new()
            .on("git clone", Reply::Delay(Duration::from_secs(30)))
            .on("netstat", Reply::stdout(LISTENING)),
        |settings| settings.pipeline.command_timeout_secs = 1,
    );

    let started = Instant::now();
    let task = harness.pipeline.run(task("web_8080_9")).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(task.stage_log[0].timed_out);
    // A timed-out clone carries no keywords and proceeds
    assert_eq!(task.status, DeploymentState::Succeeded);
}

#[tokio::test]
async fn test_real_shell_timeout_is_bounded() {
    let root = tempfile::tempdir().unwrap();
    let mut settings = test_settings(root.path());
    settings.pipeline.command_timeout_secs = 1;
    settings.pipeline.clone_command = "sleep 10".to_string();
    settings.pipeline.install_command = "true".to_string();
    settings.pipeline.start_command = "true".to_string();
    settings.pipeline.probe_command = "true".to_string();
    let settings = Arc::new(settings);

    let advisor = Arc::new(CountingAdvisor::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = Pipeline::new(
        Arc::new(ShellExecutor::new()),
        advisor.clone(),
        notifier.clone(),
        settings.clone(),
        Arc::new(TaskRegistry::new(8)),
    );

    let started = Instant::now();
    let task = pipeline.run(task("web_8080_10")).await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(task.stage_log[0].timed_out);
    assert_eq!(task.status, DeploymentState::Failed);
    assert_eq!(notifier.events().len(), 1);
}

#[tokio::test]
async fn test_advisor_fault_degrades_advice() {
    let root = tempfile::tempdir().unwrap();
    let mut settings = test_settings(root.path());
    settings.advisor.base_url = "http://127.0.0.1:1/v1".to_string();
    settings.advisor.api_key = Some(SecretString::from("sk-test".to_string()));
    settings.advisor.timeout_secs = 2;
    let settings = Arc::new(settings);

    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = Pipeline::new(
        Arc::new(ScriptedExecutor::new().on("git clone", Reply::stderr("fatal: unable to access\n"))),
        Arc::new(ChatAdvisor::new(settings.clone()).unwrap()),
        notifier.clone(),
        settings,
        Arc::new(TaskRegistry::new(8)),
    );

    let task = pipeline.run(task("web_8080_11")).await;

    assert_eq!(task.status, DeploymentState::Failed);
    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].body.contains("AI troubleshooting failed: "));
    assert!(events[0].body.contains("Please troubleshoot manually."));
}

#[tokio::test]
async fn test_concurrent_same_name_tasks() {
    let harness = Harness::new(
        ScriptedExecutor::new()
            .on("git clone", Reply::Delay(Duration::from_millis(50)))
            .on("netstat", Reply::stdout(LISTENING)),
    );
    let deployer = Deployer::new(harness.pipeline.clone());

    let first = deployer.submit(request("web", 8080)).unwrap();
    let second = deployer.submit(request("web", 8080)).unwrap();
    assert_ne!(first.task_id, second.task_id);

    let (a, b) = tokio::join!(first.handle, second.handle);
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.is_terminal());
    assert!(b.is_terminal());

    assert_eq!(harness.notifier.events().len(), 2);
    assert_eq!(harness.registry.len(), 2);
}

#[tokio::test]
async fn test_deployer_rejects_invalid_request() {
    let harness = Harness::new(ScriptedExecutor::new());
    let deployer = Deployer::new(harness.pipeline.clone());

    assert!(deployer.submit(request("../etc", 8080)).is_err());
    assert!(deployer.submit(request("web", 0)).is_err());
    assert!(harness.registry.is_empty());
    assert!(harness.executor.commands().is_empty());
}

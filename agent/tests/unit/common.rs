//! Shared fakes for the integration tests

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use deploy_agent::advisor::Advisor;
use deploy_agent::cache::tasks::TaskRegistry;
use deploy_agent::deploy::executor::{CommandExecutor, CommandResult};
use deploy_agent::deploy::pipeline::Pipeline;
use deploy_agent::models::deployment::{DeploymentRequest, NotificationEvent};
use deploy_agent::notify::Notifier;
use deploy_agent::storage::settings::Settings;

/// Scripted reply for commands containing a needle
#[derive(Debug, Clone)]
pub enum Reply {
    Output { stdout: String, stderr: String },
    Exception(std::io::ErrorKind, String),
    TimedOut,
    Delay(Duration),
    Panic(String),
}

impl Reply {
    pub fn stdout(s: &str) -> Self {
        Reply::Output {
            stdout: s.to_string(),
            stderr: String::new(),
        }
    }

    pub fn stderr(s: &str) -> Self {
        Reply::Output {
            stdout: String::new(),
            stderr: s.to_string(),
        }
    }
}

/// Executor answering from a script and recording every command
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Vec<(String, Reply)>,
    pub commands: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// First matching rule wins; unmatched commands succeed silently
    pub fn on(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push((needle.to_string(), reply));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, command: &str, timeout: Duration) -> CommandResult {
        self.commands.lock().unwrap().push(command.to_string());

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Reply::stdout(""));

        let ok = |stdout: String, stderr: String| CommandResult {
            command: command.to_string(),
            stdout,
            stderr,
            timed_out: false,
            exit_code: Some(0),
        };

        match reply {
            Reply::Output { stdout, stderr } => ok(stdout, stderr),
            Reply::Exception(kind, msg) => {
                CommandResult::exception(command, &std::io::Error::new(kind, msg))
            }
            Reply::TimedOut => CommandResult::timeout(command),
            Reply::Delay(delay) if delay >= timeout => {
                tokio::time::sleep(timeout).await;
                CommandResult::timeout(command)
            }
            Reply::Delay(delay) => {
                tokio::time::sleep(delay).await;
                ok(String::new(), String::new())
            }
            Reply::Panic(msg) => panic!("{}", msg),
        }
    }
}

/// Advisor recording each context it is asked about
#[derive(Default)]
pub struct CountingAdvisor {
    pub contexts: Mutex<Vec<String>>,
}

impl CountingAdvisor {
    pub const ADVICE: &'static str = "Check the repository URL and retry.";

    pub fn contexts(&self) -> Vec<String> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Advisor for CountingAdvisor {
    async fn advise(&self, context: &str) -> String {
        self.contexts.lock().unwrap().push(context.to_string());
        Self::ADVICE.to_string()
    }
}

/// Notifier keeping every delivered event
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, body: &str) {
        self.events.lock().unwrap().push(NotificationEvent {
            title: title.to_string(),
            body: body.to_string(),
        });
    }
}

/// Settings with a temporary deploy root and no settle delay
pub fn test_settings(deploy_root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.deploy_root = deploy_root.to_path_buf();
    settings.public_address = "203.0.113.7".to_string();
    settings.pipeline.settle_delay_ms = 0;
    settings.pipeline.command_timeout_secs = 5;
    settings
}

pub fn request(app_name: &str, port: u16) -> DeploymentRequest {
    DeploymentRequest {
        app_name: app_name.to_string(),
        repo_url: "https://github.com/acme/web.git".to_string(),
        port,
    }
}

/// A pipeline wired to fakes
pub struct Harness {
    pub executor: Arc<ScriptedExecutor>,
    pub advisor: Arc<CountingAdvisor>,
    pub notifier: Arc<RecordingNotifier>,
    pub registry: Arc<TaskRegistry>,
    pub settings: Arc<Settings>,
    pub pipeline: Arc<Pipeline>,
    pub root: TempDir,
}

impl Harness {
    pub fn new(executor: ScriptedExecutor) -> Self {
        Self::with_settings(executor, |_| {})
    }

    pub fn with_settings(executor: ScriptedExecutor, configure: impl FnOnce(&mut Settings)) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut settings = test_settings(root.path());
        configure(&mut settings);

        let executor = Arc::new(executor);
        let advisor = Arc::new(CountingAdvisor::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = Arc::new(settings);
        let registry = Arc::new(TaskRegistry::new(settings.pipeline.registry_capacity));
        let pipeline = Arc::new(Pipeline::new(
            executor.clone(),
            advisor.clone(),
            notifier.clone(),
            settings.clone(),
            registry.clone(),
        ));

        Self {
            executor,
            advisor,
            notifier,
            registry,
            settings,
            pipeline,
            root,
        }
    }
}

//! Deployment pipeline
//!
//! One [`Pipeline::run`] drives a single task through
//! `Cloning -> Installing -> Starting -> Verifying`, strictly in order. Each
//! stage result is appended to the task's stage log and published to the
//! registry. Every run ends in a terminal state and sends exactly one
//! notification, including when stage logic returns an error or panics.

use std::any::Any;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::advisor::Advisor;
use crate::cache::tasks::TaskRegistry;
use crate::deploy::classifier::ClassificationPolicy;
use crate::deploy::commands::StageCommands;
use crate::deploy::executor::{CommandExecutor, CommandResult};
use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm, DeploymentState};
use crate::deploy::{launcher, probe};
use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::models::deployment::{DeploymentTask, NotificationEvent, Stage, StageResult};
use crate::notify::Notifier;
use crate::storage::settings::Settings;

/// State of one run: the task, its FSM and the notification body built so far
struct Run {
    task: DeploymentTask,
    fsm: DeploymentFsm,
    report: String,
}

impl Run {
    fn new(task: DeploymentTask) -> Self {
        let req = &task.request;
        let report = format!(
            "### Deployment task [{}]\nApplication: {}\nRepository: {}\nPort: {}\n\n",
            task.task_id, req.app_name, req.repo_url, req.port
        );
        Self {
            task,
            fsm: DeploymentFsm::new(),
            report,
        }
    }

    fn section(&mut self, heading: &str) {
        let _ = writeln!(self.report, "#### {}", heading);
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.report, "{}", text);
    }

    fn notification(&self, outcome: &str) -> NotificationEvent {
        NotificationEvent {
            title: format!("Deployment {} [{}]", outcome, self.task.task_id),
            body: self.report.clone(),
        }
    }
}

/// Coordinates executor, classifier, advisor and notifier for deployment runs
pub struct Pipeline {
    executor: Arc<dyn CommandExecutor>,
    advisor: Arc<dyn Advisor>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<Settings>,
    policy: ClassificationPolicy,
    registry: Arc<TaskRegistry>,
}

impl Pipeline {
    /// Pipeline with the configured clone failure keywords as its policy
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        advisor: Arc<dyn Advisor>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<Settings>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        let policy =
            ClassificationPolicy::clone_keywords(settings.pipeline.clone_failure_keywords.iter().cloned());
        Self {
            executor,
            advisor,
            notifier,
            settings,
            policy,
            registry,
        }
    }

    /// Replace the classification policy
    pub fn with_policy(mut self, policy: ClassificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Run a task to a terminal state and notify once. Returns the final task.
    pub async fn run(&self, task: DeploymentTask) -> DeploymentTask {
        let mut run = Run::new(task);
        let task_id = run.task.task_id.clone();
        info!(task_id = %task_id, app = %run.task.request.app_name, "deployment started");

        let outcome = AssertUnwindSafe(self.drive(&mut run)).catch_unwind().await;
        let event = match outcome {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => self.errored(&mut run, e.to_string()),
            Err(panic) => self.errored(&mut run, panic_message(panic)),
        };

        run.task.finished_at = Some(Utc::now());
        self.registry.publish(&run.task);
        info!(task_id = %task_id, status = run.task.status.as_str(), "deployment finished");

        self.notifier.notify(&event.title, &event.body).await;
        run.task
    }

    async fn drive(&self, run: &mut Run) -> Result<NotificationEvent, AgentError> {
        let pipeline = &self.settings.pipeline;
        let timeout = pipeline.command_timeout();
        let req = run.task.request.clone();
        let deploy_dir = self.settings.deploy_dir(&req.app_name);
        let commands = StageCommands::render(pipeline, &req.repo_url, &deploy_dir, req.port);

        self.transition(run, DeploymentEvent::Begin)?;

        // Cloning: stale checkout is removed first, errors ignored
        run.section("Step 1: Clone source");
        let checkout = Dir::new(&deploy_dir);
        if let Err(e) = checkout.delete().await {
            debug!(
                task_id = %run.task.task_id,
                path = %checkout.path().display(),
                error = %e,
                "could not remove old deploy directory"
            );
        }
        let clone = self.stage(run, Stage::Cloning, &commands.clone, timeout).await;
        if let Some(reason) = self.classify(run, &clone) {
            return self.fail(run, reason, clone.failure_context()).await;
        }
        self.transition(run, DeploymentEvent::StageComplete)?;

        run.section("Step 2: Install dependencies");
        let install = self.stage(run, Stage::Installing, &commands.install, timeout).await;
        if let Some(reason) = self.classify(run, &install) {
            return self.fail(run, reason, install.failure_context()).await;
        }
        self.transition(run, DeploymentEvent::StageComplete)?;

        run.section("Step 3: Start service");
        let start = self.stage(run, Stage::Starting, &commands.start, timeout).await;
        run.task.process = Some(launcher::process_handle(&start.stdout, commands.log_path.clone()));
        self.registry.publish(&run.task);
        if let Some(reason) = self.classify(run, &start) {
            return self.fail(run, reason, start.failure_context()).await;
        }
        self.transition(run, DeploymentEvent::StageComplete)?;

        self.verify(run, &commands, pipeline.settle_delay(), timeout).await
    }

    async fn verify(
        &self,
        run: &mut Run,
        commands: &StageCommands,
        settle_delay: Duration,
        timeout: Duration,
    ) -> Result<NotificationEvent, AgentError> {
        let port = run.task.request.port;
        tokio::time::sleep(settle_delay).await;

        run.section("Step 4: Verify service");
        let result = self.executor.execute(&commands.probe, timeout).await;
        let bound = probe::is_bound(&result);
        let probe_result = self.record(run, Stage::Verifying, result);

        if let Some(reason) = self.classify(run, &probe_result) {
            return self.fail(run, reason, probe_result.failure_context()).await;
        }

        if bound {
            run.line(&format!("Port {} is listening.", port));
            run.section("Deployment succeeded");
            run.line(&format!("Access URL: {}", self.settings.access_url(port)));
            self.transition(run, DeploymentEvent::Verified)?;
            return Ok(run.notification("succeeded"));
        }

        run.line(&format!("Port {} is not listening, the service failed to start.", port));
        let pid = run.task.process.as_ref().and_then(|p| p.pid);
        match pid {
            Some(pid) if launcher::is_process_alive(pid) => {
                run.line(&format!("Service process {} is still running.", pid))
            }
            Some(pid) => run.line(&format!("Service process {} has exited.", pid)),
            None => run.line("Service process id is unknown."),
        }
        if let Some(process) = &run.task.process {
            let log = format!("Service log: {}", process.log_path.display());
            run.line(&log);
        }

        let context = format!(
            "Start command: {}\nPort {} is not listening",
            commands.start, port
        );
        self.fail(run, format!("port {} is not listening", port), context)
            .await
    }

    /// Execute one stage command and record it
    async fn stage(&self, run: &mut Run, stage: Stage, command: &str, timeout: Duration) -> StageResult {
        info!(task_id = %run.task.task_id, stage = %stage, "stage started");
        let result = self.executor.execute(command, timeout).await;
        let entry = self.record(run, stage, result);
        run.line(&entry.summary());
        run.line("");
        entry
    }

    fn record(&self, run: &mut Run, stage: Stage, result: CommandResult) -> StageResult {
        let entry = StageResult::new(stage, result);
        info!(
            task_id = %run.task.task_id,
            stage = %stage,
            timed_out = entry.timed_out,
            exit_code = ?entry.exit_code,
            "stage finished"
        );
        run.task.stage_log.push(entry.clone());
        self.registry.publish(&run.task);
        entry
    }

    fn classify(&self, run: &Run, result: &StageResult) -> Option<String> {
        let verdict = self.policy.classify(result.stage, &result.combined_output());
        match &verdict {
            Some(reason) => {
                warn!(task_id = %run.task.task_id, stage = %result.stage, reason = %reason, "stage classified as failed")
            }
            None if self.policy.is_classified(result.stage) => {
                debug!(task_id = %run.task.task_id, stage = %result.stage, "stage passed classification")
            }
            None => {}
        }
        verdict.map(|reason| format!("{} stage failed: {}", result.stage, reason))
    }

    /// Consult the advisor once, then move to `Failed`
    async fn fail(
        &self,
        run: &mut Run,
        reason: String,
        context: String,
    ) -> Result<NotificationEvent, AgentError> {
        info!(task_id = %run.task.task_id, "requesting troubleshooting advice");
        let advice = self.advisor.advise(&context).await;
        run.section("AI troubleshooting advice");
        run.line(&advice);

        self.transition(run, DeploymentEvent::Fail(reason))?;
        run.task.failure = run.fsm.error().map(str::to_string);
        Ok(run.notification("failed"))
    }

    /// Move to `Errored` after an escaped error or panic
    fn errored(&self, run: &mut Run, message: String) -> NotificationEvent {
        error!(task_id = %run.task.task_id, error = %message, "deployment aborted");

        if run.fsm.process(DeploymentEvent::Fault(message.clone())).is_err() {
            // Fault after a terminal transition still ends the run as errored
            warn!(task_id = %run.task.task_id, state = run.fsm.state().as_str(), "fault in terminal state");
        }
        run.task.status = DeploymentState::Errored;
        run.task.failure = Some(message.clone());

        run.section("Deployment error");
        run.line(&message);
        run.notification("errored")
    }

    fn transition(&self, run: &mut Run, event: DeploymentEvent) -> Result<(), AgentError> {
        let from = run.fsm.state();
        let to = run.fsm.process(event).map_err(AgentError::DeployError)?;
        debug!(task_id = %run.task.task_id, from = from.as_str(), to = to.as_str(), "transition");

        run.task.status = to;
        self.registry.publish(&run.task);
        Ok(())
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic: unknown payload".to_string()
    }
}

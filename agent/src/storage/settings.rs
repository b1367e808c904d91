//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Environment variable holding the advisor API key
pub const ENV_ADVISOR_API_KEY: &str = "DEEPSEEK_API_KEY";
/// Environment variable holding the push notification send key
pub const ENV_NOTIFIER_SEND_KEY: &str = "SERVERCHAN_SENDKEY";
/// Environment variable holding the public address used in access URLs
pub const ENV_PUBLIC_ADDRESS: &str = "SERVER_PUBLIC_IP";
/// Environment variable overriding the configured log level
pub const ENV_LOG_LEVEL: &str = "DEPLOY_AGENT_LOG_LEVEL";

/// Agent settings.
///
/// Built once at startup and shared read-only by the pipeline and both
/// collaborator adapters.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for the rolling log file (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Local HTTP server
    #[serde(default)]
    pub server: ServerSettings,

    /// Public address of this host, used to build access URLs
    #[serde(default = "default_public_address")]
    pub public_address: String,

    /// Parent directory of every deploy directory
    #[serde(default = "default_deploy_root")]
    pub deploy_root: PathBuf,

    /// Diagnostic advisor
    #[serde(default)]
    pub advisor: AdvisorSettings,

    /// Push notifier
    #[serde(default)]
    pub notifier: NotifierSettings,

    /// Deployment pipeline
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

fn default_public_address() -> String {
    "127.0.0.1".to_string()
}

fn default_deploy_root() -> PathBuf {
    PathBuf::from("/opt")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: None,
            json_logs: false,
            server: ServerSettings::default(),
            public_address: default_public_address(),
            deploy_root: default_deploy_root(),
            advisor: AdvisorSettings::default(),
            notifier: NotifierSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional JSON file, then apply environment
    /// overrides. A missing file yields the defaults.
    pub async fn load(file: &File) -> Result<Self, AgentError> {
        let mut settings = if file.exists().await {
            info!("Loading settings from {}", file.path().display());
            file.read_json::<Settings>().await.map_err(|e| {
                AgentError::ConfigError(format!(
                    "Invalid settings file {}: {}",
                    file.path().display(),
                    e
                ))
            })?
        } else {
            debug!("No settings file at {}, using defaults", file.path().display());
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), AgentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup(ENV_ADVISOR_API_KEY) {
            self.advisor.api_key = Some(SecretString::from(key));
        }
        if let Some(key) = lookup(ENV_NOTIFIER_SEND_KEY) {
            self.notifier.send_key = Some(SecretString::from(key));
        }
        if let Some(address) = lookup(ENV_PUBLIC_ADDRESS) {
            self.public_address = address.trim().to_string();
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level.parse().map_err(AgentError::ConfigError)?;
        }
        Ok(())
    }

    /// Deploy directory for an application
    pub fn deploy_dir(&self, app_name: &str) -> PathBuf {
        self.deploy_root.join(app_name)
    }

    /// Access URL announced after a successful deployment
    pub fn access_url(&self, port: u16) -> String {
        format!("http://{}:{}", self.public_address, port)
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Chat-completion advisor settings
#[derive(Debug, Deserialize)]
pub struct AdvisorSettings {
    /// OpenAI-compatible API base, including the version segment
    #[serde(default = "default_advisor_base_url")]
    pub base_url: String,

    #[serde(default = "default_advisor_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_advisor_temperature")]
    pub temperature: f32,

    #[serde(default = "default_advisor_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_advisor_timeout")]
    pub timeout_secs: u64,
}

fn default_advisor_base_url() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_advisor_model() -> String {
    "deepseek-chat".to_string()
}

fn default_advisor_temperature() -> f32 {
    0.1
}

fn default_advisor_max_tokens() -> u32 {
    1500
}

fn default_advisor_timeout() -> u64 {
    60
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            base_url: default_advisor_base_url(),
            model: default_advisor_model(),
            api_key: None,
            temperature: default_advisor_temperature(),
            max_tokens: default_advisor_max_tokens(),
            timeout_secs: default_advisor_timeout(),
        }
    }
}

/// Push notifier settings
#[derive(Debug, Deserialize)]
pub struct NotifierSettings {
    #[serde(default = "default_notifier_base_url")]
    pub base_url: String,

    /// Without a send key, notifications are written to the log only
    #[serde(default)]
    pub send_key: Option<SecretString>,

    #[serde(default = "default_notifier_timeout")]
    pub timeout_secs: u64,
}

fn default_notifier_base_url() -> String {
    "https://sctapi.ftqq.com".to_string()
}

fn default_notifier_timeout() -> u64 {
    10
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            base_url: default_notifier_base_url(),
            send_key: None,
            timeout_secs: default_notifier_timeout(),
        }
    }
}

/// Deployment pipeline settings
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// Wall-clock bound for every stage command
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Wait between launching the service and probing its port, in milliseconds
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Clone command; `{repo}` and `{dir}` are substituted
    #[serde(default = "default_clone_command")]
    pub clone_command: String,

    /// Install command, run inside the deploy directory
    #[serde(default = "default_install_command")]
    pub install_command: String,

    /// Server command, launched detached inside the deploy directory; `{port}` is substituted
    #[serde(default = "default_start_command")]
    pub start_command: String,

    /// Listening-socket query; `{port}` and `{pattern}` are substituted
    #[serde(default = "default_probe_command")]
    pub probe_command: String,

    /// Process name expected to hold the port
    #[serde(default = "default_process_pattern")]
    pub process_pattern: String,

    /// Clone output containing any of these marks the clone as failed
    #[serde(default = "default_clone_failure_keywords")]
    pub clone_failure_keywords: Vec<String>,

    /// Maximum number of tasks kept in the registry
    #[serde(default = "default_registry_capacity")]
    pub registry_capacity: usize,
}

fn default_command_timeout() -> u64 {
    30
}

fn default_settle_delay() -> u64 {
    2000
}

fn default_clone_command() -> String {
    "git clone {repo} {dir}".to_string()
}

fn default_install_command() -> String {
    "python3.9 -m pip install -r requirements.txt --user".to_string()
}

fn default_start_command() -> String {
    "python3.9 -m gunicorn -w 4 -b 0.0.0.0:{port} app:app".to_string()
}

fn default_probe_command() -> String {
    "netstat -tulpn 2>/dev/null | grep ':{port} ' | grep {pattern}".to_string()
}

fn default_process_pattern() -> String {
    "python3.9".to_string()
}

fn default_clone_failure_keywords() -> Vec<String> {
    crate::deploy::git::CLONE_FAILURE_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

fn default_registry_capacity() -> usize {
    256
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout(),
            settle_delay_ms: default_settle_delay(),
            clone_command: default_clone_command(),
            install_command: default_install_command(),
            start_command: default_start_command(),
            probe_command: default_probe_command(),
            process_pattern: default_process_pattern(),
            clone_failure_keywords: default_clone_failure_keywords(),
            registry_capacity: default_registry_capacity(),
        }
    }
}

impl PipelineSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

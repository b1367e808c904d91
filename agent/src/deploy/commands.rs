//! Stage command rendering

use std::path::{Path, PathBuf};

use crate::deploy::git;
use crate::storage::settings::PipelineSettings;
use crate::utils::shell_escape_str;

/// Service output log, relative to the deploy directory
pub const APP_LOG_FILE: &str = "app.log";

/// Fully rendered commands for one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommands {
    pub clone: String,
    pub install: String,
    pub start: String,
    pub probe: String,
    pub log_path: PathBuf,
}

impl StageCommands {
    pub fn render(settings: &PipelineSettings, repo_url: &str, deploy_dir: &Path, port: u16) -> Self {
        let dir = shell_escape_str(&deploy_dir.to_string_lossy());
        let log_path = deploy_dir.join(APP_LOG_FILE);
        let log = shell_escape_str(&log_path.to_string_lossy());
        let port = port.to_string();

        let install = format!("cd {} && {}", dir, settings.install_command);

        // `$!` is the PID of nohup, which execs the server in place
        let server = settings.start_command.replace("{port}", &port);
        let start = format!(
            "cd {} && {{ nohup {} > {} 2>&1 & echo $!; }}",
            dir, server, log
        );

        let probe = settings
            .probe_command
            .replace("{port}", &port)
            .replace("{pattern}", &shell_escape_str(&settings.process_pattern));

        Self {
            clone: git::clone_command(&settings.clone_command, repo_url, deploy_dir),
            install,
            start,
            probe,
            log_path,
        }
    }
}

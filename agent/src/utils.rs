//! Utility functions

use std::borrow::Cow;
use std::time::Duration;

use chrono::Utc;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::deploy::executor::{CommandExecutor, ShellExecutor};

/// Version information for the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Quote a value for interpolation into a `sh -c` command line
pub fn shell_escape_str(value: &str) -> String {
    shell_escape::escape(Cow::from(value)).into_owned()
}

/// Task id, unique per application name, port and creation time
pub fn generate_task_id(app_name: &str, port: u16) -> String {
    format!("{}_{}_{}", app_name, port, Utc::now().timestamp_millis())
}

/// External tools the pipeline shells out to
const REQUIRED_TOOLS: [(&str, &str); 3] = [
    ("sh", "command shell"),
    ("git", "source checkout"),
    ("netstat", "port probe"),
];

/// Check that the tools used by the deployment stages are installed
pub async fn run_diagnostic() -> bool {
    println!("{}", "Deploy agent diagnostics".bold());

    let version = version_info();
    println!(
        "  version {} ({}, built {})",
        version.version, version.git_hash, version.build_time
    );

    let executor = ShellExecutor::new();
    let mut all_ok = true;
    for (tool, purpose) in REQUIRED_TOOLS {
        let result = executor
            .execute(
                &format!("command -v {}", shell_escape_str(tool)),
                Duration::from_secs(5),
            )
            .await;
        let location = result.stdout.trim();
        if result.exit_code == Some(0) && !location.is_empty() {
            println!("  {} {:<8} {} ({})", "✓".green(), tool, location, purpose);
        } else {
            all_ok = false;
            println!("  {} {:<8} {} ({})", "✗".red(), tool, "not found".red(), purpose);
        }
    }

    if all_ok {
        println!("{}", "All checks passed".green().bold());
    } else {
        println!("{}", "Some checks failed".yellow().bold());
    }
    all_ok
}

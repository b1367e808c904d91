//! Git clone stage

use std::path::Path;

use crate::utils::shell_escape_str;

/// Substrings in clone output that mark the clone as failed.
///
/// Git writes progress ("Cloning into ...") to stderr, so stderr alone is not
/// a failure signal.
pub const CLONE_FAILURE_KEYWORDS: [&str; 5] = [
    "fatal:",
    "error:",
    "Repository not found",
    "Could not resolve host",
    "Permission denied",
];

/// Render the clone command from its template
pub fn clone_command(template: &str, repo_url: &str, target_dir: &Path) -> String {
    template
        .replace("{repo}", &shell_escape_str(repo_url))
        .replace("{dir}", &shell_escape_str(&target_dir.to_string_lossy()))
}

//! Port probe

use crate::deploy::executor::CommandResult;

/// The probe saw a listener: it completed and printed a non-blank line
pub fn is_bound(result: &CommandResult) -> bool {
    !result.timed_out && result.stdout.lines().any(|line| !line.trim().is_empty())
}

//! Diagnostic advisor
//!
//! The pipeline asks an [`Advisor`] for remediation advice when a stage
//! fails. Calls are best-effort and single-shot: an advisor never returns an
//! error, it degrades to text asking for manual troubleshooting.

pub mod chat;

use async_trait::async_trait;

/// Turns error context into human-readable remediation advice
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, context: &str) -> String;
}

/// Advice returned when the advisor could not be reached or answered nothing
pub fn degraded_advice(reason: &str) -> String {
    format!("AI troubleshooting failed: {}\nPlease troubleshoot manually.", reason)
}

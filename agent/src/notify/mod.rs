//! Terminal outcome notification
//!
//! Delivery is fire-and-forget: a [`Notifier`] logs its own failures and never
//! reports them back to the pipeline.

pub mod serverchan;

use async_trait::async_trait;
use tracing::info;

/// Delivers a titled message to a human
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, body: &str);
}

/// Writes notifications to the log. Used when no push channel is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, body: &str) {
        info!(title = %title, "notification\n{}", body);
    }
}

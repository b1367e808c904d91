//! ServerChan push notifier

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use openapi_client::models::{PushRequest, PushResponse};
use secrecy::ExposeSecret;
use tracing::{error, info, warn};

use crate::errors::AgentError;
use crate::http::client::HttpClient;
use crate::notify::Notifier;
use crate::storage::settings::Settings;

/// Pushes notifications through the ServerChan `<sendkey>.send` endpoint
pub struct ServerChanNotifier {
    client: HttpClient,
    settings: Arc<Settings>,
}

impl ServerChanNotifier {
    pub fn new(settings: Arc<Settings>) -> Result<Self, AgentError> {
        let client = HttpClient::new(
            &settings.notifier.base_url,
            Duration::from_secs(settings.notifier.timeout_secs),
        )?;
        Ok(Self { client, settings })
    }

    async fn send(&self, title: &str, body: &str) -> Result<(), AgentError> {
        let send_key = self
            .settings
            .notifier
            .send_key
            .as_ref()
            .ok_or_else(|| AgentError::NotifyError("no send key configured".to_string()))?;

        let form = PushRequest {
            title: title.to_string(),
            desp: body.to_string(),
        };
        let response: PushResponse = self
            .client
            .post_form(&format!("{}.send", send_key.expose_secret()), &form)
            .await?;

        if response.is_success() {
            Ok(())
        } else {
            Err(AgentError::NotifyError(format!(
                "push rejected with code {}: {}",
                response.code,
                response.message.unwrap_or_default()
            )))
        }
    }
}

#[async_trait]
impl Notifier for ServerChanNotifier {
    async fn notify(&self, title: &str, body: &str) {
        match self.send(title, body).await {
            Ok(()) => info!(title = %title, "notification delivered"),
            Err(AgentError::NotifyError(e)) => warn!(title = %title, "notification not delivered: {}", e),
            Err(e) => error!(title = %title, error = %e, "notification transport failed"),
        }
    }
}

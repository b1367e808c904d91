//! Chat-completion advisor

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use openapi_client::models::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use tracing::{info, warn};

use crate::advisor::{degraded_advice, Advisor};
use crate::errors::AgentError;
use crate::http::client::HttpClient;
use crate::storage::settings::Settings;

const SYSTEM_PROMPT: &str = "You are a senior Linux operations engineer experienced in deploying \
web applications (Python/Flask/Django). Troubleshoot the deployment error below:
1. First explain the cause of the error;
2. Then give concrete Linux commands that fix it and can be copied and run as-is;
3. Keep the steps clear enough for a beginner to follow.";

/// Advisor backed by an OpenAI-compatible chat completion API
pub struct ChatAdvisor {
    client: HttpClient,
    settings: Arc<Settings>,
}

impl ChatAdvisor {
    pub fn new(settings: Arc<Settings>) -> Result<Self, AgentError> {
        let client = HttpClient::new(
            &settings.advisor.base_url,
            Duration::from_secs(settings.advisor.timeout_secs),
        )?;
        Ok(Self { client, settings })
    }

    /// Chat request for one error context
    pub fn request(&self, context: &str) -> ChatCompletionRequest {
        let advisor = &self.settings.advisor;
        ChatCompletionRequest {
            model: advisor.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Deployment of a web application hit an error: {}",
                    context
                )),
            ],
            temperature: advisor.temperature,
            max_tokens: advisor.max_tokens,
        }
    }

    async fn complete(&self, context: &str) -> Result<String, AgentError> {
        let api_key = self
            .settings
            .advisor
            .api_key
            .as_ref()
            .ok_or_else(|| AgentError::AdvisorError("no API key configured".to_string()))?;

        let response: ChatCompletionResponse = self
            .client
            .post_json("chat/completions", Some(api_key), &self.request(context))
            .await?;

        response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| AgentError::AdvisorError("empty response".to_string()))
    }
}

#[async_trait]
impl Advisor for ChatAdvisor {
    async fn advise(&self, context: &str) -> String {
        info!(model = %self.settings.advisor.model, "requesting troubleshooting advice");
        match self.complete(context).await {
            Ok(advice) => advice,
            Err(e) => {
                warn!(error = %e, "advisor call failed");
                degraded_advice(&e.to_string())
            }
        }
    }
}

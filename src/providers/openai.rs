use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CorrectionConfig, api_key_from_env};
use crate::error::{Result, JimakuError};
use crate::normalize::CorrectionService;
use super::{failure_details, http_client};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    bearer: String,
}

impl ChatCompletionsClient {
    pub fn new(config: &CorrectionConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env)?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &CorrectionConfig, api_key: String) -> Result<Self> {
        let bearer = match config.api_key_suffix.as_deref() {
            Some(suffix) if !suffix.is_empty() => format!("{}:{}", api_key, suffix),
            _ => api_key,
        };

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            bearer,
        })
    }

    fn failure(status: Option<u16>, message: String) -> JimakuError {
        JimakuError::CorrectionRequestFailed { status, message }
    }
}

#[async_trait]
impl CorrectionService for ChatCompletionsClient {
    async fn correct(&self, system_instruction: &str, user_message: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system_instruction },
                ChatMessage { role: "user", content: user_message },
            ],
        };

        debug!("Sending correction request to: {}", self.endpoint);
        let response = self.client
            .post(&self.endpoint)
            .bearer_auth(&self.bearer)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::failure(None, e.to_string()))?;

        if !response.status().is_success() {
            let (status, message) = failure_details(response).await;
            return Err(Self::failure(Some(status), message));
        }

        let chat: ChatResponse = response.json().await
            .map_err(|e| Self::failure(None, format!("Failed to parse response: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Self::failure(None, "response contains no message content".to_string()))
    }
}

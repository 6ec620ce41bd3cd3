// HTTP clients for the hosted services
//
// - gemini: Files API (upload/get/delete) and generateContent
// - openai: OpenAI-compatible chat completions used for correction
//
// Each client turns transport failures and non-2xx answers into the error
// variant of the stage that called it.

pub mod gemini;
pub mod openai;

use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

pub use gemini::GeminiClient;
pub use openai::ChatCompletionsClient;

use crate::error::{Result, JimakuError};

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| JimakuError::Config(format!("Failed to build HTTP client: {}", e)))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Status code and a readable message for a failed response
pub(crate) async fn failure_details(response: Response) -> (u16, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status.as_u16(), error_message(status.canonical_reason(), &body))
}

/// Both services wrap errors as `{"error": {"message": ...}}`; fall back to
/// the raw body, then the reason phrase
pub(crate) fn error_message(reason: Option<&str>, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let body = body.trim();
    if body.is_empty() {
        reason.unwrap_or("no response body").to_string()
    } else {
        body.to_string()
    }
}

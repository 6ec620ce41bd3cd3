use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::config::{GenerationConfig, api_key_from_env};
use crate::error::{Result, JimakuError};
use crate::generate::{GenerationRequest, GenerationService, RequestPart};
use crate::staging::{AssetState, ContentRef, FileService, RemoteFile};
use super::{failure_details, http_client};

const API_KEY_HEADER: &str = "x-goog-api-key";

// Files API

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: String,
}

impl From<FileResource> for RemoteFile {
    fn from(file: FileResource) -> Self {
        RemoteFile {
            state: AssetState::from_service(&file.state),
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

// generateContent wire format

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
    /// Set on reasoning summaries, which are not part of the answer
    #[serde(default)]
    pub thought: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

impl From<&RequestPart> for Part {
    fn from(part: &RequestPart) -> Self {
        match part {
            RequestPart::Text(text) => Part { text: Some(text.clone()), ..Default::default() },
            RequestPart::Asset { mime_type, content: ContentRef::Remote { uri } } => Part {
                file_data: Some(FileData { mime_type: mime_type.clone(), file_uri: uri.clone() }),
                ..Default::default()
            },
            RequestPart::Asset { mime_type, content: ContentRef::Inline { data } } => Part {
                inline_data: Some(InlineData { mime_type: mime_type.clone(), data: data.clone() }),
                ..Default::default()
            },
        }
    }
}

impl From<&GenerationRequest> for GenerateContentBody {
    fn from(request: &GenerationRequest) -> Self {
        GenerateContentBody {
            contents: vec![Content {
                role: Some("user"),
                parts: request.parts.iter().map(Part::from).collect(),
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: Some(request.system_instruction.clone()), ..Default::default() }],
            },
            generation_config: WireGenerationConfig {
                temperature: request.temperature,
                thinking_config: ThinkingConfig { thinking_budget: request.thinking_budget },
            },
        }
    }
}

/// Client for the Gemini REST API
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// Build a client, reading the key from the configured environment variable
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env)?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn staging_failure(status: Option<u16>, message: String) -> JimakuError {
        JimakuError::StagingRequestFailed { status, message }
    }

    async fn start_upload(&self, display_name: &str, mime_type: &str, size: usize) -> Result<String> {
        let url = format!("{}/upload/v1beta/files", self.endpoint);
        debug!("Starting resumable upload at {}", url);

        let response = self.client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| Self::staging_failure(None, format!("upload start failed: {}", e)))?;

        if !response.status().is_success() {
            let (status, message) = failure_details(response).await;
            return Err(Self::staging_failure(Some(status), message));
        }

        response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Self::staging_failure(None, "upload session has no x-goog-upload-url".to_string()))
    }
}

#[async_trait]
impl FileService for GeminiClient {
    async fn upload(&self, video_path: &Path, display_name: &str, mime_type: &str) -> Result<RemoteFile> {
        let bytes = tokio::fs::read(video_path).await?;
        let upload_url = self.start_upload(display_name, mime_type, bytes.len()).await?;

        debug!("Uploading {} bytes", bytes.len());
        let response = self.client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| Self::staging_failure(None, format!("upload failed: {}", e)))?;

        if !response.status().is_success() {
            let (status, message) = failure_details(response).await;
            return Err(Self::staging_failure(Some(status), message));
        }

        let uploaded: UploadResponse = response.json().await
            .map_err(|e| Self::staging_failure(None, format!("Failed to parse upload response: {}", e)))?;
        Ok(uploaded.file.into())
    }

    async fn get(&self, name: &str) -> Result<RemoteFile> {
        let url = format!("{}/v1beta/{}", self.endpoint, name);
        let response = self.client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| Self::staging_failure(None, format!("state check failed: {}", e)))?;

        if !response.status().is_success() {
            let (status, message) = failure_details(response).await;
            return Err(Self::staging_failure(Some(status), message));
        }

        let file: FileResource = response.json().await
            .map_err(|e| Self::staging_failure(None, format!("Failed to parse file resource: {}", e)))?;
        Ok(file.into())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let url = format!("{}/v1beta/{}", self.endpoint, name);
        let response = self.client
            .delete(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| Self::staging_failure(None, format!("delete failed: {}", e)))?;

        if !response.status().is_success() {
            let (status, message) = failure_details(response).await;
            return Err(Self::staging_failure(Some(status), message));
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate_content(&self, request: &GenerationRequest) -> Result<GenerateContentResponse> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model);
        debug!("Sending generation request to: {}", url);

        let response = self.client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&GenerateContentBody::from(request))
            .send()
            .await
            .map_err(|e| JimakuError::GenerationRequestFailed { status: None, message: e.to_string() })?;

        if !response.status().is_success() {
            let (status, message) = failure_details(response).await;
            return Err(JimakuError::GenerationRequestFailed { status: Some(status), message });
        }

        response.json().await
            .map_err(|e| JimakuError::MalformedGenerationResponse(format!("Failed to parse response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_server::{serve, serve_once, Scripted};
    use assert_fs::prelude::*;

    fn client(endpoint: &str) -> GeminiClient {
        let config = GenerationConfig {
            endpoint: endpoint.to_string(),
            timeout_secs: 5,
            ..GenerationConfig::default()
        };
        GeminiClient::with_api_key(&config, "test-key".to_string()).unwrap()
    }

    fn request(content: ContentRef) -> GenerationRequest {
        GenerationRequest {
            system_instruction: "be a subtitler".to_string(),
            parts: vec![
                RequestPart::Asset { mime_type: "video/mp4".to_string(), content },
                RequestPart::Text("subtitle this".to_string()),
            ],
            temperature: 1.0,
            thinking_budget: 24576,
        }
    }

    #[test]
    fn test_remote_body_shape() {
        let body = serde_json::to_value(GenerateContentBody::from(&request(ContentRef::Remote {
            uri: "https://host/v1beta/files/abc".to_string(),
        })))
        .unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["fileData"]["fileUri"], "https://host/v1beta/files/abc");
        assert_eq!(body["contents"][0]["parts"][0]["fileData"]["mimeType"], "video/mp4");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "subtitle this");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be a subtitler");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 24576);
    }

    #[test]
    fn test_inline_body_shape() {
        let body = serde_json::to_value(GenerateContentBody::from(&request(ContentRef::Inline {
            data: "AAEC".to_string(),
        })))
        .unwrap();

        let part = &body["contents"][0]["parts"][0];
        assert_eq!(part["inlineData"]["data"], "AAEC");
        assert!(part.get("fileData").is_none());
        assert!(part.get("text").is_none());
    }

    #[test]
    fn test_file_resource_mapping() {
        let file: FileResource = serde_json::from_str(
            r#"{"name": "files/abc", "uri": "https://host/v1beta/files/abc", "mimeType": "video/mp4", "state": "PROCESSING"}"#,
        )
        .unwrap();
        let remote: RemoteFile = file.into();
        assert_eq!(remote.state, AssetState::Processing);
        assert_eq!(remote.mime_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_generate_content_parses_candidates() {
        let (base, server) = serve_once(
            200,
            r#"{"candidates": [{"content": {"parts": [{"text": "1\n00:00:00,000 --> 00:00:01,000\n[WIND]\n"}], "role": "model"}, "finishReason": "STOP"}]}"#,
        )
        .await;

        let response = client(&base)
            .generate_content(&request(ContentRef::Remote { uri: "u".to_string() }))
            .await
            .unwrap();
        assert_eq!(response.candidates.len(), 1);
        assert_eq!(response.candidates[0].finish_reason.as_deref(), Some("STOP"));

        let captured = server.await.unwrap();
        assert!(captured.head.starts_with("POST /v1beta/models/gemini-2.5-pro:generateContent"));
        assert!(captured.head.to_lowercase().contains("x-goog-api-key: test-key"));
    }

    #[tokio::test]
    async fn test_generate_content_server_error() {
        let (base, _server) = serve_once(500, r#"{"error": {"code": 500, "message": "Internal error encountered."}}"#).await;

        let err = client(&base)
            .generate_content(&request(ContentRef::Remote { uri: "u".to_string() }))
            .await
            .unwrap_err();
        match err {
            JimakuError::GenerationRequestFailed { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "Internal error encountered.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_maps_state() {
        let (base, server) = serve_once(
            200,
            r#"{"name": "files/abc", "uri": "https://host/v1beta/files/abc", "mimeType": "video/mp4", "state": "ACTIVE"}"#,
        )
        .await;

        let file = client(&base).get("files/abc").await.unwrap();
        assert_eq!(file.state, AssetState::Ready);

        let captured = server.await.unwrap();
        assert!(captured.head.starts_with("GET /v1beta/files/abc"));
    }

    #[tokio::test]
    async fn test_delete_failure_is_staging_error() {
        let (base, _server) = serve_once(404, r#"{"error": {"code": 404, "message": "File not found."}}"#).await;

        let err = client(&base).delete("files/abc").await.unwrap_err();
        assert!(matches!(err, JimakuError::StagingRequestFailed { status: Some(404), .. }));
    }

    const UPLOADED: &str = r#"{"file": {"name": "files/abc", "uri": "https://host/v1beta/files/abc", "mimeType": "video/mp4", "state": "PROCESSING"}}"#;

    fn video_file(temp: &assert_fs::TempDir) -> std::path::PathBuf {
        let video = temp.child("talk.mp4");
        video.write_binary(b"fake video bytes").unwrap();
        video.path().to_path_buf()
    }

    #[tokio::test]
    async fn test_resumable_upload() {
        let temp = assert_fs::TempDir::new().unwrap();
        let video = video_file(&temp);
        let (base, server) = serve(vec![
            Scripted::new(200, "{}").header("X-Goog-Upload-URL", "{base}/upload-session/abc"),
            Scripted::new(200, UPLOADED),
        ])
        .await;

        let file = client(&base).upload(&video, "talk", "video/mp4").await.unwrap();
        assert_eq!(file.name, "files/abc");
        assert_eq!(file.uri, "https://host/v1beta/files/abc");
        assert_eq!(file.state, AssetState::Processing);

        let captured = server.await.unwrap();
        assert_eq!(captured.len(), 2);

        let start = captured[0].head.to_lowercase();
        assert!(start.starts_with("post /upload/v1beta/files"));
        assert!(start.contains("x-goog-api-key: test-key"));
        assert!(start.contains("x-goog-upload-protocol: resumable"));
        assert!(start.contains("x-goog-upload-command: start"));
        assert!(start.contains("x-goog-upload-header-content-length: 16"));
        assert!(start.contains("x-goog-upload-header-content-type: video/mp4"));
        let metadata: serde_json::Value = serde_json::from_slice(&captured[0].body).unwrap();
        assert_eq!(metadata["file"]["display_name"], "talk");

        let finalize = captured[1].head.to_lowercase();
        assert!(finalize.starts_with("post /upload-session/abc"));
        assert!(finalize.contains("x-goog-upload-offset: 0"));
        assert!(finalize.contains("x-goog-upload-command: upload, finalize"));
        assert_eq!(captured[1].body, b"fake video bytes");
    }

    #[tokio::test]
    async fn test_upload_without_session_url() {
        let temp = assert_fs::TempDir::new().unwrap();
        let video = video_file(&temp);
        let (base, server) = serve(vec![Scripted::new(200, "{}")]).await;

        let err = client(&base).upload(&video, "talk", "video/mp4").await.unwrap_err();
        match err {
            JimakuError::StagingRequestFailed { status, message } => {
                assert_eq!(status, None);
                assert!(message.contains("x-goog-upload-url"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // Nothing is sent after the failed start
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_finalize_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();
        let video = video_file(&temp);
        let (base, _server) = serve(vec![
            Scripted::new(200, "{}").header("X-Goog-Upload-URL", "{base}/upload-session/abc"),
            Scripted::new(503, r#"{"error": {"code": 503, "message": "The service is currently unavailable."}}"#),
        ])
        .await;

        let err = client(&base).upload(&video, "talk", "video/mp4").await.unwrap_err();
        match err {
            JimakuError::StagingRequestFailed { status, message } => {
                assert_eq!(status, Some(503));
                assert_eq!(message, "The service is currently unavailable.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

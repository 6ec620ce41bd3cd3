use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn, debug};

use crate::config::GenerationConfig;
use crate::contract::GenerationContract;
use crate::error::{Result, JimakuError};
use crate::providers::gemini::GenerateContentResponse;
use crate::staging::{AssetStager, ContentRef, StagedAsset};

/// One piece of the user turn
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPart {
    Asset { mime_type: String, content: ContentRef },
    Text(String),
}

/// A single multimodal generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub parts: Vec<RequestPart>,
    pub temperature: f32,
    pub thinking_budget: u32,
}

/// The multimodal content-generation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// One round trip. Transport errors and non-2xx statuses surface as
    /// GenerationRequestFailed.
    async fn generate_content(&self, request: &GenerationRequest) -> Result<GenerateContentResponse>;
}

/// Pull the answer text out of the first candidate, skipping reasoning parts
pub fn extract_text(response: &GenerateContentResponse) -> Result<String> {
    let candidate = response.candidates.first().ok_or_else(|| {
        let reason = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
            .unwrap_or_else(|| "no candidates".to_string());
        JimakuError::MalformedGenerationResponse(format!("response has no candidates ({})", reason))
    })?;

    let text: String = candidate
        .content
        .as_ref()
        .map(|content| {
            content.parts
                .iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(JimakuError::MalformedGenerationResponse(format!(
            "first candidate carries no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

/// Turns a staged video into raw subtitle text
pub struct SubtitleGenerator {
    service: Arc<dyn GenerationService>,
    contract: &'static GenerationContract,
    temperature: f32,
    thinking_budget: u32,
}

impl SubtitleGenerator {
    pub fn new(
        service: Arc<dyn GenerationService>,
        contract: &'static GenerationContract,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            service,
            contract,
            temperature: config.temperature,
            thinking_budget: config.thinking_budget,
        }
    }

    pub fn build_request(&self, asset: &StagedAsset) -> GenerationRequest {
        GenerationRequest {
            system_instruction: self.contract.system_instruction.to_string(),
            parts: vec![
                RequestPart::Asset {
                    mime_type: asset.mime_type.clone(),
                    content: asset.content.clone(),
                },
                RequestPart::Text(self.contract.task_instruction.to_string()),
            ],
            temperature: self.temperature,
            thinking_budget: self.thinking_budget,
        }
    }

    /// Generate raw subtitles, then hand the asset back to its stager.
    /// The asset is released whether or not generation succeeded; a failed
    /// release is logged and otherwise ignored.
    pub async fn generate(&self, asset: StagedAsset, stager: &dyn AssetStager) -> Result<String> {
        let request = self.build_request(&asset);
        info!("Generating subtitles (contract {})...", self.contract.version);

        let result = match self.service.generate_content(&request).await {
            Ok(response) => extract_text(&response),
            Err(e) => Err(e),
        };

        let name = asset.name.clone();
        if let Err(e) = stager.release(asset).await {
            warn!("Failed to release staged asset {}: {}", name, e);
        }

        let raw = result?;
        debug!("Raw subtitles:\n{}", raw);
        info!("Received {} characters of raw subtitles", raw.len());
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::GENERATION_CONTRACT;
    use crate::providers::gemini::{Candidate, CandidateContent, ResponsePart};
    use crate::staging::{AssetState, MockAssetStager};

    fn remote_asset() -> StagedAsset {
        StagedAsset {
            name: "files/abc-123".to_string(),
            mime_type: "video/mp4".to_string(),
            content: ContentRef::Remote { uri: "https://example.test/files/abc-123".to_string() },
            state: AssetState::Ready,
        }
    }

    fn text_response(parts: Vec<ResponsePart>) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(CandidateContent { parts }),
                finish_reason: Some("STOP".to_string()),
            }],
            prompt_feedback: None,
        }
    }

    fn text_part(text: &str, thought: bool) -> ResponsePart {
        ResponsePart { text: Some(text.to_string()), thought }
    }

    fn generator(service: MockGenerationService) -> SubtitleGenerator {
        SubtitleGenerator::new(Arc::new(service), &GENERATION_CONTRACT, &GenerationConfig::default())
    }

    #[test]
    fn test_request_shape() {
        let generator = generator(MockGenerationService::new());
        let request = generator.build_request(&remote_asset());

        assert_eq!(request.system_instruction, GENERATION_CONTRACT.system_instruction);
        assert_eq!(request.parts.len(), 2);
        assert!(matches!(&request.parts[0], RequestPart::Asset { mime_type, content: ContentRef::Remote { .. } } if mime_type == "video/mp4"));
        assert_eq!(request.parts[1], RequestPart::Text(GENERATION_CONTRACT.task_instruction.to_string()));
        assert_eq!(request.thinking_budget, 24576);
    }

    #[test]
    fn test_extract_skips_thoughts() {
        let response = text_response(vec![
            text_part("Let me watch the clip first.", true),
            text_part("1\n00:00:00,000 --> 00:00:01,000\n[WIND]\n", false),
        ]);
        assert_eq!(extract_text(&response).unwrap(), "1\n00:00:00,000 --> 00:00:01,000\n[WIND]\n");
    }

    #[test]
    fn test_extract_without_candidates() {
        let response = GenerateContentResponse::default();
        assert!(matches!(extract_text(&response), Err(JimakuError::MalformedGenerationResponse(_))));
    }

    #[tokio::test]
    async fn test_generate_releases_after_success() {
        let mut service = MockGenerationService::new();
        service.expect_generate_content()
            .times(1)
            .returning(|_| Ok(text_response(vec![text_part("1\n00:00:00,000 --> 00:00:01,000\nHi\n", false)])));

        let mut stager = MockAssetStager::new();
        stager.expect_release()
            .withf(|asset| asset.name == "files/abc-123")
            .times(1)
            .returning(|_| Ok(()));

        let raw = generator(service).generate(remote_asset(), &stager).await.unwrap();
        assert!(raw.contains("Hi"));
    }

    #[tokio::test]
    async fn test_release_failure_is_swallowed() {
        let mut service = MockGenerationService::new();
        service.expect_generate_content()
            .returning(|_| Ok(text_response(vec![text_part("1\n00:00:00,000 --> 00:00:01,000\nHi\n", false)])));

        let mut stager = MockAssetStager::new();
        stager.expect_release()
            .returning(|_| Err(JimakuError::StagingRequestFailed { status: Some(404), message: "gone".to_string() }));

        assert!(generator(service).generate(remote_asset(), &stager).await.is_ok());
    }

    #[tokio::test]
    async fn test_service_error_still_releases() {
        let mut service = MockGenerationService::new();
        service.expect_generate_content()
            .times(1)
            .returning(|_| Err(JimakuError::GenerationRequestFailed {
                status: Some(500),
                message: "internal".to_string(),
            }));

        let mut stager = MockAssetStager::new();
        stager.expect_release().times(1).returning(|_| Ok(()));

        let err = generator(service).generate(remote_asset(), &stager).await.unwrap_err();
        assert!(matches!(err, JimakuError::GenerationRequestFailed { status: Some(500), .. }));
    }

    #[tokio::test]
    async fn test_empty_answer_is_malformed() {
        let mut service = MockGenerationService::new();
        service.expect_generate_content()
            .returning(|_| Ok(text_response(vec![text_part("thinking only", true)])));

        let mut stager = MockAssetStager::new();
        stager.expect_release().returning(|_| Ok(()));

        let err = generator(service).generate(remote_asset(), &stager).await.unwrap_err();
        assert!(matches!(err, JimakuError::MalformedGenerationResponse(_)));
    }
}

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn, debug};

use crate::contract::CorrectionContract;
use crate::error::Result;
use crate::quality::QualityValidator;
use crate::subtitle::SubtitleDocument;

/// A text-only chat service used to repair raw subtitles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CorrectionService: Send + Sync {
    /// One round trip returning the assistant's reply. Transport errors,
    /// non-2xx statuses and empty replies surface as CorrectionRequestFailed.
    async fn correct(&self, system_instruction: &str, user_message: &str) -> Result<String>;
}

/// Corrected subtitles ready to be written
#[derive(Debug, Clone)]
pub struct NormalizedSubtitles {
    /// Text to write to the output file
    pub srt: String,
    /// Present when the corrected text passed structural validation
    pub document: Option<SubtitleDocument>,
}

/// Remove surrounding whitespace and a Markdown code fence around the reply
pub fn sanitize_reply(reply: &str) -> String {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed.to_string();
    };

    warn!("Correction reply was wrapped in a code fence; stripping it");
    // Drop the info string (```srt) on the opening line
    let body = match inner.split_once('\n') {
        Some((_, body)) => body,
        None => inner,
    };
    body.trim().to_string()
}

/// Repairs raw generated subtitles and checks the result
pub struct SubtitleNormalizer {
    service: Arc<dyn CorrectionService>,
    contract: &'static CorrectionContract,
    quality: QualityValidator,
    strict: bool,
}

impl SubtitleNormalizer {
    pub fn new(
        service: Arc<dyn CorrectionService>,
        contract: &'static CorrectionContract,
        max_gap_secs: f64,
        strict: bool,
    ) -> Self {
        Self {
            service,
            contract,
            quality: QualityValidator::new(contract.limits, max_gap_secs),
            strict,
        }
    }

    pub async fn normalize(&self, raw: &str) -> Result<NormalizedSubtitles> {
        info!("Correcting subtitles (contract {})...", self.contract.version);

        let reply = self.service
            .correct(self.contract.system_instruction, &self.contract.user_message(raw))
            .await?;
        let corrected = sanitize_reply(&reply);
        debug!("Corrected subtitles:\n{}", corrected);

        self.check(corrected)
    }

    /// Validate corrected text against the contract. Strict mode rejects
    /// structural problems; otherwise they are logged and the text is kept.
    pub fn check(&self, corrected: String) -> Result<NormalizedSubtitles> {
        let parsed = SubtitleDocument::parse(&corrected)
            .and_then(|doc| doc.validate(self.contract.limits.max_lines).map(|_| doc));

        match parsed {
            Ok(document) => {
                self.report_quality(&document);
                info!("Subtitles validated: {} blocks", document.len());
                Ok(NormalizedSubtitles {
                    srt: document.to_srt(),
                    document: Some(document),
                })
            }
            Err(e) if self.strict => Err(e.into()),
            Err(e) => {
                warn!("Corrected subtitles are not well-formed SRT ({}); keeping them as returned", e);
                let mut srt = corrected;
                srt.push('\n');
                Ok(NormalizedSubtitles { srt, document: None })
            }
        }
    }

    fn report_quality(&self, document: &SubtitleDocument) {
        let report = self.quality.assess(document);
        if report.is_clean() {
            return;
        }
        warn!("{} readability issue(s) in {} blocks", report.issues.len(), report.blocks);
        for issue in &report.issues {
            warn!("  {}", issue);
        }
    }
}

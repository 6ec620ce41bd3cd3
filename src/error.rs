use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JimakuError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No video stream found in {0}")]
    NoVideoStream(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Staging request failed ({}): {message}", status_label(.status))]
    StagingRequestFailed { status: Option<u16>, message: String },

    #[error("Staged asset {name} failed processing at the generation service")]
    AssetProcessingFailed { name: String },

    #[error("Staged asset {name} still processing after {waited:?}")]
    AssetProcessingTimeout { name: String, waited: Duration },

    #[error("Generation request failed ({}): {message}", status_label(.status))]
    GenerationRequestFailed { status: Option<u16>, message: String },

    #[error("Malformed generation response: {0}")]
    MalformedGenerationResponse(String),

    #[error("Correction request failed ({}): {message}", status_label(.status))]
    CorrectionRequestFailed { status: Option<u16>, message: String },
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "transport".to_string(),
    }
}

impl JimakuError {
    /// Whether the pipeline may continue past this error with its input unchanged
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::UnsupportedFormat(_))
    }
}

pub type Result<T> = std::result::Result<T, JimakuError>;

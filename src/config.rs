use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use crate::error::{Result, JimakuError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub correction: CorrectionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    /// Videos taller than this are downscaled before staging
    pub target_height: u32,
    /// x264 preset used for the downscale (ultrafast, fast, medium, ...)
    pub preset: String,
    /// x264 constant rate factor (0-51, lower = better quality)
    pub crf: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingMode {
    /// Remote: upload to the Files API and poll until the file is active
    Remote,
    /// Inline: embed the video bytes as base64 in the request itself
    Inline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub mode: StagingMode,
    /// Seconds between remote state checks
    pub poll_interval_secs: u64,
    /// Upper bound on the total time spent waiting for remote processing
    pub max_wait_secs: u64,
    /// Largest file accepted by the inline strategy
    pub inline_max_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of the Gemini REST API
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    /// Reasoning token budget; 0 disables thinking
    pub thinking_budget: u32,
    pub timeout_secs: u64,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Chat completions URL
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Appended to the bearer token as `<key>:<suffix>` when set
    pub api_key_suffix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject corrected output that does not parse as well-formed SRT
    pub strict: bool,
    /// Silent stretches longer than this are reported
    pub max_gap_secs: f64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            probe_path: "ffprobe".to_string(),
            target_height: 480,
            preset: "fast".to_string(),
            crf: 23,
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            mode: StagingMode::Remote,
            poll_interval_secs: 5,
            max_wait_secs: 300,
            inline_max_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-pro".to_string(),
            temperature: 1.0,
            thinking_budget: 24576,
            timeout_secs: 600,
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://llmfoundry.straive.com/openai/v1/chat/completions".to_string(),
            model: "gpt-4.1-mini".to_string(),
            timeout_secs: 300,
            api_key_env: "LLMFOUNDRY_API_KEY".to_string(),
            api_key_suffix: Some("caption-generator".to_string()),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict: true,
            max_gap_secs: 10.0,
        }
    }
}

impl StagingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Read an API key from the named environment variable
pub fn api_key_from_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(JimakuError::Config(format!(
            "{} is not set in environment variables",
            var
        ))),
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| JimakuError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| JimakuError::Config(format!("Failed to parse config file: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| JimakuError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| JimakuError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn check(&self) -> Result<()> {
        if self.media.target_height == 0 || self.media.target_height % 2 != 0 {
            return Err(JimakuError::Config(format!(
                "media.target_height must be a positive even number, got {}",
                self.media.target_height
            )));
        }
        if self.media.crf > 51 {
            return Err(JimakuError::Config(format!(
                "media.crf must be within 0-51, got {}",
                self.media.crf
            )));
        }
        if self.staging.poll_interval_secs == 0 {
            return Err(JimakuError::Config("staging.poll_interval_secs must be greater than zero".to_string()));
        }
        if self.validation.max_gap_secs <= 0.0 {
            return Err(JimakuError::Config("validation.max_gap_secs must be greater than zero".to_string()));
        }
        Ok(())
    }
}

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, debug};

use crate::config::MediaConfig;
use crate::error::{Result, JimakuError};
use super::{MediaProcessorTrait, MediaCommandBuilder, VideoDimensions};

/// ffprobe `-of json` output, reduced to what the pipeline reads
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Pick the first video stream out of raw ffprobe JSON
pub fn parse_probe_output(json: &str, video_path: &Path) -> Result<VideoDimensions> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| JimakuError::Media(format!(
            "Failed to parse ffprobe output for {}: {}",
            video_path.display(), e
        )))?;

    let stream = probe.streams
        .into_iter()
        .find(|s| s.codec_type.as_deref().unwrap_or("video") == "video")
        .ok_or_else(|| JimakuError::NoVideoStream(video_path.display().to_string()))?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) => Ok(VideoDimensions { width, height }),
        _ => Err(JimakuError::Media(format!(
            "ffprobe did not report dimensions for {}",
            video_path.display()
        ))),
    }
}

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, &config.probe_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn probe_video(&self, video_path: &Path) -> Result<VideoDimensions> {
        debug!("Probing video streams of {}", video_path.display());

        let stdout = self.command_builder
            .probe_video_streams(video_path)
            .execute()
            .await?;

        let dimensions = parse_probe_output(&stdout, video_path)?;
        debug!("Probed {}x{}", dimensions.width, dimensions.height);
        Ok(dimensions)
    }

    async fn downscale(&self, input_path: &Path, output_path: &Path, height: u32) -> Result<()> {
        info!("Compressing {} to {}p -> {}",
              input_path.display(), height, output_path.display());

        self.command_builder
            .downscale(input_path, output_path, height, &self.config.preset, self.config.crf)
            .execute()
            .await?;

        info!("Compression completed");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder.version_check().execute().await
            .map_err(|e| JimakuError::Media(format!("ffmpeg not available: {}", e)))?;
        self.command_builder.probe_version_check().execute().await
            .map_err(|e| JimakuError::Media(format!("ffprobe not available: {}", e)))?;

        info!("Media processor is available");
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let stdout = self.command_builder.version_check().execute().await?;
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{"programs": [], "streams": [{"codec_type": "video", "width": 1280, "height": 720}]}"#;
        let dims = parse_probe_output(json, Path::new("clip.mp4")).unwrap();
        assert_eq!(dims, VideoDimensions { width: 1280, height: 720 });
    }

    #[test]
    fn test_parse_probe_output_without_video() {
        let json = r#"{"programs": [], "streams": []}"#;
        let err = parse_probe_output(json, Path::new("song.mp4")).unwrap_err();
        assert!(matches!(err, JimakuError::NoVideoStream(path) if path == "song.mp4"));
    }

    #[test]
    fn test_parse_probe_output_skips_non_video() {
        let json = r#"{"streams": [
            {"codec_type": "audio"},
            {"codec_type": "video", "width": 640, "height": 360}
        ]}"#;
        let dims = parse_probe_output(json, Path::new("clip.mp4")).unwrap();
        assert_eq!(dims.height, 360);
    }

    #[test]
    fn test_parse_probe_output_garbage() {
        let err = parse_probe_output("not json", Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, JimakuError::Media(_)));
    }
}

// Media inspection and transcoding
//
// - Commands: ffmpeg/ffprobe command builders
// - Processor: the ffmpeg-backed implementation of MediaProcessorTrait
//
// VideoAsset and the supported-format table live here because both the
// compression engine and the staging strategies resolve MIME types.

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Extensions the generation service documents, with the MIME type sent for each
pub const SUPPORTED_FORMATS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpg"),
    ("mov", "video/mov"),
    ("avi", "video/avi"),
    ("flv", "video/x-flv"),
    ("webm", "video/webm"),
    ("wmv", "video/wmv"),
    ("3gp", "video/3gpp"),
    ("3gpp", "video/3gpp"),
];

/// Other common video containers, used only to guess a MIME type
const GUESSABLE_FORMATS: &[(&str, &str)] = &[
    ("mkv", "video/x-matroska"),
    ("ogv", "video/ogg"),
    ("ts", "video/mp2t"),
    ("qt", "video/quicktime"),
];

const FALLBACK_MIME_TYPE: &str = "video/mp4";

/// Lowercased extension of a path, without the dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

pub fn is_supported_format(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| SUPPORTED_FORMATS.iter().any(|(known, _)| *known == ext))
        .unwrap_or(false)
}

/// Resolve the MIME type sent alongside a staged video
pub fn mime_type_for(path: &Path) -> &'static str {
    let Some(ext) = extension_of(path) else {
        return FALLBACK_MIME_TYPE;
    };

    SUPPORTED_FORMATS
        .iter()
        .chain(GUESSABLE_FORMATS.iter())
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(FALLBACK_MIME_TYPE)
}

/// Pixel size of the first video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

/// A video file plus what has been learned about it. Never mutated after
/// probing; compression yields a new asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAsset {
    path: PathBuf,
    extension: Option<String>,
    mime_type: &'static str,
    dimensions: Option<VideoDimensions>,
}

impl VideoAsset {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let extension = extension_of(&path);
        let mime_type = mime_type_for(&path);
        Self {
            path,
            extension,
            mime_type,
            dimensions: None,
        }
    }

    pub fn probed(self, dimensions: VideoDimensions) -> Self {
        Self {
            dimensions: Some(dimensions),
            ..self
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn dimensions(&self) -> Option<VideoDimensions> {
        self.dimensions
    }

    pub fn is_supported(&self) -> bool {
        is_supported_format(&self.path)
    }

    /// Sibling path carrying the `_compressed` suffix
    pub fn compressed_path(&self) -> PathBuf {
        let stem = self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = match self.path.extension() {
            Some(ext) => format!("{}_compressed.{}", stem, ext.to_string_lossy()),
            None => format!("{}_compressed", stem),
        };
        self.path.with_file_name(file_name)
    }
}

/// Main trait for media processing operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Probe the first video stream; fails with NoVideoStream when there is none
    async fn probe_video(&self, video_path: &Path) -> Result<VideoDimensions>;

    /// Re-encode to a fixed height, preserving aspect ratio
    async fn downscale(&self, input_path: &Path, output_path: &Path, height: u32) -> Result<()>;

    /// Check if media processor is available
    async fn check_availability(&self) -> Result<()>;

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}

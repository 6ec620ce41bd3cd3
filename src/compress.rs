use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Result, JimakuError};
use crate::media::{MediaProcessorTrait, VideoAsset};

/// What the compression engine decided for one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionOutcome {
    /// Extension outside the supported set; handed on untouched
    Unsupported(VideoAsset),
    /// Already at or below the target height
    Unchanged(VideoAsset),
    /// A new `_compressed` file was written next to the input
    Compressed { source: VideoAsset, output: VideoAsset },
}

impl CompressionOutcome {
    /// The asset the rest of the pipeline should stage
    pub fn asset(&self) -> &VideoAsset {
        match self {
            Self::Unsupported(asset) | Self::Unchanged(asset) => asset,
            Self::Compressed { output, .. } => output,
        }
    }

    pub fn path(&self) -> &Path {
        self.asset().path()
    }

    /// Path of the artifact this decision created, if any
    pub fn created_artifact(&self) -> Option<&Path> {
        match self {
            Self::Compressed { output, .. } => Some(output.path()),
            _ => None,
        }
    }
}

/// Decides whether a video must be downscaled before it is staged
pub struct CompressionEngine {
    media: Arc<dyn MediaProcessorTrait>,
    target_height: u32,
}

impl CompressionEngine {
    pub fn new(media: Arc<dyn MediaProcessorTrait>, target_height: u32) -> Self {
        Self { media, target_height }
    }

    /// `decide(path) -> path'`; idempotent for inputs already at or below the target
    pub async fn decide<P: AsRef<Path>>(&self, video_path: P) -> Result<CompressionOutcome> {
        let asset = VideoAsset::new(video_path.as_ref());

        if let Err(e) = Self::check_format(&asset) {
            if e.is_pass_through() {
                warn!("{}, skipping compression", e);
                return Ok(CompressionOutcome::Unsupported(asset));
            }
            return Err(e);
        }

        let dimensions = self.media.probe_video(asset.path()).await?;
        let source = asset.probed(dimensions);

        if dimensions.height <= self.target_height {
            info!("Video is {}p or lower, skipping compression", self.target_height);
            return Ok(CompressionOutcome::Unchanged(source));
        }

        let output_path = source.compressed_path();
        self.media.downscale(source.path(), &output_path, self.target_height).await?;

        let output = self.verify_output(&source, output_path).await?;
        info!("Video compressed to {}p: {}", self.target_height, output.path().display());

        Ok(CompressionOutcome::Compressed { source, output })
    }

    fn check_format(asset: &VideoAsset) -> Result<()> {
        if asset.is_supported() {
            Ok(())
        } else {
            let ext = asset.extension().map(|e| format!(".{}", e)).unwrap_or_default();
            Err(JimakuError::UnsupportedFormat(format!(
                "'{}' ({})",
                ext,
                asset.path().display()
            )))
        }
    }

    async fn verify_output(&self, source: &VideoAsset, output_path: PathBuf) -> Result<VideoAsset> {
        let dimensions = self.media.probe_video(&output_path).await?;

        if dimensions.height != self.target_height {
            return Err(JimakuError::Media(format!(
                "Compressed output {} is {}p, expected {}p",
                output_path.display(), dimensions.height, self.target_height
            )));
        }

        if let Some(original) = source.dimensions() {
            let expected_width = original.width as f64 * self.target_height as f64 / original.height as f64;
            // -2 rounds the width to an even number, so one pixel of drift is expected
            if (dimensions.width as f64 - expected_width).abs() > 1.0 {
                return Err(JimakuError::Media(format!(
                    "Compressed output {} is {}px wide, expected {:.1}px to keep the aspect ratio",
                    output_path.display(), dimensions.width, expected_width
                )));
            }
        }

        Ok(VideoAsset::new(output_path).probed(dimensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MockMediaProcessorTrait, VideoDimensions};

    fn engine(media: MockMediaProcessorTrait) -> CompressionEngine {
        CompressionEngine::new(Arc::new(media), 480)
    }

    #[tokio::test]
    async fn test_small_video_is_left_alone() {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_video()
            .times(2)
            .returning(|_| Ok(VideoDimensions { width: 854, height: 480 }));
        media.expect_downscale().never();

        let engine = engine(media);
        let first = engine.decide("/videos/clip.mp4").await.unwrap();
        let second = engine.decide(first.path()).await.unwrap();

        assert_eq!(first.path(), Path::new("/videos/clip.mp4"));
        assert_eq!(second.path(), first.path());
        assert!(matches!(first, CompressionOutcome::Unchanged(_)));
        assert_eq!(first.created_artifact(), None);
    }

    #[tokio::test]
    async fn test_720p_is_compressed_to_480p() {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_video()
            .withf(|p| p == Path::new("/videos/clip.mp4"))
            .returning(|_| Ok(VideoDimensions { width: 1280, height: 720 }));
        media.expect_downscale()
            .withf(|input, output, height| {
                input == Path::new("/videos/clip.mp4")
                    && output == Path::new("/videos/clip_compressed.mp4")
                    && *height == 480
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        media.expect_probe_video()
            .withf(|p| p == Path::new("/videos/clip_compressed.mp4"))
            .returning(|_| Ok(VideoDimensions { width: 854, height: 480 }));

        let outcome = engine(media).decide("/videos/clip.mp4").await.unwrap();

        assert_eq!(outcome.path(), Path::new("/videos/clip_compressed.mp4"));
        assert_eq!(outcome.asset().dimensions().map(|d| d.height), Some(480));
        assert_eq!(outcome.created_artifact(), Some(Path::new("/videos/clip_compressed.mp4")));
    }

    #[tokio::test]
    async fn test_wrong_output_height_is_an_error() {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_video()
            .withf(|p| p == Path::new("in.mov"))
            .returning(|_| Ok(VideoDimensions { width: 1920, height: 1080 }));
        media.expect_downscale().returning(|_, _, _| Ok(()));
        media.expect_probe_video()
            .withf(|p| p == Path::new("in_compressed.mov"))
            .returning(|_| Ok(VideoDimensions { width: 1920, height: 1080 }));

        let err = engine(media).decide("in.mov").await.unwrap_err();
        assert!(matches!(err, JimakuError::Media(_)));
    }

    #[tokio::test]
    async fn test_aspect_drift_is_an_error() {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_video()
            .withf(|p| p == Path::new("wide.mp4"))
            .returning(|_| Ok(VideoDimensions { width: 1920, height: 1080 }));
        media.expect_downscale().returning(|_, _, _| Ok(()));
        media.expect_probe_video()
            .withf(|p| p == Path::new("wide_compressed.mp4"))
            .returning(|_| Ok(VideoDimensions { width: 640, height: 480 }));

        let err = engine(media).decide("wide.mp4").await.unwrap_err();
        match err {
            JimakuError::Media(message) => assert!(message.contains("640px")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_even_rounding_is_within_tolerance() {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_video()
            .withf(|p| p == Path::new("odd.mp4"))
            .returning(|_| Ok(VideoDimensions { width: 1279, height: 720 }));
        media.expect_downscale().returning(|_, _, _| Ok(()));
        media.expect_probe_video()
            .withf(|p| p == Path::new("odd_compressed.mp4"))
            .returning(|_| Ok(VideoDimensions { width: 852, height: 480 }));

        let outcome = engine(media).decide("odd.mp4").await.unwrap();
        assert_eq!(outcome.asset().dimensions(), Some(VideoDimensions { width: 852, height: 480 }));
    }

    #[tokio::test]
    async fn test_unsupported_extension_passes_through() {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_video().never();
        media.expect_downscale().never();

        let outcome = engine(media).decide("/videos/notes.txt").await.unwrap();

        assert!(matches!(outcome, CompressionOutcome::Unsupported(_)));
        assert_eq!(outcome.path(), Path::new("/videos/notes.txt"));
    }

    #[tokio::test]
    async fn test_missing_video_stream_fails() {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_probe_video()
            .returning(|p| Err(JimakuError::NoVideoStream(p.display().to_string())));

        let err = engine(media).decide("podcast.mp4").await.unwrap_err();
        assert!(matches!(err, JimakuError::NoVideoStream(_)));
    }
}

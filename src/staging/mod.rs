// Asset staging
//
// Makes a local video consumable by the generation service. Two strategies
// share one trait:
// - Remote: upload through the Files API, poll until the file is active,
//   delete it once generation is done
// - Inline: base64-encode the bytes into the request; nothing to poll or delete
//
// Callers hold a `Box<dyn AssetStager>` and never branch on the strategy.

pub mod inline;
pub mod remote;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use inline::InlineStager;
pub use remote::{FileService, RemoteFile, RemoteStager};

use crate::config::{StagingConfig, StagingMode};
use crate::error::{Result, JimakuError};
use crate::poll::Clock;

/// Lifecycle of a staged asset: Uploading -> Processing -> Ready, or -> Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Uploading,
    Processing,
    Ready,
    Failed,
}

impl AssetState {
    /// Map the Files API `state` field
    pub fn from_service(state: &str) -> Self {
        match state {
            "ACTIVE" => Self::Ready,
            "FAILED" => Self::Failed,
            "PROCESSING" => Self::Processing,
            _ => Self::Uploading,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

/// How the generation request refers to the video
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    /// URI of a file hosted by the generation service
    Remote { uri: String },
    /// Base64 of the whole file
    Inline { data: String },
}

/// Video content as the generation service understands it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub name: String,
    pub mime_type: String,
    pub content: ContentRef,
    pub state: AssetState,
}

impl StagedAsset {
    pub fn is_remote(&self) -> bool {
        matches!(self.content, ContentRef::Remote { .. })
    }
}

/// Capability shared by both staging strategies
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetStager: Send + Sync {
    /// Stage a local video; the returned asset is Ready
    async fn stage(&self, video_path: &Path) -> Result<StagedAsset>;

    /// Give the asset back. Consumes it, so an asset is released at most once.
    async fn release(&self, asset: StagedAsset) -> Result<()>;

    fn mode(&self) -> StagingMode;
}

/// Both strategies refuse missing inputs before any network or encoding work
pub(crate) fn ensure_exists(video_path: &Path) -> Result<()> {
    if video_path.is_file() {
        Ok(())
    } else {
        Err(JimakuError::FileNotFound(video_path.display().to_string()))
    }
}

pub(crate) fn display_name(video_path: &Path) -> String {
    video_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

/// Factory for creating stagers
pub struct StagerFactory;

impl StagerFactory {
    pub fn create_stager(
        config: &StagingConfig,
        files: Arc<dyn FileService>,
        clock: Arc<dyn Clock>,
    ) -> Box<dyn AssetStager> {
        match config.mode {
            StagingMode::Remote => Box::new(RemoteStager::new(
                files,
                clock,
                config.poll_interval(),
                config.max_wait(),
            )),
            StagingMode::Inline => Box::new(InlineStager::new(config.inline_max_bytes)),
        }
    }
}

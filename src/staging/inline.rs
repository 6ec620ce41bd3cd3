use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;
use tracing::{info, debug};

use crate::config::StagingMode;
use crate::error::{Result, JimakuError};
use crate::media::mime_type_for;
use super::{AssetStager, AssetState, ContentRef, StagedAsset, display_name, ensure_exists};

/// Embeds the video in the request as base64; Ready as soon as encoding ends
pub struct InlineStager {
    max_bytes: u64,
}

impl InlineStager {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl AssetStager for InlineStager {
    async fn stage(&self, video_path: &Path) -> Result<StagedAsset> {
        ensure_exists(video_path)?;

        let size = tokio::fs::metadata(video_path).await?.len();
        if size > self.max_bytes {
            return Err(JimakuError::Config(format!(
                "{} is {} bytes, over the inline limit of {} bytes; use remote staging",
                video_path.display(), size, self.max_bytes
            )));
        }

        let mime_type = mime_type_for(video_path);
        info!("Encoding {} ({}) inline...", video_path.display(), mime_type);

        let bytes = tokio::fs::read(video_path).await?;
        let data = STANDARD.encode(&bytes);
        debug!("Encoded {} bytes into {} base64 characters", bytes.len(), data.len());

        Ok(StagedAsset {
            name: display_name(video_path),
            mime_type: mime_type.to_string(),
            content: ContentRef::Inline { data },
            state: AssetState::Ready,
        })
    }

    async fn release(&self, asset: StagedAsset) -> Result<()> {
        debug!("Inline asset {} needs no cleanup", asset.name);
        Ok(())
    }

    fn mode(&self) -> StagingMode {
        StagingMode::Inline
    }
}

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, debug};

use crate::config::StagingMode;
use crate::error::{Result, JimakuError};
use crate::media::mime_type_for;
use crate::poll::{Clock, PollOutcome, poll_until};
use super::{AssetStager, AssetState, ContentRef, StagedAsset, display_name, ensure_exists};

/// A file as reported by the hosting service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc-123`
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: AssetState,
}

/// Remote file hosting offered by the generation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileService: Send + Sync {
    async fn upload(&self, video_path: &Path, display_name: &str, mime_type: &str) -> Result<RemoteFile>;

    async fn get(&self, name: &str) -> Result<RemoteFile>;

    async fn delete(&self, name: &str) -> Result<()>;
}

/// Uploads the video and waits for the service to finish processing it
pub struct RemoteStager {
    files: Arc<dyn FileService>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl RemoteStager {
    pub fn new(
        files: Arc<dyn FileService>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Self {
        Self {
            files,
            clock,
            poll_interval,
            max_wait,
        }
    }

    async fn wait_until_processed(&self, file: RemoteFile) -> Result<RemoteFile> {
        let name = file.name.clone();
        let files = self.files.clone();

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Processing {}...", name));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let outcome = poll_until(
            self.clock.as_ref(),
            self.poll_interval,
            self.max_wait,
            file,
            || {
                let files = files.clone();
                let name = name.clone();
                async move { files.get(&name).await }
            },
            |f| f.state.is_terminal(),
        )
        .await;
        spinner.finish_and_clear();

        match outcome? {
            PollOutcome::Done { value, waited, polls } => {
                debug!("{} reached {:?} after {:?} ({} polls)", value.name, value.state, waited, polls);
                if value.state == AssetState::Failed {
                    Err(JimakuError::AssetProcessingFailed { name: value.name })
                } else {
                    Ok(value)
                }
            }
            PollOutcome::TimedOut { last, waited, .. } => {
                Err(JimakuError::AssetProcessingTimeout { name: last.name, waited })
            }
        }
    }
}

#[async_trait]
impl AssetStager for RemoteStager {
    async fn stage(&self, video_path: &Path) -> Result<StagedAsset> {
        ensure_exists(video_path)?;

        let display_name = display_name(video_path);
        let mime_type = mime_type_for(video_path);
        info!("Uploading {} ({})...", display_name, mime_type);

        let uploaded = self.files.upload(video_path, &display_name, mime_type).await?;
        info!("File uploaded as {}. Waiting for processing...", uploaded.name);

        let file = self.wait_until_processed(uploaded).await?;
        info!("File processed successfully");

        Ok(StagedAsset {
            name: file.name,
            mime_type: if file.mime_type.is_empty() { mime_type.to_string() } else { file.mime_type },
            content: ContentRef::Remote { uri: file.uri },
            state: AssetState::Ready,
        })
    }

    async fn release(&self, asset: StagedAsset) -> Result<()> {
        debug!("Deleting remote file {}", asset.name);
        self.files.delete(&asset.name).await?;
        info!("Temporary file {} cleaned up", asset.name);
        Ok(())
    }

    fn mode(&self) -> StagingMode {
        StagingMode::Remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::ManualClock;
    use assert_fs::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn remote_file(state: AssetState) -> RemoteFile {
        RemoteFile {
            name: "files/abc-123".to_string(),
            uri: "https://generativelanguage.googleapis.com/v1beta/files/abc-123".to_string(),
            mime_type: "video/mp4".to_string(),
            state,
        }
    }

    fn stager(files: MockFileService, clock: Arc<ManualClock>) -> RemoteStager {
        RemoteStager::new(
            Arc::new(files),
            clock,
            Duration::from_secs(5),
            Duration::from_secs(300),
        )
    }

    fn video_fixture() -> (assert_fs::TempDir, std::path::PathBuf) {
        let temp = assert_fs::TempDir::new().unwrap();
        let video = temp.child("clip.mp4");
        video.write_binary(b"fake mp4").unwrap();
        let path = video.path().to_path_buf();
        (temp, path)
    }

    #[tokio::test]
    async fn test_ready_after_two_polls() {
        let (_temp, video) = video_fixture();
        let clock = Arc::new(ManualClock::new());
        let polls = Arc::new(AtomicU32::new(0));

        let mut files = MockFileService::new();
        files.expect_upload()
            .withf(|_, name, mime| name == "clip.mp4" && mime == "video/mp4")
            .times(1)
            .returning(|_, _, _| Ok(remote_file(AssetState::Processing)));
        let counter = polls.clone();
        files.expect_get()
            .withf(|name| name == "files/abc-123")
            .returning(move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(remote_file(if n >= 2 { AssetState::Ready } else { AssetState::Processing }))
            });

        let asset = stager(files, clock.clone()).stage(&video).await.unwrap();

        assert_eq!(asset.state, AssetState::Ready);
        assert!(asset.is_remote());
        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert_eq!(clock.now(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_already_active_upload_skips_polling() {
        let (_temp, video) = video_fixture();
        let clock = Arc::new(ManualClock::new());

        let mut files = MockFileService::new();
        files.expect_upload().returning(|_, _, _| Ok(remote_file(AssetState::Ready)));
        files.expect_get().never();

        let asset = stager(files, clock.clone()).stage(&video).await.unwrap();
        assert_eq!(asset.content, ContentRef::Remote {
            uri: "https://generativelanguage.googleapis.com/v1beta/files/abc-123".to_string(),
        });
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_failed_processing() {
        let (_temp, video) = video_fixture();
        let mut files = MockFileService::new();
        files.expect_upload().returning(|_, _, _| Ok(remote_file(AssetState::Processing)));
        files.expect_get().returning(|_| Ok(remote_file(AssetState::Failed)));

        let err = stager(files, Arc::new(ManualClock::new())).stage(&video).await.unwrap_err();
        assert!(matches!(err, JimakuError::AssetProcessingFailed { name } if name == "files/abc-123"));
    }

    #[tokio::test]
    async fn test_never_ready_times_out_at_budget() {
        let (_temp, video) = video_fixture();
        let clock = Arc::new(ManualClock::new());
        let mut files = MockFileService::new();
        files.expect_upload().returning(|_, _, _| Ok(remote_file(AssetState::Processing)));
        files.expect_get().times(60).returning(|_| Ok(remote_file(AssetState::Processing)));

        let err = stager(files, clock.clone()).stage(&video).await.unwrap_err();

        match err {
            JimakuError::AssetProcessingTimeout { waited, .. } => {
                assert_eq!(waited, Duration::from_secs(300));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(clock.now(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_missing_file_makes_no_request() {
        let temp = assert_fs::TempDir::new().unwrap();
        let mut files = MockFileService::new();
        files.expect_upload().never();

        let err = stager(files, Arc::new(ManualClock::new()))
            .stage(&temp.path().join("nope.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, JimakuError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_release_deletes_remote_file() {
        let mut files = MockFileService::new();
        files.expect_delete()
            .withf(|name| name == "files/abc-123")
            .times(1)
            .returning(|_| Ok(()));

        let asset = StagedAsset {
            name: "files/abc-123".to_string(),
            mime_type: "video/mp4".to_string(),
            content: ContentRef::Remote { uri: "uri".to_string() },
            state: AssetState::Ready,
        };
        stager(files, Arc::new(ManualClock::new())).release(asset).await.unwrap();
    }
}

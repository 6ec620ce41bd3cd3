use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn, debug};
use walkdir::WalkDir;

use crate::compress::{CompressionEngine, CompressionOutcome};
use crate::config::Config;
use crate::contract::{CORRECTION_CONTRACT, GENERATION_CONTRACT, SRT_LIMITS};
use crate::error::{Result, JimakuError};
use crate::generate::{GenerationService, SubtitleGenerator};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait, is_supported_format};
use crate::normalize::{CorrectionService, NormalizedSubtitles, SubtitleNormalizer};
use crate::poll::{Clock, TokioClock};
use crate::providers::{ChatCompletionsClient, GeminiClient};
use crate::quality::{QualityReport, QualityValidator};
use crate::staging::{AssetStager, FileService, StagerFactory};
use crate::subtitle::{SubtitleDocument, write_srt};

/// External systems the pipeline talks to
pub struct Collaborators {
    pub media: Arc<dyn MediaProcessorTrait>,
    pub files: Arc<dyn FileService>,
    pub generation: Arc<dyn GenerationService>,
    pub correction: Arc<dyn CorrectionService>,
    pub clock: Arc<dyn Clock>,
}

/// Result of one successful run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub output: PathBuf,
    /// None when lenient validation kept unparseable text
    pub blocks: Option<usize>,
    pub compressed: bool,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct Workflow {
    compressor: CompressionEngine,
    stager: Box<dyn AssetStager>,
    generator: SubtitleGenerator,
    normalizer: SubtitleNormalizer,
}

impl Workflow {
    /// Build the pipeline against the real services. Fails early when ffmpeg
    /// is missing or an API key is not set.
    pub async fn new(config: Config) -> Result<Self> {
        let media = media_processor(&config).await?;
        let gemini = Arc::new(GeminiClient::new(&config.generation)?);
        let correction = Arc::new(ChatCompletionsClient::new(&config.correction)?);

        Ok(Self::with_collaborators(
            &config,
            Collaborators {
                media,
                files: gemini.clone(),
                generation: gemini,
                correction,
                clock: Arc::new(TokioClock::new()),
            },
        ))
    }

    pub fn with_collaborators(config: &Config, collaborators: Collaborators) -> Self {
        Self {
            compressor: CompressionEngine::new(collaborators.media, config.media.target_height),
            stager: StagerFactory::create_stager(&config.staging, collaborators.files, collaborators.clock),
            generator: SubtitleGenerator::new(collaborators.generation, &GENERATION_CONTRACT, &config.generation),
            normalizer: SubtitleNormalizer::new(
                collaborators.correction,
                &CORRECTION_CONTRACT,
                config.validation.max_gap_secs,
                config.validation.strict,
            ),
        }
    }

    /// Run all four stages for one video and write the subtitles
    pub async fn process_single_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        keep_compressed: bool,
    ) -> Result<PipelineReport> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();
        info!("Processing single file: {}", input_path.display());

        if !input_path.exists() {
            return Err(JimakuError::FileNotFound(input_path.display().to_string()));
        }

        // Step 1: Decide on compression
        let outcome = self.compressor.decide(input_path).await?;

        // Step 2: Stage the (possibly compressed) video
        info!("Staging via {:?} strategy", self.stager.mode());
        let asset = self.stager.stage(outcome.path()).await?;

        // Step 3: Generate raw subtitles; the asset is released inside
        let raw = self.generator.generate(asset, self.stager.as_ref()).await?;

        // Step 4: Correct and validate
        let normalized = self.normalizer.normalize(&raw).await?;
        write_srt(&normalized.srt, output_path)?;

        if !keep_compressed {
            remove_artifact(&outcome).await;
        }

        info!("Subtitles written to {}", output_path.display());
        Ok(PipelineReport {
            output: output_path.to_path_buf(),
            blocks: normalized.document.as_ref().map(SubtitleDocument::len),
            compressed: outcome.created_artifact().is_some(),
        })
    }

    /// Process every supported video under a directory, one after another.
    /// A failing file is logged and the batch moves on.
    pub async fn process_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Option<Q>,
        keep_compressed: bool,
    ) -> Result<BatchSummary> {
        let input_dir = input_dir.as_ref();
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(JimakuError::Config("Input path is not a directory".to_string()));
        }

        let output_dir = match output_dir {
            Some(dir) => dir.as_ref().to_path_buf(),
            None => input_dir.to_path_buf(),
        };
        fs::create_dir_all(&output_dir).await?;

        let video_files = find_videos(input_dir);
        info!("Found {} video files to process", video_files.len());

        let mut summary = BatchSummary::default();
        let mut claimed = HashSet::new();
        for (video_path, output_path) in plan_outputs(&video_files, input_dir, &output_dir) {
            if !claimed.insert(output_path.clone()) {
                let reason = format!("{} is already written by another video in this batch", output_path.display());
                warn!("Skipping {}: {}", video_path.display(), reason);
                summary.failed.push((video_path, reason));
                continue;
            }
            match self.process_single_file(&video_path, &output_path, keep_compressed).await {
                Ok(_) => {
                    info!("Successfully processed: {}", video_path.display());
                    summary.succeeded.push(video_path);
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", video_path.display(), e);
                    summary.failed.push((video_path, e.to_string()));
                }
            }
        }

        info!("Batch finished: {} succeeded, {} failed", summary.succeeded.len(), summary.failed.len());
        Ok(summary)
    }
}

/// ffmpeg/ffprobe from config, checked before any work starts
async fn media_processor(config: &Config) -> Result<Arc<dyn MediaProcessorTrait>> {
    let media: Arc<dyn MediaProcessorTrait> =
        Arc::from(MediaProcessorFactory::create_processor(config.media.clone()));
    media.check_availability().await?;
    if let Ok(version) = media.get_version_info().await {
        debug!("Using {}", version);
    }
    Ok(media)
}

/// Delete the `_compressed` file this run created, if any
async fn remove_artifact(outcome: &CompressionOutcome) {
    if let Some(artifact) = outcome.created_artifact() {
        match fs::remove_file(artifact).await {
            Ok(()) => info!("Removed compressed copy {}", artifact.display()),
            Err(e) => warn!("Failed to remove compressed copy {}: {}", artifact.display(), e),
        }
    }
}

/// Supported videos under `dir`, skipping our own `_compressed` outputs
pub fn find_videos(dir: &Path) -> Vec<PathBuf> {
    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_supported_format(p))
        .filter(|p| {
            !p.file_stem()
                .map(|s| s.to_string_lossy().ends_with("_compressed"))
                .unwrap_or(false)
        })
        .collect();
    videos.sort();
    videos
}

/// Pair each video with its subtitle path, mirroring its subdirectory under
/// `output_dir`. Videos sharing a stem in one directory keep their extension
/// (`talk.mp4.srt`, `talk.mov.srt`).
pub fn plan_outputs(videos: &[PathBuf], input_dir: &Path, output_dir: &Path) -> Vec<(PathBuf, PathBuf)> {
    let target = |video: &Path, keep_extension: bool| -> PathBuf {
        let relative = video.strip_prefix(input_dir).unwrap_or(video);
        let dir = match relative.parent() {
            Some(parent) => output_dir.join(parent),
            None => output_dir.to_path_buf(),
        };
        let name = if keep_extension { video.file_name() } else { video.file_stem() };
        let name = name.map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        dir.join(format!("{}.srt", name))
    };

    let mut stems: HashMap<PathBuf, usize> = HashMap::new();
    for video in videos {
        *stems.entry(target(video, false)).or_default() += 1;
    }

    videos
        .iter()
        .map(|video| {
            let plain = target(video, false);
            let output = if stems.get(&plain).copied().unwrap_or(0) > 1 {
                target(video, true)
            } else {
                plain
            };
            (video.clone(), output)
        })
        .collect()
}

/// Run only the compression decision
pub async fn compress_only<P: AsRef<Path>>(config: &Config, input_path: P) -> Result<CompressionOutcome> {
    let media = media_processor(config).await?;
    CompressionEngine::new(media, config.media.target_height)
        .decide(input_path)
        .await
}

/// Run only correction and validation on an existing raw subtitle file
pub async fn normalize_file<P: AsRef<Path>, Q: AsRef<Path>>(
    config: &Config,
    input_path: P,
    output_path: Q,
) -> Result<NormalizedSubtitles> {
    let input_path = input_path.as_ref();
    if !input_path.exists() {
        return Err(JimakuError::FileNotFound(input_path.display().to_string()));
    }
    let raw = fs::read_to_string(input_path).await?;

    let normalizer = SubtitleNormalizer::new(
        Arc::new(ChatCompletionsClient::new(&config.correction)?),
        &CORRECTION_CONTRACT,
        config.validation.max_gap_secs,
        config.validation.strict,
    );
    let normalized = normalizer.normalize(&raw).await?;
    write_srt(&normalized.srt, output_path)?;
    Ok(normalized)
}

/// Parse and validate a subtitle file, returning its readability report
pub async fn validate_file<P: AsRef<Path>>(config: &Config, input_path: P) -> Result<QualityReport> {
    let input_path = input_path.as_ref();
    if !input_path.exists() {
        return Err(JimakuError::FileNotFound(input_path.display().to_string()));
    }
    let text = fs::read_to_string(input_path).await?;

    let document = SubtitleDocument::parse(&text)?;
    document.validate(SRT_LIMITS.max_lines)?;

    Ok(QualityValidator::new(SRT_LIMITS, config.validation.max_gap_secs).assess(&document))
}

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::StagingMode;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// How the video reaches the generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StagingArg {
    /// Upload through the Files API and wait for processing
    Remote,
    /// Embed the bytes as base64 in the request
    Inline,
}

impl From<StagingArg> for StagingMode {
    fn from(arg: StagingArg) -> Self {
        match arg {
            StagingArg::Remote => StagingMode::Remote,
            StagingArg::Inline => StagingMode::Inline,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate subtitles for a single video
    Generate {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        srt: PathBuf,

        /// Staging strategy (overrides the config file)
        #[arg(long, value_enum)]
        staging: Option<StagingArg>,

        /// Keep the downscaled copy next to the input
        #[arg(long)]
        keep_compressed: bool,
    },

    /// Generate subtitles for every video in a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory for SRT files (defaults to the input directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Staging strategy (overrides the config file)
        #[arg(long, value_enum)]
        staging: Option<StagingArg>,

        /// Keep the downscaled copies next to the inputs
        #[arg(long)]
        keep_compressed: bool,
    },

    /// Downscale a video to the target height if it is taller
    Compress {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Correct and validate a raw subtitle file
    Normalize {
        /// Raw subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check an SRT file and report readability issues
    Validate {
        /// SRT file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write the default configuration file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "jimaku.toml")]
        output: PathBuf,
    },
}

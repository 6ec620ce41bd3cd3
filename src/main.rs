//! Jimaku - subtitles straight from video
//!
//! Entry point for the jimaku command line: downscale the video, stage it
//! with the generation service, generate raw subtitles, then correct and
//! validate them into an SRT file.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{info, Level};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jimaku::cli::{Args, Commands};
use jimaku::compress::CompressionOutcome;
use jimaku::config::Config;
use jimaku::workflow::{self, Workflow};

const DEFAULT_CONFIG: &str = "jimaku.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    let _log_guard = setup_logging(args.verbose)?;
    info!("Starting Jimaku");

    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Generate { input, srt, staging, keep_compressed } => {
            if let Some(mode) = staging {
                config.staging.mode = mode.into();
            }
            let workflow = Workflow::new(config).await?;
            let report = workflow.process_single_file(&input, &srt, keep_compressed).await?;

            match report.blocks {
                Some(blocks) => println!("Wrote {} subtitle blocks to {}", blocks, report.output.display()),
                None => println!("Wrote unvalidated subtitles to {}", report.output.display()),
            }
        }
        Commands::Batch { input_dir, output_dir, staging, keep_compressed } => {
            if let Some(mode) = staging {
                config.staging.mode = mode.into();
            }
            let workflow = Workflow::new(config).await?;
            let summary = workflow
                .process_directory(&input_dir, output_dir.as_ref(), keep_compressed)
                .await?;

            println!("{} succeeded, {} failed", summary.succeeded.len(), summary.failed.len());
            for (path, reason) in &summary.failed {
                println!("  {}: {}", path.display(), reason);
            }
        }
        Commands::Compress { input } => {
            info!("Checking resolution of {}", input.display());
            match workflow::compress_only(&config, &input).await? {
                CompressionOutcome::Unsupported(asset) => {
                    println!("Unsupported format, left as is: {}", asset.path().display());
                }
                CompressionOutcome::Unchanged(asset) => {
                    println!("Already {}p or lower: {}", config.media.target_height, asset.path().display());
                }
                CompressionOutcome::Compressed { output, .. } => {
                    println!("Compressed to {}", output.path().display());
                }
            }
        }
        Commands::Normalize { input, output } => {
            let normalized = workflow::normalize_file(&config, &input, &output).await?;
            match normalized.document {
                Some(document) => println!("Wrote {} subtitle blocks to {}", document.len(), output.display()),
                None => println!("Wrote unvalidated subtitles to {}", output.display()),
            }
        }
        Commands::Validate { input } => {
            let report = workflow::validate_file(&config, &input).await?;
            println!("{}: {} blocks, structurally valid", input.display(), report.blocks);
            if report.is_clean() {
                println!("No readability issues");
            } else {
                for issue in &report.issues {
                    println!("  warning: {}", issue);
                }
            }
        }
        Commands::InitConfig { output } => {
            if output.exists() {
                anyhow::bail!("{} already exists", output.display());
            }
            Config::default().save_to_file(&output)?;
            println!("Default configuration written to {}", output.display());
        }
    }

    info!("Jimaku completed successfully");
    Ok(())
}

/// `--config` wins, then `./jimaku.toml`, then built-in defaults
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(config_path) => Ok(Config::from_file(config_path)?),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            info!("Found {} in current directory, loading...", DEFAULT_CONFIG);
            Ok(Config::from_file(DEFAULT_CONFIG)?)
        }
        None => Ok(Config::default()),
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".jimaku").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "jimaku.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("jimaku.log").display());

    Ok(guard)
}

//! Jimaku - subtitles straight from video
//!
//! A four-stage pipeline: downscale the video with ffmpeg, stage it with a
//! multimodal generation service, generate raw SRT, then correct and
//! validate the result with a text model.

pub mod cli;
pub mod config;
pub mod workflow;
pub mod compress;
pub mod staging;
pub mod generate;
pub mod normalize;
pub mod providers;
pub mod contract;
pub mod subtitle;
pub mod media;
pub mod error;
pub mod poll;
pub mod quality;

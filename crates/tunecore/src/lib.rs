//! tunecore - media acquisition pipeline for the tune bot
//!
//! Turns a YouTube link or id into a playable local file (or a previously
//! uploaded Telegram `file_id`) through an ordered fallback chain:
//! upload cache, local cache, remote resolver, yt-dlp probe, yt-dlp download.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, the shared HTTP client, process helpers
//! - `download`: identifiers, stages, and the [`MediaPipeline`] orchestrator
//! - `storage`: the upload cache file

pub mod core;
pub mod download;
pub mod storage;

// Re-export commonly used types for convenience
pub use core::{config, AppError, PipelineConfig};
pub use download::{Acquisition, AcquisitionError, AcquisitionRequest, MediaKind, MediaPipeline, VideoSource};
pub use storage::FileIdStore;

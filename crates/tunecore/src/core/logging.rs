//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Startup diagnostics for the pipeline configuration

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config::PipelineConfig;
use crate::download::cookies::CredentialLocator;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger is already installed
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs which pipeline stages are usable at startup
///
/// Reports:
/// - remote resolver configured or skipped
/// - upload cache configured or skipped
/// - credential file picked for yt-dlp (or the lack of one)
/// - external binaries and artifact directory
pub fn log_pipeline_configuration(config: &PipelineConfig) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🎵 Media pipeline configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    log::info!("📁 Download folder: {}", config.download_dir.display());

    match &config.resolver {
        Some(resolver) => {
            log::info!("✅ Resolver API (song): {}", resolver.song_base);
            if resolver.video_base != resolver.song_base {
                log::info!("✅ Resolver API (video): {}", resolver.video_base);
            }
        }
        None => log::warn!("⚠️  RESOLVER_API_URL / RESOLVER_API_KEY not set - resolver stage will be skipped"),
    }

    match &config.upload {
        Some(upload) => {
            log::info!("✅ Upload cache: channel {} via {}", upload.chat_id, upload.api_base);
            log::info!("   Store: {}", config.upload_cache_path.display());
        }
        None => log::warn!("⚠️  BOT_TOKEN / LOG_CHANNEL_ID not set - upload cache disabled"),
    }

    match CredentialLocator::from_config(config).locate() {
        Some(path) => log::info!("✅ yt-dlp cookies: {}", path.display()),
        None => {
            log::warn!("⚠️  No cookies file found (YTDL_COOKIES_FILE or {}/*.txt)", config.cookies_dir.display());
            log::warn!("   yt-dlp stages will run without authentication");
        }
    }

    log::info!("🔧 yt-dlp: {}  ffmpeg: {}", config.ytdl_bin, config.ffmpeg_bin);
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

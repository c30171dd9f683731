//! HLS → flat file conversion with ffmpeg

use crate::core::config::StageTimeouts;
use crate::core::process::{run_with_timeout, stderr_summary};
use crate::download::error::StageError;
use crate::download::local::{discard_invalid, validate_artifact};
use crate::download::types::{LocalArtifact, MediaKind};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Audio bitrate for HLS → mp3 conversion
const AUDIO_BITRATE: &str = "192k";

#[async_trait]
pub trait StreamTranscoder: Send + Sync {
    /// Convert the stream at `url` into `target`. Success only if the result passes the size check.
    async fn transcode(&self, url: &str, target: &Path, kind: MediaKind) -> Result<LocalArtifact, StageError>;
}

pub struct FfmpegTranscoder {
    bin: String,
    timeouts: StageTimeouts,
}

impl FfmpegTranscoder {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            timeouts: StageTimeouts::default(),
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Audio: re-encode to mp3. Video: remux into mp4 without re-encoding.
    pub fn build_args(url: &str, target: &Path, kind: MediaKind) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-i", url]
            .iter()
            .map(|s| s.to_string())
            .collect();
        match kind {
            MediaKind::Audio => args.extend(
                ["-vn", "-acodec", "libmp3lame", "-ab", AUDIO_BITRATE]
                    .iter()
                    .map(|s| s.to_string()),
            ),
            MediaKind::Video => args.extend(
                ["-c", "copy", "-bsf:a", "aac_adtstoasc"]
                    .iter()
                    .map(|s| s.to_string()),
            ),
        }
        args.push(target.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl StreamTranscoder for FfmpegTranscoder {
    async fn transcode(&self, url: &str, target: &Path, kind: MediaKind) -> Result<LocalArtifact, StageError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::Io(e.to_string()))?;
        }

        let timeout = kind.transfer_timeout(&self.timeouts);
        log::info!("🎚️ ffmpeg: {} -> {} (timeout {}s)", url, target.display(), timeout.as_secs());

        let mut cmd = Command::new(&self.bin);
        cmd.args(Self::build_args(url, target, kind));

        let outcome = match run_with_timeout(&mut cmd, timeout).await {
            Ok(output) if output.status.success() => validate_artifact(target, kind).await,
            Ok(output) => Err(StageError::Process(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_summary(&output)
            ))),
            Err(e) => Err(StageError::from(e)),
        };

        if let Err(ref e) = outcome {
            log::warn!("ffmpeg conversion failed for {}: {}", target.display(), e);
            discard_invalid(target).await;
        }
        outcome
    }
}

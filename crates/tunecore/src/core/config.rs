//! Pipeline configuration
//!
//! Everything the pipeline reads from the environment is collected once into a
//! [`PipelineConfig`] which is then passed to [`MediaPipeline`](crate::download::pipeline::MediaPipeline).
//! Nothing below is a process-wide mutable global.

use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Reads an env var, treating unset, empty and whitespace-only values the same.
fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// `~` expansion for path-valued variables.
fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

/// Timeouts for every network call and external process in the pipeline
pub mod timeouts {
    use std::time::Duration;

    /// Remote resolver request (seconds)
    pub const RESOLVER_SECS: u64 = 20;

    /// Audio fetch / HLS transcode budget (seconds)
    pub const AUDIO_TRANSFER_SECS: u64 = 60;

    /// Video fetch / HLS remux budget (seconds)
    pub const VIDEO_TRANSFER_SECS: u64 = 120;

    /// Any single yt-dlp invocation (seconds)
    pub const EXTRACTOR_SECS: u64 = 240;

    /// Multipart upload to the log channel (seconds)
    pub const UPLOAD_SECS: u64 = 300;

    /// TCP connect timeout for the shared client (seconds)
    pub const CONNECT_SECS: u64 = 30;

    pub fn resolver() -> Duration {
        Duration::from_secs(RESOLVER_SECS)
    }

    pub fn audio_transfer() -> Duration {
        Duration::from_secs(AUDIO_TRANSFER_SECS)
    }

    pub fn video_transfer() -> Duration {
        Duration::from_secs(VIDEO_TRANSFER_SECS)
    }

    pub fn extractor() -> Duration {
        Duration::from_secs(EXTRACTOR_SECS)
    }

    pub fn upload() -> Duration {
        Duration::from_secs(UPLOAD_SECS)
    }

    pub fn connect() -> Duration {
        Duration::from_secs(CONNECT_SECS)
    }
}

/// Per-call time limits handed to every stage. Defaults come from [`timeouts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub resolver: Duration,
    pub audio_transfer: Duration,
    pub video_transfer: Duration,
    pub extractor: Duration,
    pub upload: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            resolver: timeouts::resolver(),
            audio_transfer: timeouts::audio_transfer(),
            video_transfer: timeouts::video_transfer(),
            extractor: timeouts::extractor(),
            upload: timeouts::upload(),
        }
    }
}

/// Artifact validity thresholds
pub mod validation {
    /// An audio artifact must be strictly larger than this to count as complete
    pub const MIN_AUDIO_BYTES: u64 = 50_000;

    /// A video artifact must be strictly larger than this to count as complete
    pub const MIN_VIDEO_BYTES: u64 = 200_000;
}

/// Extractor format expressions
pub mod formats {
    /// Preferred audio format for yt-dlp
    pub const AUDIO: &str = "bestaudio/best";

    /// Preferred video format for yt-dlp (capped at 720p so uploads stay small)
    pub const VIDEO: &str = "best[height<=?720][width<=?1280]";
}

/// Remote conversion service settings. Present only when both a base URL and a key are set.
#[derive(Debug)]
pub struct ResolverConfig {
    /// Base URL for `/song/{id}`
    pub song_base: String,
    /// Base URL for `/video/{id}` (defaults to `song_base`)
    pub video_base: String,
    /// Shared secret sent as the `api` query parameter
    pub api_key: SecretString,
}

/// Bot API credentials for the upload cache. Present only when token and channel are both set.
#[derive(Debug)]
pub struct UploadConfig {
    /// Bot API base, e.g. `https://api.telegram.org`
    pub api_base: String,
    pub bot_token: SecretString,
    /// Private log channel the artifacts are uploaded to
    pub chat_id: String,
}

pub const DEFAULT_BOT_API_URL: &str = "https://api.telegram.org";

/// Log file for the binary (`LOG_FILE_PATH`, default `app.log`)
pub fn log_file_path() -> String {
    non_empty_env("LOG_FILE_PATH").unwrap_or_else(|| "app.log".to_string())
}

/// Full pipeline configuration
#[derive(Debug)]
pub struct PipelineConfig {
    /// Directory artifacts are written to and probed in
    pub download_dir: PathBuf,
    pub resolver: Option<ResolverConfig>,
    pub upload: Option<UploadConfig>,
    /// Flat JSON `{identifier: file_id}` store
    pub upload_cache_path: PathBuf,
    /// yt-dlp binary
    pub ytdl_bin: String,
    /// ffmpeg binary
    pub ffmpeg_bin: String,
    /// Preferred cookies file (checked before `cookies_dir`)
    pub cookies_file: Option<PathBuf>,
    /// Directory searched for `*.txt` cookie files
    pub cookies_dir: PathBuf,
    pub timeouts: StageTimeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let download_dir = PathBuf::from("downloads");
        Self {
            upload_cache_path: download_dir.join("file_ids.json"),
            download_dir,
            resolver: None,
            upload: None,
            ytdl_bin: "yt-dlp".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            cookies_file: None,
            cookies_dir: PathBuf::from("cookies"),
            timeouts: StageTimeouts::default(),
        }
    }
}

impl PipelineConfig {
    /// Builds the configuration from environment variables.
    ///
    /// Missing resolver or upload settings leave the corresponding stage disabled;
    /// they never make this call fail.
    pub fn from_env() -> Self {
        let download_dir = non_empty_env("DOWNLOAD_FOLDER")
            .map(|raw| expand_path(&raw))
            .unwrap_or_else(|| PathBuf::from("downloads"));

        let resolver = match (non_empty_env("RESOLVER_API_URL"), non_empty_env("RESOLVER_API_KEY")) {
            (Some(song_base), Some(key)) => Some(ResolverConfig {
                video_base: non_empty_env("RESOLVER_VIDEO_API_URL").unwrap_or_else(|| song_base.clone()),
                song_base,
                api_key: SecretString::from(key),
            }),
            _ => None,
        };

        let upload = match (non_empty_env("BOT_TOKEN"), non_empty_env("LOG_CHANNEL_ID")) {
            (Some(token), Some(chat_id)) => Some(UploadConfig {
                api_base: non_empty_env("BOT_API_URL").unwrap_or_else(|| DEFAULT_BOT_API_URL.to_string()),
                bot_token: SecretString::from(token),
                chat_id,
            }),
            _ => None,
        };

        let upload_cache_path = non_empty_env("UPLOAD_CACHE_PATH")
            .map(|raw| expand_path(&raw))
            .unwrap_or_else(|| download_dir.join("file_ids.json"));

        Self {
            download_dir,
            resolver,
            upload,
            upload_cache_path,
            ytdl_bin: non_empty_env("YTDL_BIN").unwrap_or_else(|| "yt-dlp".to_string()),
            ffmpeg_bin: non_empty_env("FFMPEG_BIN").unwrap_or_else(|| "ffmpeg".to_string()),
            cookies_file: non_empty_env("YTDL_COOKIES_FILE").map(|raw| expand_path(&raw)),
            cookies_dir: non_empty_env("COOKIES_DIR")
                .map(|raw| expand_path(&raw))
                .unwrap_or_else(|| PathBuf::from("cookies")),
            timeouts: StageTimeouts::default(),
        }
    }

    /// Sets the artifact directory (the upload cache file follows it).
    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self.upload_cache_path = self.download_dir.join("file_ids.json");
        self
    }

    /// Enables the remote resolver for both media kinds.
    #[must_use]
    pub fn with_resolver(mut self, base: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base = base.into();
        self.resolver = Some(ResolverConfig {
            video_base: base.clone(),
            song_base: base,
            api_key: SecretString::from(api_key.into()),
        });
        self
    }

    /// Enables the upload cache.
    #[must_use]
    pub fn with_upload(
        mut self,
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        self.upload = Some(UploadConfig {
            api_base: api_base.into(),
            bot_token: SecretString::from(bot_token.into()),
            chat_id: chat_id.into(),
        });
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

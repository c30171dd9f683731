//! yt-dlp as the local extractor of last resort
//!
//! Four invocations are used by the pipeline and its callers:
//! - `-g` to resolve a direct playable URL without downloading
//! - a full download into the artifact directory
//! - `-J` to dump metadata and the list of available formats
//! - `--flat-playlist --get-id` to list the ids of a playlist
//!
//! Every call is bounded by the extractor timeout and carries `--cookies` when a
//! credential file can be located. Without one the call still runs, unauthenticated.
//!
//! Downloads run in a scratch directory next to the artifacts (`.<stem>.<kind>.work`).
//! Only a finished file with one of the kind's extensions is moved out of it, and
//! the scratch directory is removed whatever the outcome, so a failed
//! post-processing step never leaves a half-converted file for the local probe.

use crate::core::config::{timeouts, PipelineConfig};
use crate::core::process::{run_with_timeout, stderr_summary};
use crate::core::utils::{seconds_to_time, time_to_seconds};
use crate::download::cookies::CredentialLocator;
use crate::download::error::StageError;
use crate::download::types::{MediaKind, TrackDescription};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// stderr noise from `--flat-playlist` that doesn't mean failure
const HIDDEN_VIDEOS_WARNING: &str = "unavailable videos are hidden";

#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Resolve a direct playable URL (`-g`) for the given format expression.
    async fn resolve_url(&self, target: &str, format: &str) -> Result<String, StageError>;

    /// Download the media to `<output_stem>.<ext>` and return the final path.
    async fn download(
        &self,
        target: &str,
        format: &str,
        kind: MediaKind,
        output_stem: &Path,
    ) -> Result<PathBuf, StageError>;

    /// Dump metadata and formats (`-J`).
    async fn probe(&self, target: &str) -> Result<MediaInfo, StageError>;

    /// Ids of the first `limit` entries of a playlist.
    async fn playlist_ids(&self, link: &str, limit: usize) -> Result<Vec<String>, StageError>;
}

/// One entry of `formats` in yt-dlp's JSON dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatInfo {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub format_note: Option<String>,
    /// yt-dlp emits ints, floats or null here
    #[serde(default)]
    pub filesize: Option<f64>,
}

/// Subset of yt-dlp's `-J` output the bot uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    /// `m:ss` form, used when `duration` is missing
    #[serde(default)]
    pub duration_string: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatInfo>,
}

/// Track summary handed to the Telegram layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackDetails {
    pub title: String,
    pub link: String,
    pub id: String,
    pub duration_min: Option<String>,
    pub duration_sec: u64,
    pub thumb: Option<String>,
    pub performer: String,
}

impl MediaInfo {
    /// Sum of every numeric `filesize` across formats; `None` when there are no formats.
    pub fn total_filesize(&self) -> Option<u64> {
        if self.formats.is_empty() {
            return None;
        }
        Some(
            self.formats
                .iter()
                .filter_map(|f| f.filesize)
                .filter(|size| size.is_finite() && *size > 0.0)
                .map(|size| size as u64)
                .sum(),
        )
    }

    /// Formats worth offering to a user: DASH-only entries are dropped.
    pub fn listable_formats(&self) -> Vec<&FormatInfo> {
        self.formats
            .iter()
            .filter(|f| {
                !f.format
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains("dash")
            })
            .collect()
    }

    pub fn performer(&self) -> String {
        self.channel
            .clone()
            .or_else(|| self.uploader.clone())
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "YouTube".to_string())
    }

    pub fn track_description(&self) -> TrackDescription {
        TrackDescription {
            title: self.title.clone(),
            performer: Some(self.performer()),
        }
    }

    pub fn track_details(&self, fallback_link: &str) -> TrackDetails {
        let duration_sec = self
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d as u64)
            .or_else(|| self.duration_string.as_deref().and_then(time_to_seconds));
        TrackDetails {
            title: self.title.clone().unwrap_or_else(|| self.id.clone()),
            link: self.webpage_url.clone().unwrap_or_else(|| fallback_link.to_string()),
            id: self.id.clone(),
            duration_min: duration_sec.map(seconds_to_time),
            duration_sec: duration_sec.unwrap_or(0),
            thumb: self
                .thumbnail
                .as_deref()
                .map(|t| t.split('?').next().unwrap_or(t).to_string()),
            performer: self.performer(),
        }
    }
}

pub struct YtDlpExtractor {
    bin: String,
    credentials: CredentialLocator,
    timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(bin: impl Into<String>, credentials: CredentialLocator) -> Self {
        Self {
            bin: bin.into(),
            credentials,
            timeout: timeouts::extractor(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.ytdl_bin.clone(), CredentialLocator::from_config(config))
            .with_timeout(config.timeouts.extractor)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `--cookies <file>` if one is available.
    async fn cookie_args(&self) -> Vec<String> {
        match self.credentials.locate_async().await {
            Some(path) => vec!["--cookies".to_string(), path.to_string_lossy().to_string()],
            None => {
                log::warn!("yt-dlp: no cookies file available, running without authentication");
                Vec::new()
            }
        }
    }

    pub fn resolve_args(cookies: &[String], target: &str, format: &str) -> Vec<String> {
        let mut args = cookies.to_vec();
        args.extend(
            ["-g", "-f", format, "--no-playlist", "--no-warnings", target]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    pub fn download_args(
        cookies: &[String],
        target: &str,
        format: &str,
        kind: MediaKind,
        output_stem: &Path,
    ) -> Vec<String> {
        let template = format!("{}.%(ext)s", output_stem.to_string_lossy());
        let mut args = cookies.to_vec();
        args.extend(
            [
                "-f",
                format,
                "--no-playlist",
                "--geo-bypass",
                "--no-check-certificate",
                "--no-warnings",
                "--no-simulate",
                "--print",
                "after_move:filepath",
                "-o",
                template.as_str(),
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        if kind == MediaKind::Audio {
            // Keeps the artifact name predictable: <stem>.mp3
            args.extend(
                ["--extract-audio", "--audio-format", "mp3", "--audio-quality", "192K"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }
        args.push(target.to_string());
        args
    }

    pub fn probe_args(cookies: &[String], target: &str) -> Vec<String> {
        let mut args = cookies.to_vec();
        args.extend(["-J", "--no-playlist", "--no-warnings", target].iter().map(|s| s.to_string()));
        args
    }

    pub fn playlist_args(cookies: &[String], link: &str, limit: usize) -> Vec<String> {
        let mut args = vec!["-i".to_string(), "--get-id".to_string(), "--flat-playlist".to_string()];
        args.extend_from_slice(cookies);
        args.extend(
            ["--playlist-end", &limit.to_string(), "--skip-download", link]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<Output, StageError> {
        log::debug!("yt-dlp {}", args.join(" "));
        let mut cmd = Command::new(&self.bin);
        cmd.args(&args);
        run_with_timeout(&mut cmd, self.timeout).await.map_err(StageError::from)
    }

    /// Runs the download inside `work_dir` and moves the result next to `output_stem`.
    async fn download_in(
        &self,
        target: &str,
        format: &str,
        kind: MediaKind,
        output_stem: &Path,
        work_dir: &Path,
    ) -> Result<PathBuf, StageError> {
        let (Some(dir), Some(stem)) = (output_stem.parent(), output_stem.file_name()) else {
            return Err(StageError::Io(format!("invalid output path {}", output_stem.display())));
        };
        let work_stem = work_dir.join(stem);

        let args = Self::download_args(&self.cookie_args().await, target, format, kind, &work_stem);
        log::info!("📼 yt-dlp download: {} (format {})", target, format);
        let output = self.run(args).await?;

        if !output.status.success() {
            return Err(StageError::Process(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr_summary(&output)
            )));
        }

        let printed = match stdout_lines(&output).pop().map(PathBuf::from) {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => Some(path),
            _ => None,
        };
        let produced = match printed {
            Some(path) => path,
            None => find_downloaded_file(&work_stem).await.ok_or_else(|| {
                StageError::Process(format!("yt-dlp produced no file for {}", output_stem.display()))
            })?,
        };

        if !has_kind_extension(&produced, kind) {
            return Err(StageError::Process(format!(
                "yt-dlp produced {} instead of {}",
                produced.display(),
                kind.extensions().join("/")
            )));
        }

        let file_name = produced
            .file_name()
            .ok_or_else(|| StageError::Process(format!("yt-dlp printed a bare path {}", produced.display())))?;
        let final_path = dir.join(file_name);
        tokio::fs::rename(&produced, &final_path)
            .await
            .map_err(|e| StageError::Io(format!("Failed to move {} into place: {}", produced.display(), e)))?;
        Ok(final_path)
    }
}

/// Non-empty, trimmed stdout lines.
fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Finds `<stem>.<anything>` in the stem's directory when yt-dlp printed no path.
async fn find_downloaded_file(output_stem: &Path) -> Option<PathBuf> {
    let dir = output_stem.parent()?;
    let prefix = format!("{}.", output_stem.file_name()?.to_string_lossy());

    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut found = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl") {
            found.push(entry.path());
        }
    }
    found.sort();
    found.pop()
}

/// Scratch directory for one download of `<dir>/<stem>`.
fn work_dir(output_stem: &Path, kind: MediaKind) -> Result<PathBuf, StageError> {
    match (output_stem.parent(), output_stem.file_name()) {
        (Some(dir), Some(stem)) => Ok(dir.join(format!(".{}.{}.work", stem.to_string_lossy(), kind.label()))),
        _ => Err(StageError::Io(format!("invalid output path {}", output_stem.display()))),
    }
}

fn has_kind_extension(path: &Path, kind: MediaKind) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| kind.extensions().contains(&ext.as_str()))
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn resolve_url(&self, target: &str, format: &str) -> Result<String, StageError> {
        let args = Self::resolve_args(&self.cookie_args().await, target, format);
        let output = self.run(args).await?;

        match stdout_lines(&output).into_iter().next() {
            Some(url) if output.status.success() => Ok(url),
            _ => Err(StageError::Process(format!("yt-dlp -g: {}", stderr_summary(&output)))),
        }
    }

    async fn download(
        &self,
        target: &str,
        format: &str,
        kind: MediaKind,
        output_stem: &Path,
    ) -> Result<PathBuf, StageError> {
        let work_dir = work_dir(output_stem, kind)?;
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| StageError::Io(format!("{}: {}", work_dir.display(), e)))?;

        let outcome = self.download_in(target, format, kind, output_stem, &work_dir).await;

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            log::warn!("Failed to remove {}: {}", work_dir.display(), e);
        }
        outcome
    }

    async fn probe(&self, target: &str) -> Result<MediaInfo, StageError> {
        let args = Self::probe_args(&self.cookie_args().await, target);
        let output = self.run(args).await?;

        if !output.status.success() {
            return Err(StageError::Process(format!("yt-dlp -J: {}", stderr_summary(&output))));
        }
        serde_json::from_slice::<MediaInfo>(&output.stdout)
            .map_err(|e| StageError::MalformedResponse(e.to_string()))
    }

    async fn playlist_ids(&self, link: &str, limit: usize) -> Result<Vec<String>, StageError> {
        let args = Self::playlist_args(&self.cookie_args().await, link, limit);
        let output = self.run(args).await?;
        let ids = stdout_lines(&output);

        if ids.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
            if output.status.success() || stderr.contains(HIDDEN_VIDEOS_WARNING) {
                return Ok(ids);
            }
            return Err(StageError::Process(format!("yt-dlp --flat-playlist: {}", stderr_summary(&output))));
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cookies() -> Vec<String> {
        vec!["--cookies".to_string(), "cookies/a.txt".to_string()]
    }

    #[test]
    fn test_resolve_args() {
        let args = YtDlpExtractor::resolve_args(&cookies(), "https://www.youtube.com/watch?v=abc", "bestaudio/best");
        assert_eq!(
            args,
            vec![
                "--cookies",
                "cookies/a.txt",
                "-g",
                "-f",
                "bestaudio/best",
                "--no-playlist",
                "--no-warnings",
                "https://www.youtube.com/watch?v=abc"
            ]
        );
    }

    #[test]
    fn test_download_args_audio_extracts_mp3() {
        let stem = Path::new("downloads/abc");
        let args = YtDlpExtractor::download_args(&[], "u", "bestaudio/best", MediaKind::Audio, stem);
        assert!(args.windows(2).any(|w| w == ["-o", "downloads/abc.%(ext)s"]));
        assert!(args.windows(2).any(|w| w == ["--audio-format", "mp3"]));
        assert_eq!(args.last().map(String::as_str), Some("u"));
        assert!(!args.contains(&"--cookies".to_string()));
    }

    #[test]
    fn test_download_args_video_keeps_container() {
        let args = YtDlpExtractor::download_args(&cookies(), "u", "best", MediaKind::Video, Path::new("d/v"));
        assert!(!args.contains(&"--extract-audio".to_string()));
        assert_eq!(&args[..2], &cookies()[..]);
    }

    #[test]
    fn test_playlist_args() {
        let args = YtDlpExtractor::playlist_args(&[], "https://youtube.com/playlist?list=PL1", 25);
        assert_eq!(
            args,
            vec![
                "-i",
                "--get-id",
                "--flat-playlist",
                "--playlist-end",
                "25",
                "--skip-download",
                "https://youtube.com/playlist?list=PL1"
            ]
        );
    }

    #[test]
    fn test_media_info_parsing_and_sizes() {
        let json = r#"{
            "id": "abc123",
            "title": "Song",
            "duration": 225.0,
            "thumbnail": "https://i.ytimg.com/vi/abc123/hq.jpg?sqp=1",
            "channel": "Artist",
            "webpage_url": "https://www.youtube.com/watch?v=abc123",
            "formats": [
                {"format": "140 - audio only (tiny)", "format_id": "140", "ext": "m4a", "filesize": 3000000},
                {"format": "137 - 1920x1080 (DASH video)", "format_id": "137", "ext": "mp4", "filesize": 1000.5},
                {"format": "18 - 640x360", "format_id": "18", "ext": "mp4", "filesize": null}
            ]
        }"#;
        let info: MediaInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.total_filesize(), Some(3_001_000));
        let listable: Vec<_> = info.listable_formats().iter().filter_map(|f| f.format_id.clone()).collect();
        assert_eq!(listable, vec!["140", "18"]);

        let details = info.track_details("fallback");
        assert_eq!(details.duration_min.as_deref(), Some("3:45"));
        assert_eq!(details.thumb.as_deref(), Some("https://i.ytimg.com/vi/abc123/hq.jpg"));
        assert_eq!(details.performer, "Artist");
        assert_eq!(details.link, "https://www.youtube.com/watch?v=abc123");
    }

    #[test]
    fn test_duration_string_fallback() {
        let info: MediaInfo = serde_json::from_str(r#"{"id": "x", "duration_string": "1:02:03"}"#).unwrap();
        assert_eq!(info.track_details("x").duration_sec, 3723);
    }

    #[test]
    fn test_media_info_without_formats() {
        let info: MediaInfo = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert_eq!(info.total_filesize(), None);
        assert_eq!(info.performer(), "YouTube");
        assert_eq!(info.track_details("https://youtu.be/x").title, "x");
    }

    #[tokio::test]
    async fn test_find_downloaded_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("abc.webm.part"), b"x").unwrap();
        std::fs::write(dir.path().join("abcdef.mp3"), b"x").unwrap();
        assert_eq!(find_downloaded_file(&dir.path().join("abc")).await, None);

        std::fs::write(dir.path().join("abc.webm"), b"x").unwrap();
        assert_eq!(
            find_downloaded_file(&dir.path().join("abc")).await,
            Some(dir.path().join("abc.webm"))
        );
    }

    #[test]
    fn test_work_dir_is_per_kind_and_hidden() {
        let stem = Path::new("downloads/abc");
        assert_eq!(work_dir(stem, MediaKind::Audio).unwrap(), PathBuf::from("downloads/.abc.audio.work"));
        assert_eq!(work_dir(stem, MediaKind::Video).unwrap(), PathBuf::from("downloads/.abc.video.work"));
        assert!(has_kind_extension(Path::new("x/abc.MP3"), MediaKind::Audio));
        assert!(!has_kind_extension(Path::new("x/abc.webm"), MediaKind::Audio));
        assert!(has_kind_extension(Path::new("x/abc.webm"), MediaKind::Video));
    }

    #[tokio::test]
    async fn test_missing_binary_is_stage_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let credentials = CredentialLocator::new(None, dir.path());
        let extractor = YtDlpExtractor::new("definitely-not-yt-dlp-xyz", credentials);
        assert!(extractor.resolve_url("u", "best").await.is_err());
        assert!(extractor.probe("u").await.is_err());
    }

    /// Shell stand-in for yt-dlp: writes `size` bytes to the `-o` template with
    /// `ext` substituted, prints the path and exits with `code`.
    #[cfg(unix)]
    fn fake_ytdlp(dir: &Path, ext: &str, size: usize, code: i32) -> YtDlpExtractor {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-yt-dlp");
        let body = format!(
            "#!/bin/sh\n\
             out=\"\"\n\
             while [ $# -gt 0 ]; do\n\
             [ \"$1\" = \"-o\" ] && out=\"$2\"\n\
             shift\n\
             done\n\
             file=$(printf '%s' \"$out\" | sed 's/%(ext)s/{ext}/')\n\
             head -c {size} /dev/zero > \"$file\"\n\
             printf '%s\\n' \"$file\"\n\
             echo 'ERROR: Postprocessing: ffprobe and ffmpeg not found' >&2\n\
             exit {code}\n"
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        YtDlpExtractor::new(script.to_string_lossy(), CredentialLocator::new(None, dir.join("no-cookies")))
    }

    #[cfg(unix)]
    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_audio_extraction_leaves_nothing_behind() {
        let bin = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let extractor = fake_ytdlp(bin.path(), "webm", 400_000, 1);

        let stem = out.path().join("abc123");
        let err = extractor
            .download("https://www.youtube.com/watch?v=abc123", "bestaudio/best", MediaKind::Audio, &stem)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Process(ref msg) if msg.contains("ffprobe and ffmpeg not found")));
        assert!(listing(out.path()).is_empty(), "left behind: {:?}", listing(out.path()));
        let identifier = crate::download::identifier::ContentIdentifier::new("abc123");
        assert!(crate::download::local::probe(out.path(), &identifier, MediaKind::Video).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_audio_without_mp3_is_rejected() {
        let bin = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let extractor = fake_ytdlp(bin.path(), "webm", 400_000, 0);

        let err = extractor
            .download("abc123", "bestaudio/best", MediaKind::Audio, &out.path().join("abc123"))
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Process(ref msg) if msg.contains("instead of mp3")));
        assert!(listing(out.path()).is_empty(), "left behind: {:?}", listing(out.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finished_download_moves_into_artifact_dir() {
        let bin = tempfile::TempDir::new().unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let extractor = fake_ytdlp(bin.path(), "mp3", 60_000, 0);

        let path = extractor
            .download("abc123", "bestaudio/best", MediaKind::Audio, &out.path().join("abc123"))
            .await
            .unwrap();

        assert_eq!(path, out.path().join("abc123.mp3"));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 60_000);
        assert_eq!(listing(out.path()), vec!["abc123.mp3"]);
    }
}

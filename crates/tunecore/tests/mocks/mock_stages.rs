//! Scriptable stand-ins for the resolver, transcoder, fetcher, extractor and uploader

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tunecore::download::error::StageError;
use tunecore::download::fetch::DirectFetcher;
use tunecore::download::identifier::ContentIdentifier;
use tunecore::download::resolver::MediaResolver;
use tunecore::download::transcode::StreamTranscoder;
use tunecore::download::types::{
    AcquisitionRequest, LocalArtifact, MediaKind, ResolvedMediaLocation, TrackDescription,
};
use tunecore::download::upload::MediaUploader;
use tunecore::download::ytdlp::{MediaExtractor, MediaInfo};

/// Ordered record of collaborator calls
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Number of entries starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

fn write_output(path: &Path, size: usize) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, vec![0u8; size]).unwrap();
}

/// Resolver returning a fixed answer (default: not configured)
pub struct MockResolver {
    log: CallLog,
    response: Mutex<Result<ResolvedMediaLocation, StageError>>,
    delay: Mutex<Duration>,
}

impl MockResolver {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            response: Mutex::new(Err(StageError::NotConfigured("resolver API".to_string()))),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn ready(&self, url: &str) {
        *self.response.lock().unwrap() = Ok(ResolvedMediaLocation::classify(url));
    }

    pub fn fail(&self, error: StageError) {
        *self.response.lock().unwrap() = Err(error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl MediaResolver for MockResolver {
    async fn resolve(&self, request: &AcquisitionRequest) -> Result<ResolvedMediaLocation, StageError> {
        self.log.push(format!("resolve {}", request.identifier));
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.response.lock().unwrap().clone()
    }
}

/// Writes `output_size` bytes to the target, or fails when unset
pub struct MockTranscoder {
    log: CallLog,
    output_size: Mutex<Option<usize>>,
}

impl MockTranscoder {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            output_size: Mutex::new(None),
        }
    }

    pub fn produce(&self, size: usize) {
        *self.output_size.lock().unwrap() = Some(size);
    }
}

#[async_trait]
impl StreamTranscoder for MockTranscoder {
    async fn transcode(
        &self,
        url: &str,
        target: &Path,
        kind: MediaKind,
    ) -> Result<LocalArtifact, StageError> {
        self.log.push(format!("transcode {} -> {}", url, target.display()));
        let size = *self.output_size.lock().unwrap();
        match size {
            Some(size) => {
                write_output(target, size);
                Ok(LocalArtifact {
                    path: target.to_path_buf(),
                    kind,
                    size: size as u64,
                })
            }
            None => Err(StageError::Process("ffmpeg exited with 1".to_string())),
        }
    }
}

/// Writes `output_size` bytes to the target, or answers 404 when unset
pub struct MockFetcher {
    log: CallLog,
    output_size: Mutex<Option<usize>>,
}

impl MockFetcher {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            output_size: Mutex::new(None),
        }
    }

    pub fn produce(&self, size: usize) {
        *self.output_size.lock().unwrap() = Some(size);
    }
}

#[async_trait]
impl DirectFetcher for MockFetcher {
    async fn fetch(&self, url: &str, target: &Path, kind: MediaKind) -> Result<LocalArtifact, StageError> {
        self.log.push(format!("fetch {} -> {}", url, target.display()));
        let size = *self.output_size.lock().unwrap();
        match size {
            Some(size) => {
                write_output(target, size);
                Ok(LocalArtifact {
                    path: target.to_path_buf(),
                    kind,
                    size: size as u64,
                })
            }
            None => Err(StageError::HttpStatus(404)),
        }
    }
}

/// yt-dlp stand-in: every operation fails until scripted
pub struct MockExtractor {
    log: CallLog,
    stream_url: Mutex<Option<String>>,
    download: Mutex<Option<(String, usize)>>,
    info: Mutex<Option<MediaInfo>>,
    playlist: Mutex<Vec<String>>,
}

impl MockExtractor {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            stream_url: Mutex::new(None),
            download: Mutex::new(None),
            info: Mutex::new(None),
            playlist: Mutex::new(Vec::new()),
        }
    }

    pub fn resolves_to(&self, url: &str) {
        *self.stream_url.lock().unwrap() = Some(url.to_string());
    }

    /// Full downloads write `<stem>.<ext>` with `size` bytes
    pub fn downloads(&self, ext: &str, size: usize) {
        *self.download.lock().unwrap() = Some((ext.to_string(), size));
    }

    pub fn describes(&self, info: MediaInfo) {
        *self.info.lock().unwrap() = Some(info);
    }

    pub fn lists(&self, ids: &[&str]) {
        *self.playlist.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
    }
}

#[async_trait]
impl MediaExtractor for MockExtractor {
    async fn resolve_url(&self, target: &str, format: &str) -> Result<String, StageError> {
        self.log.push(format!("extractor-resolve {} [{}]", target, format));
        self.stream_url
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| StageError::Process("yt-dlp -g: Sign in to confirm you're not a bot".to_string()))
    }

    async fn download(
        &self,
        target: &str,
        _format: &str,
        _kind: MediaKind,
        output_stem: &Path,
    ) -> Result<PathBuf, StageError> {
        self.log.push(format!("extractor-download {}", target));
        let scripted = self.download.lock().unwrap().clone();
        match scripted {
            Some((ext, size)) => {
                let path = PathBuf::from(format!("{}.{}", output_stem.display(), ext));
                write_output(&path, size);
                Ok(path)
            }
            None => Err(StageError::Process("yt-dlp exited with 1".to_string())),
        }
    }

    async fn probe(&self, target: &str) -> Result<MediaInfo, StageError> {
        self.log.push(format!("extractor-probe {}", target));
        self.info
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| StageError::Process("yt-dlp -J: Video unavailable".to_string()))
    }

    async fn playlist_ids(&self, link: &str, limit: usize) -> Result<Vec<String>, StageError> {
        self.log.push(format!("extractor-playlist {} {}", link, limit));
        Ok(self.playlist.lock().unwrap().iter().take(limit).cloned().collect())
    }
}

/// Uploader returning a fixed `file_id` (default: not configured)
pub struct MockUploader {
    log: CallLog,
    file_id: Mutex<Option<String>>,
}

impl MockUploader {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            file_id: Mutex::new(None),
        }
    }

    pub fn returns(&self, file_id: &str) {
        *self.file_id.lock().unwrap() = Some(file_id.to_string());
    }
}

#[async_trait]
impl MediaUploader for MockUploader {
    async fn upload(
        &self,
        identifier: &ContentIdentifier,
        artifact: &LocalArtifact,
        track: &TrackDescription,
    ) -> Result<String, StageError> {
        let file_id = self.file_id.lock().unwrap().clone();
        match file_id {
            Some(file_id) => {
                self.log.push(format!(
                    "upload {} caption={} title={} performer={}",
                    artifact.path.display(),
                    identifier,
                    track.title.as_deref().unwrap_or("-"),
                    track.performer.as_deref().unwrap_or("-")
                ));
                Ok(file_id)
            }
            None => Err(StageError::NotConfigured("upload channel".to_string())),
        }
    }
}

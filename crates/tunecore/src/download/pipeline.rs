//! Acquisition orchestrator
//!
//! Per request:
//! 1. audio only: upload-cache lookup, a hit returns the stored `file_id` untouched
//! 2. local probe, a complete file on disk is returned as-is
//! 3. the stage chain ([`RemoteResolveStage`], [`ExtractorProbeStage`],
//!    [`ExtractorDownloadStage`]) until one delivers
//! 4. audio only: upload the fresh artifact and remember its `file_id`
//!
//! Concurrent requests for the same identifier and kind share one attempt.

use crate::core::config::PipelineConfig;
use crate::core::http::SharedHttpClient;
use crate::download::error::{AcquisitionError, StageError, StageFailure};
use crate::download::fetch::{DirectFetcher, HttpFetcher};
use crate::download::identifier::{strip_extra_params, ContentIdentifier};
use crate::download::local;
use crate::download::resolver::{HttpResolver, MediaResolver};
use crate::download::stages::{
    run_stages, ExtractorDownloadStage, ExtractorProbeStage, RemoteResolveStage, Stage, StageContext,
};
use crate::download::transcode::{FfmpegTranscoder, StreamTranscoder};
use crate::download::types::{
    Acquisition, AcquisitionRequest, LocalArtifact, MediaKind, QualityPreference, TrackDescription,
};
use crate::download::upload::{BotApiUploader, MediaUploader};
use crate::download::ytdlp::{FormatInfo, MediaExtractor, TrackDetails, YtDlpExtractor};
use crate::storage::FileIdStore;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Stage name used when the stream-URL fallback of [`MediaPipeline::video_source`] fails.
pub const STREAM_FALLBACK_STAGE: &str = "extractor-stream";

type SharedOutcome = Arc<OnceCell<Result<Acquisition, AcquisitionError>>>;

/// Where a video can be played from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    File(PathBuf),
    /// Direct URL for streaming when nothing could be stored locally
    Stream(String),
}

pub struct MediaPipeline {
    config: Arc<PipelineConfig>,
    extractor: Arc<dyn MediaExtractor>,
    transcoder: Arc<dyn StreamTranscoder>,
    fetcher: Arc<dyn DirectFetcher>,
    uploader: Arc<dyn MediaUploader>,
    file_ids: Arc<FileIdStore>,
    stages: Vec<Arc<dyn Stage>>,
    in_flight: DashMap<(String, MediaKind), SharedOutcome>,
}

/// Builds a [`MediaPipeline`]; every collaborator not set explicitly gets its production implementation.
pub struct MediaPipelineBuilder {
    config: PipelineConfig,
    http: Option<Arc<SharedHttpClient>>,
    resolver: Option<Arc<dyn MediaResolver>>,
    extractor: Option<Arc<dyn MediaExtractor>>,
    transcoder: Option<Arc<dyn StreamTranscoder>>,
    fetcher: Option<Arc<dyn DirectFetcher>>,
    uploader: Option<Arc<dyn MediaUploader>>,
    file_ids: Option<Arc<FileIdStore>>,
}

impl MediaPipelineBuilder {
    #[must_use]
    pub fn http_client(mut self, http: Arc<SharedHttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn MediaResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn extractor(mut self, extractor: Arc<dyn MediaExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    #[must_use]
    pub fn transcoder(mut self, transcoder: Arc<dyn StreamTranscoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn DirectFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    #[must_use]
    pub fn uploader(mut self, uploader: Arc<dyn MediaUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    #[must_use]
    pub fn file_ids(mut self, store: Arc<FileIdStore>) -> Self {
        self.file_ids = Some(store);
        self
    }

    pub fn build(self) -> MediaPipeline {
        let config = Arc::new(self.config);
        let http = self.http.unwrap_or_else(|| Arc::new(SharedHttpClient::new()));

        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(HttpResolver::new(Arc::clone(&config), Arc::clone(&http))));
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(YtDlpExtractor::from_config(&config)));
        let transcoder = self.transcoder.unwrap_or_else(|| {
            Arc::new(FfmpegTranscoder::new(config.ffmpeg_bin.clone()).with_timeouts(config.timeouts))
        });
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpFetcher::new(Arc::clone(&http)).with_timeouts(config.timeouts)));
        let uploader = self
            .uploader
            .unwrap_or_else(|| Arc::new(BotApiUploader::new(Arc::clone(&config), Arc::clone(&http))));
        let file_ids = self
            .file_ids
            .unwrap_or_else(|| Arc::new(FileIdStore::new(config.upload_cache_path.clone())));

        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(RemoteResolveStage::new(resolver)),
            Arc::new(ExtractorProbeStage::new(Arc::clone(&extractor))),
            Arc::new(ExtractorDownloadStage::new(Arc::clone(&extractor))),
        ];

        MediaPipeline {
            config,
            extractor,
            transcoder,
            fetcher,
            uploader,
            file_ids,
            stages,
            in_flight: DashMap::new(),
        }
    }
}

impl MediaPipeline {
    pub fn builder(config: PipelineConfig) -> MediaPipelineBuilder {
        MediaPipelineBuilder {
            config,
            http: None,
            resolver: None,
            extractor: None,
            transcoder: None,
            fetcher: None,
            uploader: None,
            file_ids: None,
        }
    }

    /// Production pipeline with every default collaborator.
    pub fn new(config: PipelineConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn download_song(&self, link: &str) -> Result<Acquisition, AcquisitionError> {
        self.acquire(AcquisitionRequest::audio(link)).await
    }

    pub async fn download_video(&self, link: &str) -> Result<Acquisition, AcquisitionError> {
        self.acquire(AcquisitionRequest::video(link)).await
    }

    /// Like [`acquire`](Self::acquire), but looks up title and performer first when
    /// a fresh audio artifact would be uploaded, so the upload carries them.
    pub async fn download(&self, link: &str, kind: MediaKind) -> Result<Acquisition, AcquisitionError> {
        let request = AcquisitionRequest::new(ContentIdentifier::from_link(link), kind);
        if !self.will_upload(kind) || self.already_available(&request).await {
            return self.acquire(request).await;
        }

        let request = match self.extractor.probe(&request.identifier.watch_url()).await {
            Ok(info) => {
                let track = info.track_description();
                request.with_quality(QualityPreference { format: None, track })
            }
            Err(e) => {
                log::warn!("Track details unavailable for {}: {}", request.identifier, e);
                request
            }
        };
        self.acquire(request).await
    }

    /// Runs one acquisition, sharing the attempt with concurrent callers for the same identifier and kind.
    pub async fn acquire(&self, request: AcquisitionRequest) -> Result<Acquisition, AcquisitionError> {
        let key = (request.identifier.as_str().to_string(), request.kind);
        let cell: SharedOutcome = Arc::clone(&*self.in_flight.entry(key.clone()).or_default());

        if cell.initialized() {
            log::debug!("Reusing finished attempt for {}", request.identifier);
        } else if Arc::strong_count(&cell) > 2 {
            log::info!("⏳ Waiting for in-flight acquisition of {}", request.identifier);
        }

        let outcome = cell.get_or_init(|| self.acquire_uncached(&request)).await.clone();
        self.in_flight.remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));
        outcome
    }

    /// Number of identifiers with an acquisition currently running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Only audio is uploaded, and only with a configured channel.
    fn will_upload(&self, kind: MediaKind) -> bool {
        kind == MediaKind::Audio && self.config.upload.is_some()
    }

    async fn already_available(&self, request: &AcquisitionRequest) -> bool {
        let identifier = request.identifier.as_str();
        if request.kind == MediaKind::Audio && self.file_ids.get(identifier).await.is_some() {
            return true;
        }
        local::probe(&self.config.download_dir, &request.identifier, request.kind)
            .await
            .is_some()
    }

    async fn acquire_uncached(&self, request: &AcquisitionRequest) -> Result<Acquisition, AcquisitionError> {
        let identifier = &request.identifier;
        let kind = request.kind;

        if kind == MediaKind::Audio {
            if let Some(file_id) = self.file_ids.get(identifier.as_str()).await {
                log::info!("⚡ Upload cache hit for {}", identifier);
                return Ok(Acquisition::Cached { file_id });
            }
        }

        let download_dir = self.config.download_dir.as_path();
        if let Some(artifact) = local::probe(download_dir, identifier, kind).await {
            return Ok(Acquisition::Local { artifact, file_id: None });
        }

        let ctx = StageContext {
            request,
            download_dir,
            target: local::target_path(download_dir, identifier, kind),
            transcoder: self.transcoder.as_ref(),
            fetcher: self.fetcher.as_ref(),
        };

        match run_stages(&self.stages, &ctx).await {
            Ok(artifact) => {
                let file_id = match kind {
                    MediaKind::Audio => self.publish(identifier, &artifact, &request.quality.track).await,
                    MediaKind::Video => None,
                };
                Ok(Acquisition::Local { artifact, file_id })
            }
            Err(failures) => {
                let error = AcquisitionError {
                    identifier: identifier.to_string(),
                    kind,
                    failures,
                };
                log::error!("❌ {}", error);
                Err(error)
            }
        }
    }

    /// Uploads a fresh audio artifact and stores its `file_id`. Never fails the request.
    async fn publish(
        &self,
        identifier: &ContentIdentifier,
        artifact: &LocalArtifact,
        track: &TrackDescription,
    ) -> Option<String> {
        match self.uploader.upload(identifier, artifact, track).await {
            Ok(file_id) => {
                if let Err(e) = self.file_ids.set(identifier.as_str(), &file_id).await {
                    log::warn!("Failed to persist file_id for {}: {}", identifier, e);
                }
                Some(file_id)
            }
            Err(e) if e.is_skip() => {
                log::debug!("Upload skipped for {}: {}", identifier, e);
                None
            }
            Err(e) => {
                log::warn!("Upload failed for {} [{}]: {}", identifier, e.subcategory(), e);
                None
            }
        }
    }

    /// A playable video: a stored file when one can be acquired, else a direct stream URL.
    pub async fn video_source(&self, link: &str) -> Result<VideoSource, AcquisitionError> {
        let request = AcquisitionRequest::video(link);
        let mut error = match self.acquire(request.clone()).await {
            Ok(acquisition) => match acquisition.local_path() {
                Some(path) => return Ok(VideoSource::File(path.to_path_buf())),
                None => AcquisitionError {
                    identifier: request.identifier.to_string(),
                    kind: MediaKind::Video,
                    failures: Vec::new(),
                },
            },
            Err(e) => e,
        };

        match self
            .extractor
            .resolve_url(&request.identifier.watch_url(), request.format())
            .await
        {
            Ok(url) => {
                log::info!("📺 Streaming {} instead of storing it", request.identifier);
                Ok(VideoSource::Stream(url))
            }
            Err(e) => {
                error.failures.push(StageFailure {
                    stage: STREAM_FALLBACK_STAGE,
                    error: e,
                });
                Err(error)
            }
        }
    }

    /// Video ids of the first `limit` playlist entries.
    pub async fn playlist(&self, link: &str, limit: usize) -> Result<Vec<String>, StageError> {
        self.extractor.playlist_ids(link, limit).await
    }

    /// Formats available for a link, DASH-only entries excluded.
    pub async fn formats(&self, link: &str) -> Result<Vec<FormatInfo>, StageError> {
        let info = self.extractor.probe(&Self::probe_target(link)).await?;
        Ok(info.listable_formats().into_iter().cloned().collect())
    }

    /// Sum of the reported sizes of every format; `None` when the extractor lists none.
    pub async fn total_filesize(&self, link: &str) -> Result<Option<u64>, StageError> {
        let info = self.extractor.probe(&Self::probe_target(link)).await?;
        Ok(info.total_filesize())
    }

    pub async fn track(&self, link: &str) -> Result<TrackDetails, StageError> {
        let target = Self::probe_target(link);
        let info = self.extractor.probe(&target).await?;
        Ok(info.track_details(&target))
    }

    fn probe_target(link: &str) -> String {
        ContentIdentifier::from_link(strip_extra_params(link)).watch_url()
    }
}

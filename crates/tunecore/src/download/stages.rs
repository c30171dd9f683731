//! Acquisition stages and the loop that runs them
//!
//! Each stage turns a request into a [`LocalArtifact`] or a [`StageError`]. The
//! driver tries them in order, re-validates whatever a stage hands back and
//! collects one [`StageFailure`] per stage that didn't deliver.

use crate::download::error::{StageError, StageFailure};
use crate::download::fetch::DirectFetcher;
use crate::download::local::{discard_invalid, validate_artifact};
use crate::download::resolver::MediaResolver;
use crate::download::transcode::StreamTranscoder;
use crate::download::types::{AcquisitionRequest, LocalArtifact, ResolvedMediaLocation, StreamKind};
use crate::download::ytdlp::MediaExtractor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a stage needs for one request.
pub struct StageContext<'a> {
    pub request: &'a AcquisitionRequest,
    pub download_dir: &'a Path,
    /// Where fetch and transcode write (`<dir>/<stem>.<ext>`)
    pub target: PathBuf,
    pub transcoder: &'a dyn StreamTranscoder,
    pub fetcher: &'a dyn DirectFetcher,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &StageContext<'_>) -> Result<LocalArtifact, StageError>;
}

/// Turns a resolved URL into a file: manifests go to the transcoder, everything else to the fetcher.
pub async fn deliver(ctx: &StageContext<'_>, location: &ResolvedMediaLocation) -> Result<LocalArtifact, StageError> {
    let kind = ctx.request.kind;
    match location.stream {
        StreamKind::Manifest => ctx.transcoder.transcode(&location.url, &ctx.target, kind).await,
        StreamKind::Direct => ctx.fetcher.fetch(&location.url, &ctx.target, kind).await,
    }
}

/// Asks the remote conversion service, then delivers its URL.
pub struct RemoteResolveStage {
    resolver: Arc<dyn MediaResolver>,
}

impl RemoteResolveStage {
    pub const NAME: &'static str = "remote-resolve";

    pub fn new(resolver: Arc<dyn MediaResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Stage for RemoteResolveStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<LocalArtifact, StageError> {
        let location = self.resolver.resolve(ctx.request).await?;
        deliver(ctx, &location).await
    }
}

/// `yt-dlp -g`, then the same delivery as the remote stage.
pub struct ExtractorProbeStage {
    extractor: Arc<dyn MediaExtractor>,
}

impl ExtractorProbeStage {
    pub const NAME: &'static str = "extractor-probe";

    pub fn new(extractor: Arc<dyn MediaExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl Stage for ExtractorProbeStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<LocalArtifact, StageError> {
        let source = ctx.request.identifier.watch_url();
        let url = self.extractor.resolve_url(&source, ctx.request.format()).await?;
        deliver(ctx, &ResolvedMediaLocation::classify(url)).await
    }
}

/// Full yt-dlp download into the artifact directory.
pub struct ExtractorDownloadStage {
    extractor: Arc<dyn MediaExtractor>,
}

impl ExtractorDownloadStage {
    pub const NAME: &'static str = "extractor-download";

    pub fn new(extractor: Arc<dyn MediaExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl Stage for ExtractorDownloadStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<LocalArtifact, StageError> {
        let request = ctx.request;
        let source = request.identifier.watch_url();
        let stem = ctx.download_dir.join(request.identifier.file_stem());

        let path = self
            .extractor
            .download(&source, request.format(), request.kind, &stem)
            .await?;

        let validated = validate_artifact(&path, request.kind).await;
        if validated.is_err() {
            discard_invalid(&path).await;
        }
        validated
    }
}

/// Runs the stages in order until one produces a valid artifact.
pub async fn run_stages(stages: &[Arc<dyn Stage>], ctx: &StageContext<'_>) -> Result<LocalArtifact, Vec<StageFailure>> {
    let request = ctx.request;
    let mut failures = Vec::with_capacity(stages.len());

    for stage in stages {
        log::info!("▶️ [{}] {} ({})", stage.name(), request.identifier, request.kind.label());

        let outcome = match stage.run(ctx).await {
            Ok(artifact) => match validate_artifact(&artifact.path, request.kind).await {
                Ok(valid) => Ok(valid),
                Err(e) => {
                    discard_invalid(&artifact.path).await;
                    Err(e)
                }
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok(artifact) => {
                log::info!(
                    "✅ [{}] {} -> {} ({} bytes)",
                    stage.name(),
                    request.identifier,
                    artifact.path.display(),
                    artifact.size
                );
                return Ok(artifact);
            }
            Err(error) => {
                if error.is_skip() {
                    log::debug!("[{}] {}", stage.name(), error);
                } else {
                    log::warn!(
                        "❌ [{}] {} failed [{}]: {}",
                        stage.name(),
                        request.identifier,
                        error.subcategory(),
                        error
                    );
                }
                failures.push(StageFailure {
                    stage: stage.name(),
                    error,
                });
            }
        }
    }

    Err(failures)
}

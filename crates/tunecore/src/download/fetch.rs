//! Direct fetcher: streamed HTTP download of a resolved, non-manifest URL.
//!
//! The body is written chunk by chunk to `<target>.part` and only renamed into
//! place once the size check passes, so a broken transfer never leaves a file
//! that the local probe could mistake for an artifact.

use crate::core::config::StageTimeouts;
use crate::core::http::SharedHttpClient;
use crate::download::error::StageError;
use crate::download::local::{discard_invalid, validate_artifact};
use crate::download::types::{LocalArtifact, MediaKind};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait DirectFetcher: Send + Sync {
    /// Download `url` into `target`. Success only if the result passes the size check.
    async fn fetch(&self, url: &str, target: &Path, kind: MediaKind) -> Result<LocalArtifact, StageError>;
}

pub struct HttpFetcher {
    http: Arc<SharedHttpClient>,
    timeouts: StageTimeouts,
}

impl HttpFetcher {
    pub fn new(http: Arc<SharedHttpClient>) -> Self {
        Self {
            http,
            timeouts: StageTimeouts::default(),
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn part_path(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_owned();
        name.push(".part");
        PathBuf::from(name)
    }

    async fn stream_to(&self, url: &str, part: &Path, kind: MediaKind) -> Result<u64, StageError> {
        let client = self.http.client().map_err(StageError::from)?;
        let timeout = kind.transfer_timeout(&self.timeouts);

        let response = client.get(url).timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                StageError::Timeout(format!("fetch after {:?}", timeout))
            } else {
                StageError::Network(e.to_string())
            }
        })?;

        if response.status() != StatusCode::OK {
            return Err(StageError::HttpStatus(response.status().as_u16()));
        }

        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| StageError::Io(format!("Failed to create file: {}", e)))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| {
                if e.is_timeout() {
                    StageError::Timeout(format!("fetch after {:?}", timeout))
                } else {
                    StageError::Network(format!("Error reading chunk: {}", e))
                }
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| StageError::Io(format!("Error writing to file: {}", e)))?;
            downloaded += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| StageError::Io(format!("Failed to flush file: {}", e)))?;
        Ok(downloaded)
    }
}

#[async_trait]
impl DirectFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, target: &Path, kind: MediaKind) -> Result<LocalArtifact, StageError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::Io(e.to_string()))?;
        }

        log::info!("📥 Direct download: {} -> {}", url, target.display());
        let part = Self::part_path(target);

        let outcome = match self.stream_to(url, &part, kind).await {
            Ok(bytes) => match validate_artifact(&part, kind).await {
                Ok(_) => tokio::fs::rename(&part, target)
                    .await
                    .map_err(|e| StageError::Io(format!("Failed to move {} into place: {}", part.display(), e)))
                    .map(|()| LocalArtifact {
                        path: target.to_path_buf(),
                        kind,
                        size: bytes,
                    }),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(artifact) => log::info!(
                "✅ Direct download complete: {} ({:.2} MB)",
                artifact.path.display(),
                artifact.size as f64 / (1024.0 * 1024.0)
            ),
            Err(e) => {
                log::warn!("Direct download failed for {}: {}", url, e);
                discard_invalid(&part).await;
            }
        }
        outcome
    }
}

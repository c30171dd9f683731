//! Upload of fresh audio artifacts to the log channel
//!
//! The returned `file_id` lets later requests for the same identifier be answered
//! by the Telegram layer without touching disk or network.

use crate::core::config::PipelineConfig;
use crate::core::http::SharedHttpClient;
use crate::download::error::StageError;
use crate::download::identifier::ContentIdentifier;
use crate::download::types::{LocalArtifact, TrackDescription};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload the artifact and return the `file_id` Telegram assigned to it.
    async fn upload(
        &self,
        identifier: &ContentIdentifier,
        artifact: &LocalArtifact,
        track: &TrackDescription,
    ) -> Result<String, StageError>;
}

/// `sendAudio` through the Bot API.
pub struct BotApiUploader {
    config: Arc<PipelineConfig>,
    http: Arc<SharedHttpClient>,
}

impl BotApiUploader {
    pub fn new(config: Arc<PipelineConfig>, http: Arc<SharedHttpClient>) -> Self {
        Self { config, http }
    }
}

/// Pulls `result.audio.file_id` (or `result.document.file_id`) out of an `ok` response.
pub fn extract_file_id(body: &Value) -> Option<String> {
    if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let result = body.get("result")?;
    ["audio", "document"]
        .iter()
        .filter_map(|field| result.get(*field)?.get("file_id")?.as_str())
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl MediaUploader for BotApiUploader {
    async fn upload(
        &self,
        identifier: &ContentIdentifier,
        artifact: &LocalArtifact,
        track: &TrackDescription,
    ) -> Result<String, StageError> {
        let upload = self
            .config
            .upload
            .as_ref()
            .ok_or_else(|| StageError::NotConfigured("upload channel".to_string()))?;

        let file_name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let title = track.title.clone().unwrap_or_else(|| identifier.to_string());
        let performer = track.performer.clone().unwrap_or_default();

        let file = tokio::fs::File::open(&artifact.path)
            .await
            .map_err(|e| StageError::Io(format!("{}: {}", artifact.path.display(), e)))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| StageError::Io(format!("{}: {}", artifact.path.display(), e)))?
            .len();

        let part = Part::stream_with_length(Body::from(file), length)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| StageError::Process(e.to_string()))?;

        let form = Form::new()
            .text("chat_id", upload.chat_id.clone())
            .text("caption", identifier.to_string())
            .text("performer", performer)
            .text("title", title)
            .part("audio", part);

        let url = format!(
            "{}/bot{}/sendAudio",
            upload.api_base.trim_end_matches('/'),
            upload.bot_token.expose_secret()
        );

        log::info!("📤 Uploading {} to log channel", artifact.path.display());
        let client = self.http.client().map_err(StageError::from)?;
        let response = client
            .post(&url)
            .multipart(form)
            .timeout(self.config.timeouts.upload)
            .send()
            .await
            .map_err(|e| {
                // Strip the URL: it carries the bot token
                let e = e.without_url();
                if e.is_timeout() {
                    StageError::Timeout(format!("upload after {:?}", self.config.timeouts.upload))
                } else {
                    StageError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| StageError::MalformedResponse(e.without_url().to_string()))?;

        match extract_file_id(&body) {
            Some(file_id) => {
                log::info!("✅ Uploaded {} as {}", artifact.path.display(), file_id);
                Ok(file_id)
            }
            None if !status.is_success() => Err(StageError::HttpStatus(status.as_u16())),
            None => Err(StageError::MalformedResponse(
                body.get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("no file_id in response")
                    .to_string(),
            )),
        }
    }
}

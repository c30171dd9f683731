//! Remote resolution client
//!
//! Asks the conversion service for a ready-to-download URL:
//! `GET {base}/{song|video}/{id}?api={secret}`.
//!
//! The service is not well behaved: it sometimes prints log lines around the JSON
//! body and reports `status` as either a string or a bool, so everything is
//! decoded leniently here and normalised into [`ResolverStatus`] before the rest
//! of the pipeline sees it. No failure propagates past this module: every problem
//! becomes a [`StageError`] and the orchestrator moves on.

use crate::core::config::PipelineConfig;
use crate::core::http::SharedHttpClient;
use crate::download::error::StageError;
use crate::download::types::{AcquisitionRequest, MediaKind, ResolvedMediaLocation};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Status values the service uses for "conversion finished".
const READY_SYNONYMS: &[&str] = &["done", "true", "ok"];

#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Ask the remote service for a download location.
    async fn resolve(&self, request: &AcquisitionRequest) -> Result<ResolvedMediaLocation, StageError>;
}

/// Normalised `status` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverStatus {
    Ready,
    /// Present but not a ready synonym; carries the raw value for logs
    Pending(String),
    /// Absent or null
    Unknown,
}

impl ResolverStatus {
    pub fn from_value(status: Option<&Value>) -> Self {
        let raw = match status {
            None | Some(Value::Null) => return ResolverStatus::Unknown,
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => other.to_string(),
        };

        if READY_SYNONYMS.contains(&raw.trim().to_lowercase().as_str()) {
            ResolverStatus::Ready
        } else {
            ResolverStatus::Pending(raw)
        }
    }
}

/// Parses a response body as a JSON object, falling back to the outermost `{...}` span.
pub fn decode_body(text: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Turns a decoded body into a location, or the reason there isn't one.
pub fn interpret(body: &Value, kind: MediaKind) -> Result<ResolvedMediaLocation, StageError> {
    match ResolverStatus::from_value(body.get("status")) {
        ResolverStatus::Ready => kind
            .resolver_url_fields()
            .iter()
            .filter_map(|field| body.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|url| !url.is_empty())
            .map(ResolvedMediaLocation::classify)
            .ok_or(StageError::MissingUrl),
        ResolverStatus::Pending(raw) => Err(StageError::NotReady(raw)),
        ResolverStatus::Unknown => Err(StageError::NotReady("missing".to_string())),
    }
}

/// Resolver backed by the configured HTTP service.
pub struct HttpResolver {
    config: Arc<PipelineConfig>,
    http: Arc<SharedHttpClient>,
}

impl HttpResolver {
    pub fn new(config: Arc<PipelineConfig>, http: Arc<SharedHttpClient>) -> Self {
        Self { config, http }
    }

    /// Builds the endpoint URL without the secret (safe to log).
    fn endpoint(base: &str, request: &AcquisitionRequest) -> Result<Url, StageError> {
        let mut url = Url::parse(base)
            .map_err(|e| StageError::NotConfigured(format!("resolver URL '{}' ({})", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| StageError::NotConfigured(format!("resolver URL '{}' cannot be a base", base)))?
            .pop_if_empty()
            .push(request.kind.resolver_segment())
            .push(request.identifier.as_str());
        Ok(url)
    }
}

#[async_trait]
impl MediaResolver for HttpResolver {
    async fn resolve(&self, request: &AcquisitionRequest) -> Result<ResolvedMediaLocation, StageError> {
        let resolver = self
            .config
            .resolver
            .as_ref()
            .ok_or_else(|| StageError::NotConfigured("resolver API".to_string()))?;

        let base = match request.kind {
            MediaKind::Audio => &resolver.song_base,
            MediaKind::Video => &resolver.video_base,
        };
        let endpoint = Self::endpoint(base, request)?;
        log::info!("🌐 Resolver request: {}", endpoint);

        let client = self.http.client().map_err(StageError::from)?;
        let response = client
            .get(endpoint.clone())
            .query(&[("api", resolver.api_key.expose_secret())])
            .timeout(self.config.timeouts.resolver)
            .send()
            .await
            .map_err(|e| {
                // The full URL carries the api key
                let e = e.without_url();
                if e.is_timeout() {
                    StageError::Timeout(format!("resolver {}", endpoint))
                } else {
                    StageError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StageError::Network(e.without_url().to_string()))?;

        let Some(body) = decode_body(&text) else {
            if !status.is_success() {
                return Err(StageError::HttpStatus(status.as_u16()));
            }
            let preview: String = text.chars().take(200).collect();
            log::warn!("Resolver returned invalid JSON (status {}): {}", status, preview);
            return Err(StageError::MalformedResponse(preview));
        };

        let location = interpret(&body, request.kind)?;
        log::info!(
            "Resolver ready for {}: {} ({:?})",
            request.identifier,
            location.url,
            location.stream
        );
        Ok(location)
    }
}

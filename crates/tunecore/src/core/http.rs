//! Shared outbound HTTP client
//!
//! One `reqwest::Client` (and therefore one connection pool) is built lazily on
//! first use and reused by the resolver, the fetcher and the uploader for the
//! lifetime of the owning pipeline. `reset()` drops it so the next call builds a
//! fresh one.

use crate::core::config::timeouts;
use crate::core::error::AppError;
use reqwest::Client;
use std::sync::Mutex;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; tunebot/0.3)";

#[derive(Debug, Default)]
pub struct SharedHttpClient {
    inner: Mutex<Option<Client>>,
}

impl SharedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pooled client, building it on first use.
    ///
    /// Per-request timeouts are set by callers; only the connect timeout is global.
    pub fn client(&self) -> Result<Client, AppError> {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        log::debug!("Building shared HTTP client");
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeouts::connect())
            .build()?;
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Drops the pooled client; the next `client()` call rebuilds it.
    pub fn reset(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.inner
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

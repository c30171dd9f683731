//! Cookie file selection for yt-dlp
//!
//! Lookup order:
//! 1. `YTDL_COOKIES_FILE`, if it exists and looks like a Netscape cookie file
//! 2. the first `*.txt` in `COOKIES_DIR`, by file name, that passes the same check
//!
//! The choice is deterministic so that a bad credential fails the same way every time.

use crate::core::config::PipelineConfig;
use std::path::{Path, PathBuf};

/// Checks that a cookies file is in Netscape format.
///
/// Requires the `# Netscape HTTP Cookie File` / `# HTTP Cookie File` header and at
/// least one tab-separated line with 7 fields
/// (domain, flag, path, secure, expiration, name, value).
pub fn is_netscape_cookie_file(path: &Path) -> bool {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return false;
    };

    let has_header = contents.lines().map(str::trim).any(|line| {
        line.starts_with("# Netscape HTTP Cookie File") || line.starts_with("# HTTP Cookie File")
    });

    let has_cookies = contents.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#') && trimmed.split('\t').count() >= 7
    });

    has_header && has_cookies
}

#[derive(Debug, Clone)]
pub struct CredentialLocator {
    preferred: Option<PathBuf>,
    dir: PathBuf,
}

impl CredentialLocator {
    pub fn new(preferred: Option<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            preferred,
            dir: dir.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.cookies_file.clone(), config.cookies_dir.clone())
    }

    /// Picks one usable credential file, or `None`.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(preferred) = &self.preferred {
            if preferred.is_file() && is_netscape_cookie_file(preferred) {
                return Some(preferred.clone());
            }
            log::warn!(
                "YTDL_COOKIES_FILE {} is missing or not in Netscape format, searching {}",
                preferred.display(),
                self.dir.display()
            );
        }

        let entries = std::fs::read_dir(&self.dir).ok()?;
        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        candidates.sort();

        for candidate in candidates {
            if is_netscape_cookie_file(&candidate) {
                return Some(candidate);
            }
            log::warn!("Skipping {}: not a Netscape cookie file", candidate.display());
        }
        None
    }

    /// [`locate`](Self::locate) on the blocking pool, for use inside request handling.
    pub async fn locate_async(&self) -> Option<PathBuf> {
        let locator = self.clone();
        match tokio::task::spawn_blocking(move || locator.locate()).await {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Cookie lookup task failed: {}", e);
                None
            }
        }
    }
}

//! Local artifact probe and validation
//!
//! The probe is the cheapest short-circuit in the pipeline: if a complete file for
//! the identifier is already on disk, nothing else runs.

use crate::download::error::StageError;
use crate::download::identifier::ContentIdentifier;
use crate::download::types::{LocalArtifact, MediaKind};
use std::path::{Path, PathBuf};

/// Path a fetch or transcode of this identifier writes to.
pub fn target_path(dir: &Path, identifier: &ContentIdentifier, kind: MediaKind) -> PathBuf {
    dir.join(format!("{}.{}", identifier.file_stem(), kind.target_extension()))
}

/// Looks for an existing complete artifact.
///
/// Audio checks `<stem>.mp3`; video checks `.mp4`, `.webm`, `.mkv` in that order.
/// Files at or below the size threshold are a miss. Never writes.
pub async fn probe(dir: &Path, identifier: &ContentIdentifier, kind: MediaKind) -> Option<LocalArtifact> {
    let stem = identifier.file_stem();
    for ext in kind.extensions() {
        let candidate = dir.join(format!("{}.{}", stem, ext));
        match validate_artifact(&candidate, kind).await {
            Ok(artifact) => {
                log::info!("📦 Local cache hit: {}", candidate.display());
                return Some(artifact);
            }
            Err(StageError::Undersized { size, .. }) => {
                log::warn!(
                    "Ignoring incomplete local file {} ({} bytes)",
                    candidate.display(),
                    size
                );
            }
            Err(_) => {}
        }
    }
    None
}

/// Post-condition shared by every stage: file exists and is strictly larger than the kind's threshold.
pub async fn validate_artifact(path: &Path, kind: MediaKind) -> Result<LocalArtifact, StageError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| StageError::Io(format!("{}: {}", path.display(), e)))?;

    let size = metadata.len();
    let min = kind.min_size();
    if !metadata.is_file() || size <= min {
        return Err(StageError::Undersized { size, min });
    }

    Ok(LocalArtifact {
        path: path.to_path_buf(),
        kind,
        size,
    })
}

/// Removes an output that failed validation so it can't be mistaken for an artifact later.
pub async fn discard_invalid(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed invalid output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove invalid output {}: {}", path.display(), e),
    }
}

//! Data model shared by every pipeline stage

use crate::core::config::{formats, validation, StageTimeouts};
use crate::download::identifier::ContentIdentifier;
use std::path::PathBuf;
use std::time::Duration;

/// What the caller wants out of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Extensions probed on disk, in priority order. The first one is the target extension.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Audio => &["mp3"],
            MediaKind::Video => &["mp4", "webm", "mkv"],
        }
    }

    /// Extension of files this pipeline writes itself (fetch / transcode).
    pub fn target_extension(&self) -> &'static str {
        self.extensions()[0]
    }

    /// A file must be strictly larger than this to be considered a complete artifact.
    pub fn min_size(&self) -> u64 {
        match self {
            MediaKind::Audio => validation::MIN_AUDIO_BYTES,
            MediaKind::Video => validation::MIN_VIDEO_BYTES,
        }
    }

    /// Budget for a direct fetch or a transcode of this kind.
    pub fn transfer_timeout(&self, timeouts: &StageTimeouts) -> Duration {
        match self {
            MediaKind::Audio => timeouts.audio_transfer,
            MediaKind::Video => timeouts.video_transfer,
        }
    }

    /// yt-dlp `-f` expression.
    pub fn default_format(&self) -> &'static str {
        match self {
            MediaKind::Audio => formats::AUDIO,
            MediaKind::Video => formats::VIDEO,
        }
    }

    /// Path segment on the resolver API (`/song/{id}`, `/video/{id}`).
    pub fn resolver_segment(&self) -> &'static str {
        match self {
            MediaKind::Audio => "song",
            MediaKind::Video => "video",
        }
    }

    /// JSON fields holding the download URL, in lookup order.
    pub fn resolver_url_fields(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Audio => &["link", "audio_url", "video_url", "url"],
            MediaKind::Video => &["link", "url"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Title and performer attached to an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackDescription {
    pub title: Option<String>,
    pub performer: Option<String>,
}

/// Optional constraints on what gets acquired.
#[derive(Debug, Clone, Default)]
pub struct QualityPreference {
    /// Overrides the kind's default yt-dlp format expression
    pub format: Option<String>,
    /// Metadata passed through to the upload step
    pub track: TrackDescription,
}

/// One user request, created per call.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub identifier: ContentIdentifier,
    pub kind: MediaKind,
    pub quality: QualityPreference,
}

impl AcquisitionRequest {
    pub fn new(identifier: ContentIdentifier, kind: MediaKind) -> Self {
        Self {
            identifier,
            kind,
            quality: QualityPreference::default(),
        }
    }

    pub fn audio(link: &str) -> Self {
        Self::new(ContentIdentifier::from_link(link), MediaKind::Audio)
    }

    pub fn video(link: &str) -> Self {
        Self::new(ContentIdentifier::from_link(link), MediaKind::Video)
    }

    #[must_use]
    pub fn with_quality(mut self, quality: QualityPreference) -> Self {
        self.quality = quality;
        self
    }

    /// Effective yt-dlp format expression.
    pub fn format(&self) -> &str {
        self.quality.format.as_deref().unwrap_or_else(|| self.kind.default_format())
    }
}

/// How a resolved URL must be turned into a local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// HLS playlist, needs ffmpeg
    Manifest,
    /// Plain file, byte-for-byte download
    Direct,
}

/// A URL that can be turned into an artifact. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMediaLocation {
    pub url: String,
    pub stream: StreamKind,
}

impl ResolvedMediaLocation {
    /// Classifies the URL once, at the boundary.
    pub fn classify(url: impl Into<String>) -> Self {
        let url = url.into();
        let is_manifest = url.contains(".m3u8") || url.contains("manifest/hls") || url.ends_with(".m3u8");
        Self {
            stream: if is_manifest { StreamKind::Manifest } else { StreamKind::Direct },
            url,
        }
    }

    pub fn is_manifest(&self) -> bool {
        self.stream == StreamKind::Manifest
    }
}

/// A complete file on local storage that passed the size check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size: u64,
}

/// What the pipeline hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Previously uploaded; nothing was touched on disk or network
    Cached { file_id: String },
    /// A local file, plus the file id if it was uploaded during this call
    Local {
        artifact: LocalArtifact,
        file_id: Option<String>,
    },
}

impl Acquisition {
    pub fn local_path(&self) -> Option<&std::path::Path> {
        match self {
            Acquisition::Local { artifact, .. } => Some(artifact.path.as_path()),
            Acquisition::Cached { .. } => None,
        }
    }

    pub fn file_id(&self) -> Option<&str> {
        match self {
            Acquisition::Cached { file_id } => Some(file_id),
            Acquisition::Local { file_id, .. } => file_id.as_deref(),
        }
    }
}

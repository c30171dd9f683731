//! Media acquisition: identifiers, stages, and the orchestrator that runs them

pub mod cookies;
pub mod error;
pub mod fetch;
pub mod identifier;
pub mod local;
pub mod pipeline;
pub mod resolver;
pub mod stages;
pub mod transcode;
pub mod types;
pub mod upload;
pub mod ytdlp;

// Re-exports for convenience
pub use error::{AcquisitionError, StageError, StageFailure};
pub use identifier::ContentIdentifier;
pub use pipeline::{MediaPipeline, MediaPipelineBuilder, VideoSource};
pub use types::{Acquisition, AcquisitionRequest, LocalArtifact, MediaKind, QualityPreference, TrackDescription};

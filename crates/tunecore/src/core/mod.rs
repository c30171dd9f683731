//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod process;
pub mod utils;

// Re-exports for convenience
pub use config::PipelineConfig;
pub use error::AppError;
pub use logging::{init_logger, log_pipeline_configuration};

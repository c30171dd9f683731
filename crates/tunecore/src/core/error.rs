use thiserror::Error;

/// Centralized error types for the pipeline crate
///
/// Stage-level failures never surface as `AppError`: they are recorded as
/// [`StageError`](crate::download::error::StageError) and the orchestrator moves on.
/// `AppError` is what the helpers underneath the stages return.
///
/// # Example
///
/// ```no_run
/// use tunecore::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// External process exceeded its wall-clock budget and was killed
    #[error("Process timed out after {0}s")]
    Timeout(u64),
}

use crate::core::error::AppError;
use crate::download::types::MediaKind;
use std::fmt;

/// Structured failure of a single pipeline stage.
///
/// Stage failures are never fatal: the orchestrator records them and moves on to
/// the next stage. They are `Clone` so concurrent waiters can share one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// Stage disabled by configuration (no resolver URL, no upload token, ...)
    NotConfigured(String),
    /// Connection / transport failure
    Network(String),
    /// Network call or external process ran out of time
    Timeout(String),
    /// Non-200 response
    HttpStatus(u16),
    /// Response body could not be decoded even after brace extraction
    MalformedResponse(String),
    /// Resolver answered, but the status is not one of the ready synonyms
    NotReady(String),
    /// Resolver said ready but no URL field was present
    MissingUrl,
    /// Output exists but is at or below the validity threshold
    Undersized { size: u64, min: u64 },
    /// Tool ran but produced nothing usable (bad exit code, empty output)
    Process(String),
    /// Local filesystem failure
    Io(String),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::NotConfigured(what) => write!(f, "skipped: {} not configured", what),
            StageError::Network(msg) => write!(f, "network error: {}", msg),
            StageError::Timeout(msg) => write!(f, "timed out: {}", msg),
            StageError::HttpStatus(code) => write!(f, "HTTP status {}", code),
            StageError::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
            StageError::NotReady(status) => write!(f, "not ready (status: {})", status),
            StageError::MissingUrl => write!(f, "ready but no download URL"),
            StageError::Undersized { size, min } => {
                write!(f, "output too small ({} bytes, need > {})", size, min)
            }
            StageError::Process(msg) => write!(f, "{}", msg),
            StageError::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for StageError {}

impl StageError {
    /// Returns subcategory for log lines
    pub fn subcategory(&self) -> &'static str {
        match self {
            StageError::NotConfigured(_) => "not_configured",
            StageError::Network(_) => "network",
            StageError::Timeout(_) => "timeout",
            StageError::HttpStatus(_) => "http_status",
            StageError::MalformedResponse(_) => "malformed",
            StageError::NotReady(_) => "not_ready",
            StageError::MissingUrl => "missing_url",
            StageError::Undersized { .. } => "undersized",
            StageError::Process(_) => "process",
            StageError::Io(_) => "io",
        }
    }

    /// True when the stage never ran because it is disabled.
    pub fn is_skip(&self) -> bool {
        matches!(self, StageError::NotConfigured(_))
    }
}

impl From<AppError> for StageError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Http(e) if e.is_timeout() => StageError::Timeout(e.to_string()),
            AppError::Http(e) => StageError::Network(e.to_string()),
            AppError::Io(e) => StageError::Io(e.to_string()),
            AppError::Json(e) => StageError::MalformedResponse(e.to_string()),
            AppError::Timeout(secs) => StageError::Timeout(format!("after {}s", secs)),
        }
    }
}

/// A stage failure tagged with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: &'static str,
    pub error: StageError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.error)
    }
}

/// Terminal failure: every stage was tried and none produced an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionError {
    pub identifier: String,
    pub kind: MediaKind,
    pub failures: Vec<StageFailure>,
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all methods failed for {} ({})", self.identifier, self.kind.label())?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for AcquisitionError {}

impl AcquisitionError {
    /// Failure reported by a given stage, if that stage ran.
    pub fn failure_of(&self, stage: &str) -> Option<&StageError> {
        self.failures.iter().find(|f| f.stage == stage).map(|f| &f.error)
    }
}

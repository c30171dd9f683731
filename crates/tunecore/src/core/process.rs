//! Process execution utilities with timeout support
//!
//! Helpers for running external processes (ffmpeg, yt-dlp) with a wall-clock
//! budget so a hung process can't block a request forever.

use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use crate::core::error::AppError;

/// Run an async Command with a timeout.
///
/// Output is captured. The child is spawned with `kill_on_drop`, so when the
/// timeout fires the pending future is dropped and the process is killed.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, AppError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn()?;
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AppError::Io(e)),
        Err(_) => {
            log::warn!("Process timed out after {}s, killed", timeout.as_secs());
            Err(AppError::Timeout(timeout.as_secs()))
        }
    }
}

/// First line of stderr, trimmed, for log lines and stage failures.
pub fn stderr_summary(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no stderr output")
        .to_string()
}

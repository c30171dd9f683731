//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{init_test_logging, TestEnvironment, MIN_AUDIO_OK, MIN_VIDEO_OK};
#[cfg(unix)]
#[allow(unused_imports)]
pub use fixtures::scripted_ytdlp;

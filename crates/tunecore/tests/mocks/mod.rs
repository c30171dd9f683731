//! Recording mocks for every pipeline collaborator
//!
//! Each mock appends a line to a shared [`CallLog`] when it is invoked, so tests
//! can assert on which stages ran and in what order.

pub mod mock_stages;

#[allow(unused_imports)]
pub use mock_stages::{CallLog, MockExtractor, MockFetcher, MockResolver, MockTranscoder, MockUploader};

//! Persistent state owned by the pipeline

pub mod file_ids;

// Re-exports for convenience
pub use file_ids::FileIdStore;

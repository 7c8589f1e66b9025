//! Error types for tidepool.

use thiserror::Error;

use crate::config::ReplacementStrategy;
use crate::page::PageNum;

/// Result type alias using TidepoolError.
pub type Result<T> = std::result::Result<T, TidepoolError>;

/// Errors that can occur in tidepool operations.
#[derive(Debug, Error)]
pub enum TidepoolError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Paged file errors
    #[error("Page file not found: {}", path.display())]
    FileNotFound { path: std::path::PathBuf },

    #[error("Read of non-existing page {page}: file has {total_pages} pages")]
    ReadNonExistingPage { page: PageNum, total_pages: u32 },

    #[error("Write failed for page {page}: {reason}")]
    WriteFailed { page: PageNum, reason: String },

    // Buffer pool errors
    #[error("Buffer pool init failed: {0}")]
    PoolInit(String),

    #[error("Buffer pool exhausted: all frames pinned")]
    PoolExhausted,

    #[error("Shutdown failed: {count} pages still pinned")]
    PinnedPagesRemain { count: usize },

    #[error("Replacement strategy not implemented: {0}")]
    StrategyNotImplemented(ReplacementStrategy),

    #[error("Page not resident: {page}")]
    PageNotResident { page: PageNum },

    #[error("Page not pinned: {page}")]
    PageNotPinned { page: PageNum },

    #[error("Buffer pool is closed")]
    PoolClosed,
}

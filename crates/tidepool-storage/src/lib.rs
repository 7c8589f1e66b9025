//! Paged file storage for tidepool.
//!
//! This crate provides the on-disk collaborator of the buffer pool: a flat
//! file of fixed-size pages addressed by page number, grown only by
//! appending zero-filled blocks.

mod file;

pub use file::{PagedFile, PagedFileOptions};

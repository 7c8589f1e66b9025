//! tidepool common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all tidepool components.

pub mod config;
pub mod error;
pub mod page;

pub use config::{CacheConfig, ReplacementStrategy};
pub use error::{Result, TidepoolError};
pub use page::{PageNum, PAGE_SIZE};

//! Page constants and identifiers for tidepool.

use serde::{Deserialize, Serialize};

/// Size of one page in bytes (4 KB).
pub const PAGE_SIZE: usize = 4096;

/// Number of a page within the backing file (0-indexed).
///
/// Page `n` occupies the byte range `[n * PAGE_SIZE, (n + 1) * PAGE_SIZE)`.
/// There is no sentinel value; an empty frame is `Option::<PageNum>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageNum(pub u32);

impl PageNum {
    /// Byte offset of this page within the backing file.
    pub fn offset(&self) -> u64 {
        self.0 as u64 * PAGE_SIZE as u64
    }

    /// Number of the page after this one.
    pub fn next(&self) -> PageNum {
        PageNum(self.0 + 1)
    }
}

impl std::fmt::Display for PageNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PageNum {
    fn from(value: u32) -> Self {
        PageNum(value)
    }
}

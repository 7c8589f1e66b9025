//! Paged file with fixed-size block I/O.

use log::debug;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tidepool_common::page::{PageNum, PAGE_SIZE};
use tidepool_common::{Result, TidepoolError};

/// Options for opening a paged file.
#[derive(Debug, Clone)]
pub struct PagedFileOptions {
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for PagedFileOptions {
    fn default() -> Self {
        Self {
            fsync_enabled: true,
        }
    }
}

/// A flat file of fixed-size pages.
///
/// The file has no header: page `n` lives at byte offset `n * PAGE_SIZE`,
/// and the file length, always a whole number of pages, is the sole source
/// of truth for the page count. Pages are grown only by [`append`] and
/// [`ensure_capacity`], which write zero-filled blocks at the end.
///
/// [`append`]: PagedFile::append
/// [`ensure_capacity`]: PagedFile::ensure_capacity
pub struct PagedFile {
    /// Path to the file.
    path: PathBuf,
    /// Open options.
    options: PagedFileOptions,
    /// Open handle plus the cached page count.
    inner: Mutex<FileInner>,
}

/// Handle for the open page file.
struct FileInner {
    /// The file handle.
    file: File,
    /// Number of pages in the file.
    num_pages: u32,
}

impl PagedFile {
    /// Creates a page file at `path` containing a single zero-filled page.
    ///
    /// An existing file at the same path is truncated.
    pub fn create(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.write_all(&[0u8; PAGE_SIZE])?;
        file.sync_all()?;

        debug!("created page file {}", path.display());
        Ok(())
    }

    /// Opens an existing page file with default options.
    ///
    /// Fails with `FileNotFound` if the file does not exist; `open` never
    /// creates.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, PagedFileOptions::default())
    }

    /// Opens an existing page file.
    pub fn open_with(path: impl AsRef<Path>, options: PagedFileOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TidepoolError::FileNotFound { path });
            }
            Err(e) => return Err(e.into()),
        };

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            path,
            options,
            inner: Mutex::new(FileInner { file, num_pages }),
        })
    }

    /// Removes a page file from disk.
    ///
    /// Fails with `FileNotFound` if there is nothing to remove.
    pub fn destroy(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TidepoolError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        std::fs::remove_file(path)?;

        debug!("destroyed page file {}", path.display());
        Ok(())
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of pages in the file.
    pub fn total_pages(&self) -> u32 {
        self.inner.lock().num_pages
    }

    /// Reads page `page` into `buf`.
    ///
    /// Fails with `ReadNonExistingPage` when `page` is outside
    /// `[0, total_pages)`.
    pub fn read_block(&self, page: PageNum, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();

        if page.0 >= inner.num_pages {
            return Err(TidepoolError::ReadNonExistingPage {
                page,
                total_pages: inner.num_pages,
            });
        }

        inner.file.seek(SeekFrom::Start(page.offset()))?;
        inner.file.read_exact(buf)?;
        Ok(())
    }

    /// Writes `buf` to page `page`.
    ///
    /// The page must already exist; growth goes through [`append`] or
    /// [`ensure_capacity`]. All seek and write failures surface as
    /// `WriteFailed`.
    ///
    /// [`append`]: PagedFile::append
    /// [`ensure_capacity`]: PagedFile::ensure_capacity
    pub fn write_block(&self, page: PageNum, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();

        if page.0 >= inner.num_pages {
            return Err(TidepoolError::WriteFailed {
                page,
                reason: format!("page beyond end of file ({} pages)", inner.num_pages),
            });
        }

        let write_failed = |e: std::io::Error| TidepoolError::WriteFailed {
            page,
            reason: e.to_string(),
        };
        inner
            .file
            .seek(SeekFrom::Start(page.offset()))
            .map_err(write_failed)?;
        inner.file.write_all(buf).map_err(write_failed)?;

        if self.options.fsync_enabled {
            inner.file.sync_all()?;
        }
        Ok(())
    }

    /// Appends one zero-filled page and returns its number.
    pub fn append(&self) -> Result<PageNum> {
        let mut inner = self.inner.lock();
        let page = PageNum(inner.num_pages);
        Self::append_zero_page(&mut inner, page)?;

        if self.options.fsync_enabled {
            inner.file.sync_all()?;
        }
        Ok(page)
    }

    /// Appends zero-filled pages until the file holds at least `n` pages.
    ///
    /// No-op when the file is already large enough.
    pub fn ensure_capacity(&self, n: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.num_pages >= n {
            return Ok(());
        }

        while inner.num_pages < n {
            let page = PageNum(inner.num_pages);
            Self::append_zero_page(&mut inner, page)?;
        }

        if self.options.fsync_enabled {
            inner.file.sync_all()?;
        }
        Ok(())
    }

    /// Flushes file buffers to disk.
    pub fn sync(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }

    /// Flushes and closes the file.
    pub fn close(self) -> Result<()> {
        self.sync()
    }

    fn append_zero_page(inner: &mut FileInner, page: PageNum) -> Result<()> {
        let write_failed = |e: std::io::Error| TidepoolError::WriteFailed {
            page,
            reason: e.to_string(),
        };
        inner
            .file
            .seek(SeekFrom::Start(page.offset()))
            .map_err(write_failed)?;
        inner
            .file
            .write_all(&[0u8; PAGE_SIZE])
            .map_err(write_failed)?;
        inner.num_pages = page.0 + 1;
        Ok(())
    }
}

impl Drop for PagedFile {
    fn drop(&mut self) {
        let _ = self.inner.lock().file.sync_all();
    }
}

//! Cache Storage
//!
//! The disk cache keeps one flat directory of media files. This module is
//! the I/O it needs from the host: sandboxed app storage on mobile, plain
//! `tokio::fs` on desktop.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A regular file found by [`FileSystemAccess::list_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    /// Last modification, seconds since the Unix epoch.
    pub modified_at: Option<i64>,
}

/// File I/O for the media cache.
///
/// Paths are absolute. A missing file is an error for reads; for
/// [`remove_file`](FileSystemAccess::remove_file) it is not.
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Create `path` and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Regular files directly under `dir`. Subdirectories are skipped.
    async fn list_files(&self, dir: &Path) -> Result<Vec<FileEntry>>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Replace the contents of `path`. Readers never see a partial write.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete `path`. Succeeds when it does not exist.
    async fn remove_file(&self, path: &Path) -> Result<()>;

    /// Total size of the regular files directly under `dir`.
    async fn used_bytes(&self, dir: &Path) -> Result<u64> {
        Ok(self.list_files(dir).await?.iter().map(|f| f.size).sum())
    }
}

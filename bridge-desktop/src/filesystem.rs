//! Media cache storage on the local disk.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileEntry, FileSystemAccess},
};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{debug, trace};

/// Directory name under the platform cache root.
const APP_CACHE_DIR: &str = "reelplay";

/// Suffix for in-flight writes; never a valid cache key.
const PARTIAL_SUFFIX: &str = ".partial";

/// Platform cache root for media files: `~/.cache/reelplay` on Linux,
/// `~/Library/Caches/reelplay` on macOS, `%LOCALAPPDATA%\reelplay` on Windows.
/// Falls back to the temp directory when the platform reports none.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_CACHE_DIR)
}

/// [`FileSystemAccess`] over `tokio::fs`.
///
/// Writes go to a sibling `.partial` file that is renamed into place, so an
/// interrupted download never leaves a truncated entry under its final name.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(e: std::io::Error) -> BridgeError {
    match e.kind() {
        ErrorKind::PermissionDenied => BridgeError::PermissionDenied(e.to_string()),
        _ => BridgeError::Io(e),
    }
}

fn unix_secs(time: SystemTime) -> Option<i64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|since| since.as_secs() as i64)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(io_error)
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<FileEntry>> {
        let mut read_dir = fs::read_dir(dir).await.map_err(io_error)?;
        let mut files = Vec::new();

        while let Some(entry) = read_dir.next_entry().await.map_err(io_error)? {
            // Entries can vanish between listing and stat; skip them.
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            files.push(FileEntry {
                path: entry.path(),
                size: meta.len(),
                modified_at: meta.modified().ok().and_then(unix_secs),
            });
        }

        trace!(dir = ?dir, count = files.len(), "Listed cache files");
        Ok(files)
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        fs::read(path).await.map(Bytes::from).map_err(io_error)
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let partial = partial_path(path);
        fs::write(&partial, &data).await.map_err(io_error)?;
        if let Err(e) = fs::rename(&partial, path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(io_error(e));
        }

        debug!(path = ?path, size = data.len(), "Wrote cache file");
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}

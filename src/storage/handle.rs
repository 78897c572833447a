use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::engine::CacheFile;
use super::error::StorageError;
use super::file::{AccessMode, ReadPolicy};
use crate::cache::{BufferPool, PooledBuffer};

/// Exclusive owner of one storage-engine handle.
///
/// Move and rename failures are reported as-is; rolling back any metadata
/// that referenced the old location is the caller's job.
pub struct StorageHandle {
    file: Box<dyn CacheFile>,
    pool: Arc<BufferPool>,
}

impl StorageHandle {
    pub fn new(file: Box<dyn CacheFile>, pool: Arc<BufferPool>) -> Self {
        Self { file, pool }
    }

    /// Reads `length` bytes at `offset` into a pooled buffer.
    ///
    /// Ranges past the end of the file are rejected before any buffer is
    /// taken. On a failed read the buffer goes back to the pool before the
    /// error is returned.
    pub fn read(&self, offset: u64, length: usize) -> Result<PooledBuffer, StorageError> {
        let requested = length as u64;
        match offset.checked_add(requested) {
            Some(end) if end <= self.file.length() => {}
            _ => {
                return Err(StorageError::InvalidRange {
                    offset,
                    length: requested,
                })
            }
        }

        let mut buffer = self.pool.get_buffer(length);

        if let Err(e) = self.file.read(&mut buffer, offset, ReadPolicy::Cache) {
            buffer.return_to_pool();
            tracing::debug!(
                "read of {} bytes at {} from {} failed: {}",
                length,
                offset,
                self.file.path().display(),
                e
            );
            return Err(e);
        }

        Ok(buffer)
    }

    pub fn move_file(&self, new_path: &Path) -> Result<(), StorageError> {
        self.file.move_file(new_path)
    }

    pub fn rename_file(&self, new_name: &str) -> Result<(), StorageError> {
        self.file.rename_file(new_name)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.file.flush()
    }

    pub fn access_mode(&self) -> AccessMode {
        self.file.access_mode()
    }

    pub fn set_access_mode(&self, mode: AccessMode) -> Result<(), StorageError> {
        self.file.set_access_mode(mode)
    }

    pub fn path(&self) -> PathBuf {
        self.file.path()
    }

    pub fn cache_file(&self) -> &dyn CacheFile {
        self.file.as_ref()
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }
}

use std::path::{Path, PathBuf};

use super::error::StorageError;
use super::file::{AccessMode, CacheMode, ReadPolicy, StorageType};
use crate::layout::TorrentFile;

/// What the storage engine needs to know about the file that owns a handle.
pub trait CacheFileOwner: Send + Sync {
    /// Name of the owning transfer, used in engine diagnostics.
    fn cache_file_owner_name(&self) -> String;

    fn cache_file_torrent_file(&self) -> &TorrentFile;

    /// Directory for engine control files (reorder maps, compact headers).
    fn cache_file_control_dir(&self) -> Option<PathBuf>;

    fn cache_mode(&self) -> CacheMode;
}

/// One file's bytes inside the storage engine.
///
/// All operations take `&self`; implementations synchronise internally so a
/// handle can be driven from I/O completion threads.
pub trait CacheFile: Send + Sync {
    /// Current on-disk location.
    fn path(&self) -> PathBuf;

    /// Logical length of the file in bytes; reads must stay within it.
    fn length(&self) -> u64;

    /// Fills `buf` with the bytes starting at file offset `offset`.
    fn read(&self, buf: &mut [u8], offset: u64, policy: ReadPolicy) -> Result<(), StorageError>;

    fn write(&self, data: &[u8], offset: u64) -> Result<(), StorageError>;

    /// Moves the backing file to `new_path`, keeping the handle usable.
    fn move_file(&self, new_path: &Path) -> Result<(), StorageError>;

    /// Renames the backing file within its current directory.
    fn rename_file(&self, new_name: &str) -> Result<(), StorageError>;

    fn flush(&self) -> Result<(), StorageError>;

    fn access_mode(&self) -> AccessMode;

    fn set_access_mode(&self, mode: AccessMode) -> Result<(), StorageError>;

    fn storage_type(&self) -> StorageType;

    fn set_storage_type(&self, storage_type: StorageType) -> Result<(), StorageError>;

    fn close(&self) -> Result<(), StorageError>;
}

/// Factory for [`CacheFile`] handles.
pub trait CacheFileManager: Send + Sync {
    fn create_file(
        &self,
        owner: &dyn CacheFileOwner,
        path: &Path,
        storage_type: StorageType,
    ) -> Result<Box<dyn CacheFile>, StorageError>;
}

use std::sync::Arc;

use super::DiskFileInfo;
use crate::layout::TorrentLayout;
use crate::piece::PieceStates;
use crate::state::DownloadState;
use crate::storage::{AccessMode, CacheMode, StorageType};

/// The manager that owns a transfer's files.
///
/// It supplies transfer metadata and piece progress, decides policy
/// (priorities, storage types, skip set) and is told when a file changes.
pub trait DiskManagerHelper: Send + Sync {
    /// Name of the transfer, used in logs and by the storage engine.
    fn internal_name(&self) -> String;

    fn layout(&self) -> &TorrentLayout;

    fn pieces(&self) -> &dyn PieceStates;

    /// Persisted state of the transfer, or `None` once the download has been
    /// torn down.
    fn download_state(&self) -> Option<Arc<dyn DownloadState>>;

    fn cache_mode(&self) -> CacheMode;

    fn storage_type(&self, file_index: usize) -> StorageType;

    /// Changes the storage type of every file set in `mask`. Returns one
    /// success flag per file.
    fn set_storage_types(&self, mask: &[bool], storage_type: StorageType) -> Vec<bool>;

    fn access_mode_changed(&self, file: &DiskFileInfo, old: AccessMode, new: AccessMode);

    fn priority_changed(&self, file: &DiskFileInfo);

    fn skipped_file_set_changed(&self, file: &DiskFileInfo);

    /// Re-checks on-disk existence for every file set in `mask`.
    fn file_existence_checks(&self, mask: &[bool]);
}

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::error::FileInfoError;
use super::listener::{replay, DiskFileInfoListener, ListenerSet, Stream};
use super::owner::DiskManagerHelper;
use super::relocation::Relocation;
use crate::cache::{BufferPool, PooledBuffer};
use crate::layout::TorrentFile;
use crate::state::{Attribute, DownloadState};
use crate::storage::{
    validate_file_path, AccessMode, CacheFile, CacheFileManager, CacheFileOwner, CacheMode,
    StorageHandle, StorageType,
};

/// The parts of a file the storage engine is allowed to see.
struct FileIdentity {
    owner: Weak<dyn DiskManagerHelper>,
    torrent_file: TorrentFile,
}

impl CacheFileOwner for FileIdentity {
    fn cache_file_owner_name(&self) -> String {
        self.owner
            .upgrade()
            .map(|owner| owner.internal_name())
            .unwrap_or_default()
    }

    fn cache_file_torrent_file(&self) -> &TorrentFile {
        &self.torrent_file
    }

    fn cache_file_control_dir(&self) -> Option<PathBuf> {
        self.owner
            .upgrade()
            .and_then(|owner| owner.download_state())
            .map(|state| state.state_file())
    }

    fn cache_mode(&self) -> CacheMode {
        self.owner
            .upgrade()
            .map(|owner| owner.cache_mode())
            .unwrap_or_default()
    }
}

/// One file of a transfer.
///
/// Owns the file's storage handle and listener set, and carries the
/// per-file policy state (priority, skip flag, storage type) set by the
/// owning manager. The manager is held weakly; once it is gone callbacks and
/// relocations are skipped.
pub struct DiskFileInfo {
    identity: FileIdentity,
    root_dir: RwLock<PathBuf>,
    relative_path: PathBuf,
    storage: StorageHandle,
    extension: RwLock<Option<String>>,
    downloaded: AtomicU64,
    priority: AtomicI32,
    skipped: AtomicBool,
    listeners: ListenerSet,
}

impl DiskFileInfo {
    /// Creates the descriptor for file `file_index` of the owner's layout and
    /// asks `engine` for its storage handle.
    ///
    /// Compact layouts start out skipped.
    pub fn new(
        owner: &Arc<dyn DiskManagerHelper>,
        engine: &dyn CacheFileManager,
        pool: Arc<BufferPool>,
        root_dir: impl Into<PathBuf>,
        relative_path: impl Into<PathBuf>,
        file_index: usize,
        storage_type: StorageType,
    ) -> Result<Self, FileInfoError> {
        let layout = owner.layout();
        let torrent_file = layout
            .file(file_index)
            .cloned()
            .ok_or(FileInfoError::InvalidIndex {
                index: file_index,
                count: layout.file_count(),
            })?;

        let root_dir = root_dir.into();
        let relative_path = relative_path.into();
        let path = root_dir.join(&relative_path);

        validate_file_path(&relative_path).map_err(|source| FileInfoError::Create {
            path: path.display().to_string(),
            source,
        })?;

        let identity = FileIdentity {
            owner: Arc::downgrade(owner),
            torrent_file,
        };

        let cache_file = engine
            .create_file(&identity, &path, storage_type)
            .map_err(|source| FileInfoError::Create {
                path: path.display().to_string(),
                source,
            })?;

        Ok(Self {
            identity,
            root_dir: RwLock::new(root_dir),
            relative_path,
            storage: StorageHandle::new(cache_file, pool),
            extension: RwLock::new(None),
            downloaded: AtomicU64::new(0),
            priority: AtomicI32::new(0),
            skipped: AtomicBool::new(storage_type.default_skipped()),
            listeners: ListenerSet::new(),
        })
    }

    fn owner(&self) -> Option<Arc<dyn DiskManagerHelper>> {
        self.identity.owner.upgrade()
    }

    fn download_state(&self) -> Option<Arc<dyn DownloadState>> {
        self.owner().and_then(|owner| owner.download_state())
    }

    fn one_hot_mask(&self, owner: &dyn DiskManagerHelper) -> Vec<bool> {
        let mut mask = vec![false; owner.layout().file_count()];
        if let Some(slot) = mask.get_mut(self.index()) {
            *slot = true;
        }
        mask
    }

    pub fn index(&self) -> usize {
        self.identity.torrent_file.index
    }

    pub fn torrent_file(&self) -> &TorrentFile {
        &self.identity.torrent_file
    }

    pub fn length(&self) -> u64 {
        self.identity.torrent_file.length
    }

    pub fn first_piece_number(&self) -> u32 {
        self.identity.torrent_file.first_piece
    }

    pub fn last_piece_number(&self) -> u32 {
        self.identity.torrent_file.last_piece
    }

    pub fn piece_count(&self) -> u32 {
        self.identity.torrent_file.piece_count()
    }

    pub fn root_dir(&self) -> PathBuf {
        self.root_dir.read().clone()
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Location of the file: its link when `follow_link` is set and a link
    /// exists, otherwise `root_dir/relative_path`.
    pub fn file(&self, follow_link: bool) -> PathBuf {
        if follow_link {
            if let Some(link) = self.link() {
                return link;
            }
        }
        self.root_dir.read().join(&self.relative_path)
    }

    pub fn link(&self) -> Option<PathBuf> {
        self.download_state()?.file_link(&self.file(false))
    }

    pub fn is_linked(&self) -> bool {
        self.link().is_some()
    }

    /// Links can only change while the transfer is stopped, and a live
    /// descriptor means it is running, so this always refuses.
    pub fn set_link(&self, destination: &Path) -> bool {
        tracing::warn!(
            "file {}: set_link to {} refused, download must be stopped",
            self.index(),
            destination.display()
        );
        false
    }

    pub fn set_link_atomic(&self, destination: &Path) -> bool {
        self.set_link(destination)
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn set_downloaded(&self, downloaded: u64) {
        self.downloaded.store(downloaded, Ordering::Relaxed);
    }

    pub fn extension(&self) -> Option<String> {
        self.extension.read().clone()
    }

    pub fn set_extension(&self, extension: impl Into<String>) {
        *self.extension.write() = Some(extension.into());
    }

    pub fn priority(&self) -> i32 {
        self.priority.load(Ordering::Relaxed)
    }

    pub fn set_priority(&self, priority: i32) {
        self.priority.store(priority, Ordering::Relaxed);
        if let Some(owner) = self.owner() {
            owner.priority_changed(self);
        }
    }

    pub fn storage_type(&self) -> StorageType {
        match self.owner() {
            Some(owner) => owner.storage_type(self.index()),
            None => self.storage.cache_file().storage_type(),
        }
    }

    /// Asks the owner to change this file's storage type. The owner applies
    /// storage types across the whole file set.
    pub fn set_storage_type(&self, storage_type: StorageType) -> bool {
        let Some(owner) = self.owner() else {
            return false;
        };
        let mask = self.one_hot_mask(owner.as_ref());
        owner
            .set_storage_types(&mask, storage_type)
            .get(self.index())
            .copied()
            .unwrap_or(false)
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Marks the file skipped or wanted.
    ///
    /// Unskipping a compact file first converts it to the matching
    /// non-compact layout; if that fails nothing changes and `false` is
    /// returned. Relocation into or out of the do-not-download subfolder is
    /// best effort and never affects the result.
    pub fn set_skipped(&self, skipped: bool) -> bool {
        let existing = self.storage_type();

        if !skipped && existing.is_compact() {
            let target = existing.expanded();
            if !self.set_storage_type(target) {
                tracing::debug!(
                    "file {}: cannot unskip, conversion from {:?} to {:?} failed",
                    self.index(),
                    existing,
                    target
                );
                return false;
            }
            tracing::debug!(
                "file {}: converted from {:?} to {:?} for download",
                self.index(),
                existing,
                target
            );
        }

        self.set_skipped_internal(skipped);

        if let Some(owner) = self.owner() {
            owner.skipped_file_set_changed(self);
            if !skipped {
                owner.file_existence_checks(&self.one_hot_mask(owner.as_ref()));
            }
        }
        true
    }

    pub(crate) fn set_skipped_internal(&self, skipped: bool) {
        self.skipped.store(skipped, Ordering::SeqCst);

        let Some(state) = self.download_state() else {
            return;
        };
        let Some(subfolder) = state
            .attribute(Attribute::DndSubfolder)
            .filter(|s| !s.is_empty())
        else {
            return;
        };

        let relocation = Relocation {
            state: state.as_ref(),
            storage: &self.storage,
            default_path: self.file(false),
            subfolder: &subfolder,
        };
        let result = if skipped {
            relocation.into_subfolder()
        } else {
            relocation.out_of_subfolder()
        };

        match result {
            Ok(Some(path)) => {
                tracing::debug!("file {}: relocated to {}", self.index(), path.display());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "file {}: relocation of {} failed: {}",
                    self.index(),
                    relocation.default_path.display(),
                    e
                );
            }
        }
    }

    pub fn access_mode(&self) -> AccessMode {
        self.storage.access_mode()
    }

    /// Sets the access mode and tells the owner if it actually changed.
    pub fn set_access_mode(&self, mode: AccessMode) -> Result<(), FileInfoError> {
        let old = self.storage.access_mode();
        self.storage
            .set_access_mode(mode)
            .map_err(FileInfoError::AccessMode)?;

        if old != mode {
            if let Some(owner) = self.owner() {
                owner.access_mode_changed(self, old, mode);
            }
        }
        Ok(())
    }

    /// Moves the file's base directory. Unless `link_only` is set the data
    /// is physically moved to `new_path` as well.
    pub fn move_file(
        &self,
        new_root: impl Into<PathBuf>,
        new_path: &Path,
        link_only: bool,
    ) -> Result<(), FileInfoError> {
        if !link_only {
            self.storage
                .move_file(new_path)
                .map_err(|source| FileInfoError::Move {
                    path: new_path.display().to_string(),
                    source,
                })?;
        }
        *self.root_dir.write() = new_root.into();
        Ok(())
    }

    pub fn rename_file(&self, new_name: &str) -> Result<(), FileInfoError> {
        self.storage
            .rename_file(new_name)
            .map_err(|source| FileInfoError::Rename {
                name: new_name.to_string(),
                source,
            })
    }

    pub fn flush_cache(&self) -> Result<(), FileInfoError> {
        self.storage.flush().map_err(FileInfoError::Flush)
    }

    /// Reads `length` bytes at file offset `offset`.
    pub fn read(&self, offset: u64, length: usize) -> Result<PooledBuffer, FileInfoError> {
        self.storage
            .read(offset, length)
            .map_err(|source| FileInfoError::Read {
                offset,
                length,
                source,
            })
    }

    pub fn cache_file(&self) -> &dyn CacheFile {
        self.storage.cache_file()
    }

    pub fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    /// Closing is handled by the owner when the whole transfer closes.
    pub fn close(&self) {}

    /// Registers `listener` and replays existing progress to it before
    /// returning. Registering the same listener twice does nothing.
    ///
    /// Live events that arrive during the replay are queued and delivered
    /// right after it, ahead of any later event.
    pub fn add_listener(&self, listener: Arc<dyn DiskFileInfoListener>) {
        if !self.listeners.begin(listener.clone()) {
            return;
        }

        if let Some(owner) = self.owner() {
            let emitted = replay(
                self.torrent_file(),
                owner.layout().piece_length(),
                owner.pieces(),
                listener.as_ref(),
            );
            tracing::trace!(
                "file {}: replayed progress in {} notifications",
                self.index(),
                emitted
            );
        }

        self.listeners.complete(&listener, self.index());
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DiskFileInfoListener>) -> bool {
        self.listeners.remove(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Forwards a write of `length` bytes at transfer offset `offset` to every
    /// listener. The range is clipped to this file first.
    pub fn on_data_written(&self, offset: u64, length: u64) {
        self.forward(Stream::Written, offset, length);
    }

    /// Forwards a verification of `length` bytes at transfer offset `offset`
    /// to every listener. The range is clipped to this file first.
    pub fn on_data_verified(&self, offset: u64, length: u64) {
        self.forward(Stream::Verified, offset, length);
    }

    fn forward(&self, stream: Stream, offset: u64, length: u64) {
        if self.listeners.is_empty() {
            return;
        }
        let Some((relative, length)) = self
            .torrent_file()
            .relative(offset..offset.saturating_add(length))
        else {
            return;
        };
        self.listeners.notify(stream, relative, length, self.index());
    }
}

impl CacheFileOwner for DiskFileInfo {
    fn cache_file_owner_name(&self) -> String {
        self.identity.cache_file_owner_name()
    }

    fn cache_file_torrent_file(&self) -> &TorrentFile {
        self.identity.cache_file_torrent_file()
    }

    fn cache_file_control_dir(&self) -> Option<PathBuf> {
        self.identity.cache_file_control_dir()
    }

    fn cache_mode(&self) -> CacheMode {
        self.identity.cache_mode()
    }
}

impl std::fmt::Debug for DiskFileInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskFileInfo")
            .field("index", &self.index())
            .field("path", &self.file(false))
            .field("skipped", &self.is_skipped())
            .field("priority", &self.priority())
            .finish()
    }
}

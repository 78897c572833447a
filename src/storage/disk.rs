use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::engine::{CacheFile, CacheFileManager, CacheFileOwner};
use super::error::StorageError;
use super::file::{validate_file_name, AccessMode, AllocationMode, ReadPolicy, StorageType};

/// Runtime options for [`DiskCacheFileManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStorageConfig {
    /// Extend fully allocated layouts to their final length when first
    /// opened for writing.
    pub preallocate: bool,
    /// Create missing parent directories on open and move.
    pub create_parent_dirs: bool,
}

impl Default for DiskStorageConfig {
    fn default() -> Self {
        Self {
            preallocate: true,
            create_parent_dirs: true,
        }
    }
}

impl DiskStorageConfig {
    pub fn with_preallocate(mut self, preallocate: bool) -> Self {
        self.preallocate = preallocate;
        self
    }

    pub fn with_create_parent_dirs(mut self, create: bool) -> Self {
        self.create_parent_dirs = create;
        self
    }
}

/// Storage engine backed by one plain file per [`CacheFile`].
#[derive(Debug, Default)]
pub struct DiskCacheFileManager {
    config: DiskStorageConfig,
}

impl DiskCacheFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DiskStorageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> DiskStorageConfig {
        self.config
    }
}

impl CacheFileManager for DiskCacheFileManager {
    fn create_file(
        &self,
        owner: &dyn CacheFileOwner,
        path: &Path,
        storage_type: StorageType,
    ) -> Result<Box<dyn CacheFile>, StorageError> {
        if path.is_dir() {
            return Err(StorageError::NotAFile(path.display().to_string()));
        }

        let owner_name = owner.cache_file_owner_name();
        tracing::debug!(
            "{}: creating {:?} cache file at {}",
            owner_name,
            storage_type,
            path.display()
        );

        Ok(Box::new(DiskCacheFile {
            owner_name,
            length: owner.cache_file_torrent_file().length,
            config: self.config,
            state: Mutex::new(DiskFileState {
                path: path.to_path_buf(),
                storage_type,
                mode: AccessMode::Read,
                file: None,
            }),
        }))
    }
}

struct DiskFileState {
    path: PathBuf,
    storage_type: StorageType,
    mode: AccessMode,
    file: Option<File>,
}

/// A single file on disk, opened lazily.
pub struct DiskCacheFile {
    owner_name: String,
    length: u64,
    config: DiskStorageConfig,
    state: Mutex<DiskFileState>,
}

impl DiskCacheFile {
    fn check_range(&self, offset: u64, length: usize) -> Result<(), StorageError> {
        let length = length as u64;
        match offset.checked_add(length) {
            Some(end) if end <= self.length => Ok(()),
            _ => Err(StorageError::InvalidRange { offset, length }),
        }
    }

    fn open_for_write(&self, path: &Path, storage_type: StorageType) -> Result<File, StorageError> {
        if self.config.create_parent_dirs {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        if self.config.preallocate
            && storage_type.allocation_mode() == AllocationMode::Full
            && file.metadata()?.len() < self.length
        {
            file.set_len(self.length)?;
        }

        Ok(file)
    }

    fn handle<'a>(&self, state: &'a mut DiskFileState) -> Result<&'a mut File, StorageError> {
        let file = match state.file.take() {
            Some(file) => file,
            None => match state.mode {
                AccessMode::Read => File::open(&state.path).map_err(|e| match e.kind() {
                    ErrorKind::NotFound => StorageError::FileNotFound(state.path.display().to_string()),
                    _ => StorageError::Io(e),
                })?,
                AccessMode::Write => self.open_for_write(&state.path, state.storage_type)?,
            },
        };
        Ok(state.file.insert(file))
    }

    fn close_handle(state: &mut DiskFileState) -> Result<(), StorageError> {
        if let Some(file) = state.file.take() {
            if state.mode == AccessMode::Write {
                file.sync_data()?;
            }
        }
        Ok(())
    }

    fn move_locked(&self, state: &mut DiskFileState, new_path: &Path) -> Result<(), StorageError> {
        if state.path == new_path {
            return Ok(());
        }
        if new_path.exists() {
            return Err(StorageError::AlreadyExists(new_path.display().to_string()));
        }

        Self::close_handle(state)?;

        if state.path.exists() {
            if self.config.create_parent_dirs {
                if let Some(parent) = new_path.parent() {
                    fs::create_dir_all(parent)?;
                }
            }
            if let Err(e) = fs::rename(&state.path, new_path) {
                // rename cannot cross filesystems
                fs::copy(&state.path, new_path).map_err(|_| StorageError::Io(e))?;
                fs::remove_file(&state.path)?;
            }
        }

        tracing::debug!(
            "{}: moved {} to {}",
            self.owner_name,
            state.path.display(),
            new_path.display()
        );
        state.path = new_path.to_path_buf();
        Ok(())
    }
}

impl CacheFile for DiskCacheFile {
    fn path(&self) -> PathBuf {
        self.state.lock().path.clone()
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn read(&self, buf: &mut [u8], offset: u64, _policy: ReadPolicy) -> Result<(), StorageError> {
        self.check_range(offset, buf.len())?;
        let mut state = self.state.lock();
        let file = self.handle(&mut state)?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write(&self, data: &[u8], offset: u64) -> Result<(), StorageError> {
        self.check_range(offset, data.len())?;
        let mut state = self.state.lock();
        if state.mode != AccessMode::Write {
            return Err(StorageError::AccessDenied(state.path.display().to_string()));
        }
        let file = self.handle(&mut state)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    fn move_file(&self, new_path: &Path) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        self.move_locked(&mut state, new_path)
    }

    fn rename_file(&self, new_name: &str) -> Result<(), StorageError> {
        validate_file_name(new_name)?;
        let mut state = self.state.lock();
        let new_path = match state.path.parent() {
            Some(parent) => parent.join(new_name),
            None => PathBuf::from(new_name),
        };
        self.move_locked(&mut state, &new_path)
    }

    fn flush(&self) -> Result<(), StorageError> {
        let state = self.state.lock();
        if state.mode == AccessMode::Write {
            if let Some(file) = &state.file {
                file.sync_data()?;
            }
        }
        Ok(())
    }

    fn access_mode(&self) -> AccessMode {
        self.state.lock().mode
    }

    fn set_access_mode(&self, mode: AccessMode) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if state.mode == mode {
            return Ok(());
        }

        Self::close_handle(&mut state)?;
        if mode == AccessMode::Write {
            let file = self.open_for_write(&state.path, state.storage_type)?;
            state.file = Some(file);
        }
        state.mode = mode;
        Ok(())
    }

    fn storage_type(&self) -> StorageType {
        self.state.lock().storage_type
    }

    fn set_storage_type(&self, storage_type: StorageType) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if state.storage_type == storage_type {
            return Ok(());
        }

        state.storage_type = storage_type;
        if state.mode == AccessMode::Write {
            // reopening applies the new allocation mode
            Self::close_handle(&mut state)?;
            let file = self.open_for_write(&state.path, storage_type)?;
            state.file = Some(file);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StorageError> {
        Self::close_handle(&mut self.state.lock())
    }
}

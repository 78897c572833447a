use super::*;
use crate::cache::BufferPool;
use crate::layout::TorrentFile;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct TestOwner {
    torrent_file: TorrentFile,
}

impl TestOwner {
    fn new(length: u64) -> Self {
        Self {
            torrent_file: TorrentFile {
                index: 0,
                path: PathBuf::from("test.dat"),
                length,
                offset: 0,
                first_piece: 0,
                last_piece: 0,
            },
        }
    }
}

impl CacheFileOwner for TestOwner {
    fn cache_file_owner_name(&self) -> String {
        "test".to_string()
    }

    fn cache_file_torrent_file(&self) -> &TorrentFile {
        &self.torrent_file
    }

    fn cache_file_control_dir(&self) -> Option<PathBuf> {
        None
    }

    fn cache_mode(&self) -> CacheMode {
        CacheMode::Normal
    }
}

struct FailingFile;

impl CacheFile for FailingFile {
    fn path(&self) -> PathBuf {
        PathBuf::from("failing")
    }

    fn length(&self) -> u64 {
        4096
    }

    fn read(&self, _buf: &mut [u8], _offset: u64, _policy: ReadPolicy) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("injected read failure")))
    }

    fn write(&self, _data: &[u8], _offset: u64) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("injected write failure")))
    }

    fn move_file(&self, _new_path: &Path) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("injected move failure")))
    }

    fn rename_file(&self, _new_name: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("injected rename failure")))
    }

    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn access_mode(&self) -> AccessMode {
        AccessMode::Read
    }

    fn set_access_mode(&self, _mode: AccessMode) -> Result<(), StorageError> {
        Ok(())
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Linear
    }

    fn set_storage_type(&self, _storage_type: StorageType) -> Result<(), StorageError> {
        Ok(())
    }

    fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

fn create_file(temp: &TempDir, name: &str, length: u64, storage_type: StorageType) -> Box<dyn CacheFile> {
    let owner = TestOwner::new(length);
    DiskCacheFileManager::new()
        .create_file(&owner, &temp.path().join(name), storage_type)
        .expect("test cache file creation")
}

#[test]
fn test_linear_file_is_preallocated() {
    let temp = TempDir::new().unwrap();
    let file = create_file(&temp, "sub/test.dat", 65536, StorageType::Linear);

    assert!(!temp.path().join("sub/test.dat").exists());
    file.set_access_mode(AccessMode::Write).unwrap();

    let metadata = std::fs::metadata(temp.path().join("sub/test.dat")).unwrap();
    assert_eq!(metadata.len(), 65536);
}

#[test]
fn test_compact_file_stays_sparse() {
    let temp = TempDir::new().unwrap();
    let file = create_file(&temp, "test.dat", 65536, StorageType::Compact);
    file.set_access_mode(AccessMode::Write).unwrap();

    let metadata = std::fs::metadata(temp.path().join("test.dat")).unwrap();
    assert_eq!(metadata.len(), 0);

    file.set_storage_type(StorageType::Linear).unwrap();
    let metadata = std::fs::metadata(temp.path().join("test.dat")).unwrap();
    assert_eq!(metadata.len(), 65536);
}

#[test]
fn test_write_requires_write_mode() {
    let temp = TempDir::new().unwrap();
    let file = create_file(&temp, "test.dat", 100, StorageType::Linear);

    let result = file.write(&[1, 2, 3], 0);
    assert!(matches!(result, Err(StorageError::AccessDenied(_))));
}

#[test]
fn test_write_and_read_through_handle() {
    let temp = TempDir::new().unwrap();
    let file = create_file(&temp, "test.dat", 32768, StorageType::Linear);
    file.set_access_mode(AccessMode::Write).unwrap();

    let data: Vec<u8> = (0..16384).map(|i| (i % 256) as u8).collect();
    file.write(&data, 16384).unwrap();

    let pool = BufferPool::with_limits(4, 4);
    let handle = StorageHandle::new(file, pool.clone());

    let buf = handle.read(16384, 16384).unwrap();
    assert_eq!(&buf[..], data.as_slice());
    assert_eq!(pool.outstanding(), 1);

    drop(buf);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn test_read_out_of_bounds() {
    let temp = TempDir::new().unwrap();
    let file = create_file(&temp, "test.dat", 100, StorageType::Linear);
    file.set_access_mode(AccessMode::Write).unwrap();

    let pool = BufferPool::with_limits(4, 4);
    let handle = StorageHandle::new(file, pool.clone());

    let result = handle.read(90, 20);
    assert!(matches!(result, Err(StorageError::InvalidRange { offset: 90, length: 20 })));
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn test_oversized_read_is_rejected_before_allocating() {
    let pool = BufferPool::with_limits(4, 4);
    let handle = StorageHandle::new(Box::new(FailingFile), pool.clone());

    let result = handle.read(0, usize::MAX);
    assert!(matches!(result, Err(StorageError::InvalidRange { offset: 0, .. })));

    let result = handle.read(u64::MAX, 1);
    assert!(matches!(result, Err(StorageError::InvalidRange { .. })));

    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.block_buffers_available(), 0);
    assert_eq!(pool.piece_buffers_available(), 0);
}

#[test]
fn test_read_missing_file() {
    let temp = TempDir::new().unwrap();
    let file = create_file(&temp, "missing.dat", 100, StorageType::Linear);
    let pool = BufferPool::with_limits(4, 4);
    let handle = StorageHandle::new(file, pool.clone());

    let result = handle.read(0, 10);
    assert!(matches!(result, Err(StorageError::FileNotFound(_))));
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn test_failed_read_returns_buffer() {
    let pool = BufferPool::with_limits(4, 4);
    let handle = StorageHandle::new(Box::new(FailingFile), pool.clone());

    assert!(handle.read(0, 1024).is_err());
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.block_buffers_available(), 1);
}

#[test]
fn test_move_and_rename() {
    let temp = TempDir::new().unwrap();
    let file = create_file(&temp, "test.dat", 10, StorageType::Linear);
    file.set_access_mode(AccessMode::Write).unwrap();
    file.write(b"0123456789", 0).unwrap();

    let moved = temp.path().join("other/moved.dat");
    file.move_file(&moved).unwrap();
    assert!(!temp.path().join("test.dat").exists());
    assert!(moved.exists());
    assert_eq!(file.path(), moved);

    file.rename_file("renamed.dat").unwrap();
    let renamed = temp.path().join("other/renamed.dat");
    assert!(renamed.exists());

    let mut buf = [0u8; 4];
    file.read(&mut buf, 3, ReadPolicy::Cache).unwrap();
    assert_eq!(&buf, b"3456");
}

#[test]
fn test_move_refuses_existing_target() {
    let temp = TempDir::new().unwrap();
    let file = create_file(&temp, "test.dat", 10, StorageType::Linear);
    file.set_access_mode(AccessMode::Write).unwrap();

    let target = temp.path().join("taken.dat");
    std::fs::write(&target, b"x").unwrap();

    let result = file.move_file(&target);
    assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    assert!(temp.path().join("test.dat").exists());
}

#[test]
fn test_move_of_unwritten_file_only_updates_path() {
    let temp = TempDir::new().unwrap();
    let file = create_file(&temp, "test.dat", 10, StorageType::Linear);

    let target = temp.path().join("elsewhere.dat");
    file.move_file(&target).unwrap();
    assert_eq!(file.path(), target);
    assert!(!target.exists());
}

#[test]
fn test_rename_rejects_paths() {
    let temp = TempDir::new().unwrap();
    let file = create_file(&temp, "test.dat", 10, StorageType::Linear);

    assert!(matches!(
        file.rename_file("../escape.dat"),
        Err(StorageError::PathTraversal(_))
    ));
}

#[test]
fn test_create_rejects_directory() {
    let temp = TempDir::new().unwrap();
    let owner = TestOwner::new(10);
    let result = DiskCacheFileManager::new().create_file(&owner, temp.path(), StorageType::Linear);
    assert!(matches!(result, Err(StorageError::NotAFile(_))));
}

#[test]
fn test_config_disables_preallocation() {
    let temp = TempDir::new().unwrap();
    let owner = TestOwner::new(4096);
    let engine = DiskCacheFileManager::with_config(DiskStorageConfig::default().with_preallocate(false));
    let file = engine
        .create_file(&owner, &temp.path().join("test.dat"), StorageType::Linear)
        .unwrap();
    file.set_access_mode(AccessMode::Write).unwrap();

    let metadata = std::fs::metadata(temp.path().join("test.dat")).unwrap();
    assert_eq!(metadata.len(), 0);
}

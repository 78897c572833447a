//! Storage-engine interface and the per-file storage handle.
//!
//! The storage engine performs the actual byte-level I/O and physical file
//! operations. This module defines the narrow interface the rest of the crate
//! uses to talk to it, a [`StorageHandle`] that owns exactly one engine handle
//! per file, and a plain-file engine, [`DiskCacheFileManager`].
//!
//! # Components
//!
//! - [`CacheFileManager`] - Creates engine handles for files
//! - [`CacheFile`] - One file's bytes: read, write, move, rename, flush, access mode
//! - [`CacheFileOwner`] - What the engine may ask of the file owning a handle
//! - [`StorageHandle`] - Exclusive wrapper with pooled reads
//! - [`StorageType`] - Physical layout (linear, compact, reorder, reorder-compact)
//!
//! # Examples
//!
//! ```no_run
//! use piecefile::storage::{AccessMode, CacheFile, CacheFileManager, DiskCacheFileManager, StorageType};
//! # use piecefile::storage::CacheFileOwner;
//! # fn example(owner: &dyn CacheFileOwner) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DiskCacheFileManager::new();
//! let file = engine.create_file(owner, "downloads/file.bin".as_ref(), StorageType::Linear)?;
//!
//! file.set_access_mode(AccessMode::Write)?;
//! file.write(b"hello", 0)?;
//! file.flush()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! Relative file paths are validated with [`validate_file_path`] before a
//! handle is created, and renames only accept a single path component.

mod disk;
mod engine;
mod error;
mod file;
mod handle;

pub use disk::{DiskCacheFile, DiskCacheFileManager, DiskStorageConfig};
pub use engine::{CacheFile, CacheFileManager, CacheFileOwner};
pub use error::StorageError;
pub use file::{
    validate_file_name, validate_file_path, AccessMode, AllocationMode, CacheMode, ReadPolicy,
    StorageType,
};
pub use handle::StorageHandle;

#[cfg(test)]
mod tests;

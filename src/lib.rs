//! piecefile - per-file storage for piece-based transfers
//!
//! A transfer is one byte stream cut into fixed-size pieces, with its files
//! laid end to end over that stream. This crate is the layer that gives each
//! of those files an identity on disk.
//!
//! # Modules
//!
//! - [`layout`] - Piece, block and file byte-range mapping
//! - [`piece`] - Piece and block progress queries
//! - [`cache`] - Pooled read buffers
//! - [`storage`] - Storage-engine contracts, storage handles and a disk engine
//! - [`state`] - Persisted per-transfer metadata (file links, attributes)
//! - [`file_info`] - File descriptors, skip relocation and progress listeners

pub mod cache;
pub mod constants;
pub mod file_info;
pub mod layout;
pub mod piece;
pub mod state;
pub mod storage;

pub use cache::{BufferPool, PooledBuffer};
pub use file_info::{
    DiskFileInfo, DiskFileInfoListener, DiskManagerHelper, FileInfoError, ListenerError,
    ListenerSet,
};
pub use layout::{clip_to_file, piece_offset, TorrentFile, TorrentLayout};
pub use piece::{PieceProgress, PieceStates};
pub use state::{Attribute, DownloadState, MemoryDownloadState};
pub use storage::{
    AccessMode, CacheFile, CacheFileManager, CacheFileOwner, CacheMode, DiskCacheFileManager,
    DiskStorageConfig, StorageError, StorageHandle, StorageType,
};

//! Per-file descriptors of a transfer.
//!
//! A [`DiskFileInfo`] ties one file of a [`TorrentLayout`](crate::layout::TorrentLayout)
//! to its storage handle and to whoever wants to observe its progress. It
//! covers three concerns:
//!
//! - **Storage**: reads, moves, renames and access-mode changes go through the
//!   file's [`StorageHandle`](crate::storage::StorageHandle).
//! - **Skipping**: marking a file skipped may move it into a do-not-download
//!   subfolder, and unskipping moves it back. The persisted link and the
//!   physical file are kept in agreement.
//! - **Progress**: a listener added to a file first receives a coalesced
//!   replay of everything already written or verified, then every live event
//!   clipped to the file.
//!
//! # Example
//!
//! ```ignore
//! let info = DiskFileInfo::new(&owner, &engine, pool, root, "a/b.bin", 0, StorageType::Linear)?;
//! info.add_listener(listener.clone());
//! info.on_data_written(offset, 16384);
//! ```

mod descriptor;
mod error;
mod listener;
mod owner;
mod relocation;

pub use descriptor::DiskFileInfo;
pub use error::FileInfoError;
pub use listener::{DiskFileInfoListener, ListenerError, ListenerSet};
pub use owner::DiskManagerHelper;

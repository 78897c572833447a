use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum FileInfoError {
    #[error("file index {index} out of range ({count} files)")]
    InvalidIndex { index: usize, count: usize },

    #[error("cannot create storage for {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("read of {length} bytes at offset {offset} failed: {source}")]
    Read {
        offset: u64,
        length: usize,
        #[source]
        source: StorageError,
    },

    #[error("move to {path} failed: {source}")]
    Move {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("rename to {name} failed: {source}")]
    Rename {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("access mode change failed: {0}")]
    AccessMode(#[source] StorageError),

    #[error("flush failed: {0}")]
    Flush(#[source] StorageError),
}

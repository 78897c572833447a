use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("path traversal detected in file path: {0}")]
    PathTraversal(String),

    #[error("read outside file bounds: offset {offset}, length {length}")]
    InvalidRange { offset: u64, length: u64 },

    #[error("file is not open for writing: {0}")]
    AccessDenied(String),

    #[error("target already exists: {0}")]
    AlreadyExists(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),
}

use std::path::{Component, Path};

use super::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationMode {
    #[default]
    Sparse,
    Full,
}

/// Physical layout policy for a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageType {
    /// Contiguous, fully allocated up front.
    #[default]
    Linear,
    /// Sparse, only pieces that touch neighbouring files are kept.
    Compact,
    /// Contiguous, pieces land out of order and are reordered later.
    Reorder,
    /// Sparse and reordered.
    ReorderCompact,
}

impl StorageType {
    pub fn is_compact(self) -> bool {
        matches!(self, StorageType::Compact | StorageType::ReorderCompact)
    }

    /// Compact layouts only exist for skipped files, so they start skipped.
    pub fn default_skipped(self) -> bool {
        self.is_compact()
    }

    /// The non-compact layout a file must switch to before it can be
    /// downloaded again. Non-compact types map to themselves.
    pub fn expanded(self) -> StorageType {
        match self {
            StorageType::Compact => StorageType::Linear,
            StorageType::ReorderCompact => StorageType::Reorder,
            other => other,
        }
    }

    pub fn allocation_mode(self) -> AllocationMode {
        if self.is_compact() {
            AllocationMode::Sparse
        } else {
            AllocationMode::Full
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    Read,
    Write,
}

/// Caching hint passed with a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    #[default]
    Cache,
    NoCache,
}

/// How aggressively the storage engine may cache an owner's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Normal,
    Transient,
}

/// Rejects relative file paths that could escape the transfer's root.
pub fn validate_file_path(file_path: &Path) -> Result<(), StorageError> {
    for component in file_path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::PathTraversal(file_path.display().to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Rejects new names that are not a single plain path component.
pub fn validate_file_name(name: &str) -> Result<(), StorageError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StorageError::PathTraversal(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_types_expand() {
        assert_eq!(StorageType::Compact.expanded(), StorageType::Linear);
        assert_eq!(StorageType::ReorderCompact.expanded(), StorageType::Reorder);
        assert_eq!(StorageType::Reorder.expanded(), StorageType::Reorder);
        assert!(StorageType::ReorderCompact.default_skipped());
        assert!(!StorageType::Linear.default_skipped());
        assert_eq!(StorageType::Compact.allocation_mode(), AllocationMode::Sparse);
        assert_eq!(StorageType::Reorder.allocation_mode(), AllocationMode::Full);
    }

    #[test]
    fn test_path_validation() {
        assert!(validate_file_path(Path::new("dir/file.bin")).is_ok());
        assert!(validate_file_path(Path::new("../file.bin")).is_err());
        assert!(validate_file_path(Path::new("/etc/passwd")).is_err());

        assert!(validate_file_name("renamed.bin").is_ok());
        assert!(validate_file_name("a/b").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("").is_err());
    }
}

//! Persisted per-transfer metadata consumed by the storage layer.
//!
//! The download state remembers file links (path overrides keyed by a file's
//! default location) and string attributes such as the do-not-download
//! subfolder name. Its storage format belongs to the implementation; the
//! storage layer only reads and writes through [`DownloadState`].

use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::constants::{ATTR_DND_SUBFOLDER, ATTR_INCOMPLETE_FILE_SUFFIX};

/// String attributes the storage layer reads from the download state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Name of the subfolder skipped files are moved into.
    DndSubfolder,
    /// Suffix appended to files that are still downloading.
    IncompleteFileSuffix,
}

impl Attribute {
    pub fn key(self) -> &'static str {
        match self {
            Attribute::DndSubfolder => ATTR_DND_SUBFOLDER,
            Attribute::IncompleteFileSuffix => ATTR_INCOMPLETE_FILE_SUFFIX,
        }
    }
}

pub trait DownloadState: Send + Sync {
    /// Link recorded for the file whose default location is `source`.
    fn file_link(&self, source: &Path) -> Option<PathBuf>;

    /// Records (`Some`) or clears (`None`) the link for `source`.
    fn set_file_link(&self, source: &Path, link: Option<&Path>);

    fn attribute(&self, attribute: Attribute) -> Option<String>;

    /// Location of the persisted state, used as the engine's control-file
    /// directory.
    fn state_file(&self) -> PathBuf;
}

/// Download state kept in memory.
#[derive(Debug, Default)]
pub struct MemoryDownloadState {
    links: DashMap<PathBuf, PathBuf>,
    attributes: DashMap<&'static str, String>,
    state_file: PathBuf,
}

impl MemoryDownloadState {
    pub fn new(state_file: PathBuf) -> Self {
        Self {
            links: DashMap::new(),
            attributes: DashMap::new(),
            state_file,
        }
    }

    pub fn set_attribute(&self, attribute: Attribute, value: Option<String>) {
        match value {
            Some(value) => {
                self.attributes.insert(attribute.key(), value);
            }
            None => {
                self.attributes.remove(attribute.key());
            }
        }
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

impl DownloadState for MemoryDownloadState {
    fn file_link(&self, source: &Path) -> Option<PathBuf> {
        self.links.get(source).map(|link| link.value().clone())
    }

    fn set_file_link(&self, source: &Path, link: Option<&Path>) {
        match link {
            Some(link) => {
                self.links.insert(source.to_path_buf(), link.to_path_buf());
            }
            None => {
                self.links.remove(source);
            }
        }
    }

    fn attribute(&self, attribute: Attribute) -> Option<String> {
        self.attributes
            .get(attribute.key())
            .map(|value| value.value().clone())
    }

    fn state_file(&self) -> PathBuf {
        self.state_file.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links() {
        let state = MemoryDownloadState::new(PathBuf::from("state"));
        let source = Path::new("/data/a.bin");
        assert_eq!(state.file_link(source), None);

        state.set_file_link(source, Some(Path::new("/data/dnd/a.bin")));
        assert_eq!(state.file_link(source), Some(PathBuf::from("/data/dnd/a.bin")));
        assert_eq!(state.link_count(), 1);

        state.set_file_link(source, None);
        assert_eq!(state.file_link(source), None);
        assert_eq!(state.link_count(), 0);
    }

    #[test]
    fn test_attributes() {
        let state = MemoryDownloadState::default();
        state.set_attribute(Attribute::DndSubfolder, Some(".dnd".to_string()));
        assert_eq!(state.attribute(Attribute::DndSubfolder), Some(".dnd".to_string()));
        assert_eq!(state.attribute(Attribute::IncompleteFileSuffix), None);

        state.set_attribute(Attribute::DndSubfolder, None);
        assert_eq!(state.attribute(Attribute::DndSubfolder), None);
    }
}

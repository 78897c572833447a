//! Moving skipped files into and out of the do-not-download subfolder.
//!
//! Every relocation touches two things: the link persisted in the download
//! state and the physical file behind the storage handle. The link is written
//! first; if the physical move then fails the link is put back, so the two
//! never disagree. Failures are logged and never change the skip flag.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::state::{Attribute, DownloadState};
use crate::storage::{StorageError, StorageHandle};

#[derive(Debug, Error)]
pub(crate) enum RelocationError {
    #[error("cannot create {path}: {source}")]
    CreateSubfolder {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("directory not writable: {0}")]
    NotWritable(String),

    #[error("storage move failed: {0}")]
    Move(#[from] StorageError),
}

/// Link change that reverts itself unless committed.
struct LinkUpdate<'a> {
    state: &'a dyn DownloadState,
    source: &'a Path,
    previous: Option<PathBuf>,
    committed: bool,
}

impl<'a> LinkUpdate<'a> {
    fn apply(
        state: &'a dyn DownloadState,
        source: &'a Path,
        previous: Option<PathBuf>,
        link: Option<&Path>,
    ) -> Self {
        state.set_file_link(source, link);
        Self {
            state,
            source,
            previous,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for LinkUpdate<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.state.set_file_link(self.source, self.previous.as_deref());
        }
    }
}

/// Returns true if the current user can create files in `dir`, checked by
/// creating and removing a scratch file.
fn is_writable(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    match tempfile::Builder::new()
        .prefix(".writable")
        .tempfile_in(dir)
    {
        Ok(_scratch) => true,
        Err(e) => {
            tracing::debug!("{} is not writable: {}", dir.display(), e);
            false
        }
    }
}

fn remove_if_empty(dir: &Path) {
    let empty = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => false,
    };
    if empty {
        if let Err(e) = fs::remove_dir(dir) {
            tracing::debug!("could not remove empty {}: {}", dir.display(), e);
        }
    }
}

/// One relocation attempt for one file.
pub(crate) struct Relocation<'a> {
    pub state: &'a dyn DownloadState,
    pub storage: &'a StorageHandle,
    /// `root_dir/relative_path`, the key links are stored under.
    pub default_path: PathBuf,
    pub subfolder: &'a str,
}

impl Relocation<'_> {
    /// Moves a newly skipped file into the subfolder next to its default
    /// location. Returns the new path, or `None` if nothing had to move.
    pub(crate) fn into_subfolder(&self) -> Result<Option<PathBuf>, RelocationError> {
        let link = self.state.file_link(&self.default_path);
        if link.as_ref().is_some_and(|l| *l != self.default_path) {
            // already redirected somewhere else
            return Ok(None);
        }

        let (Some(parent), Some(name)) = (self.default_path.parent(), self.default_path.file_name())
        else {
            return Ok(None);
        };

        let new_parent = parent.join(self.subfolder);
        let new_file = new_parent.join(name);
        if new_file.exists() {
            return Ok(None);
        }

        if !new_parent.exists() {
            fs::create_dir_all(&new_parent).map_err(|source| RelocationError::CreateSubfolder {
                path: new_parent.display().to_string(),
                source,
            })?;
        }
        if !is_writable(&new_parent) {
            return Err(RelocationError::NotWritable(new_parent.display().to_string()));
        }

        let update = LinkUpdate::apply(self.state, &self.default_path, link, Some(&new_file));
        self.storage.move_file(&new_file)?;
        update.commit();

        Ok(Some(new_file))
    }

    /// Moves an unskipped file back out of the subfolder. Returns the new
    /// path, or `None` if nothing had to move.
    pub(crate) fn out_of_subfolder(&self) -> Result<Option<PathBuf>, RelocationError> {
        let Some(link) = self.state.file_link(&self.default_path) else {
            return Ok(None);
        };
        if self.default_path.exists() {
            // something else already occupies the default location
            return Ok(None);
        }

        let (Some(parent), Some(name)) = (self.default_path.parent(), self.default_path.file_name())
        else {
            return Ok(None);
        };
        if !is_writable(parent) {
            return Err(RelocationError::NotWritable(parent.display().to_string()));
        }

        let new_parent = if parent.file_name() == Some(OsStr::new(self.subfolder)) {
            parent.to_path_buf()
        } else {
            parent.join(self.subfolder)
        };

        // the link's own name keeps any incomplete-file suffix it carried
        let Some(link_name) = link.file_name() else {
            return Ok(None);
        };
        if new_parent.join(link_name) != link {
            return Ok(None);
        }

        let suffix = self
            .state
            .attribute(Attribute::IncompleteFileSuffix)
            .filter(|s| !s.is_empty());

        let (update, target) = match suffix {
            Some(suffix) => {
                let mut incomplete = name.to_os_string();
                incomplete.push(suffix);
                let target = parent.join(incomplete);
                let update = LinkUpdate::apply(
                    self.state,
                    &self.default_path,
                    Some(link.clone()),
                    Some(&target),
                );
                self.storage.move_file(&target)?;
                (update, target)
            }
            None => {
                let update =
                    LinkUpdate::apply(self.state, &self.default_path, Some(link.clone()), None);
                self.storage.move_file(&self.default_path)?;
                (update, self.default_path.clone())
            }
        };
        update.commit();

        remove_if_empty(&new_parent);
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_writable_leaves_no_scratch_file() {
        let temp = TempDir::new().unwrap();
        assert!(is_writable(temp.path()));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_is_writable_rejects_missing_dir_and_files() {
        let temp = TempDir::new().unwrap();
        assert!(!is_writable(&temp.path().join("missing")));

        let file = temp.path().join("plain.bin");
        fs::write(&file, b"x").unwrap();
        assert!(!is_writable(&file));
    }

    #[test]
    fn test_remove_if_empty_keeps_populated_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("dnd");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("other.bin"), b"x").unwrap();

        remove_if_empty(&dir);
        assert!(dir.exists());

        fs::remove_file(dir.join("other.bin")).unwrap();
        remove_if_empty(&dir);
        assert!(!dir.exists());
    }
}

//! On-disk image previews for the resource browser.
//!
//! DESIGN
//! ======
//! Each preview is a file `preview-<id>.<ext>` inside one directory, the
//! console's equivalent of a locally-scoped blob URL. Views call
//! [`PreviewStore::release_except`] with the ids they currently display, so
//! previews for resources that scrolled off are deleted instead of piling up
//! across page navigations. Files without the `preview-` prefix are never
//! touched.

#[cfg(test)]
#[path = "preview_test.rs"]
mod preview_test;

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use records::Id;
use tracing::debug;

const PREFIX: &str = "preview-";
const FALLBACK_EXTENSION: &str = "img";

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("preview storage {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct PreviewStore {
    dir: PathBuf,
    files: BTreeMap<String, PathBuf>,
}

impl PreviewStore {
    /// Open (creating if needed) a preview directory and index what it holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or listed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PreviewError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;

        let mut files = BTreeMap::new();
        let entries = std::fs::read_dir(&dir).map_err(|source| io_error(&dir, source))?;
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&dir, source))?;
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Some(key) = stem.strip_prefix(PREFIX) {
                files.insert(key.to_owned(), path.clone());
            }
        }

        Ok(Self { dir, files })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn path_of(&self, id: &Id) -> Option<&Path> {
        self.files.get(&file_key(id)).map(PathBuf::as_path)
    }

    /// Displayed ids that have no preview yet, in display order.
    #[must_use]
    pub fn missing<'a>(&self, displayed: &'a [Id]) -> Vec<&'a Id> {
        displayed.iter().filter(|id| !self.files.contains_key(&file_key(id))).collect()
    }

    /// Write a preview for `id`. `name` only supplies the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn insert(&mut self, id: &Id, name: &str, bytes: &[u8]) -> Result<PathBuf, PreviewError> {
        let key = file_key(id);
        if let Some(previous) = self.files.remove(&key) {
            remove_quietly(&previous)?;
        }
        let path = self.dir.join(format!("{PREFIX}{key}.{}", extension_of(name)));
        std::fs::write(&path, bytes).map_err(|source| io_error(&path, source))?;
        debug!(resource_id = %id, path = %path.display(), "preview stored");
        self.files.insert(key, path.clone());
        Ok(path)
    }

    /// Delete every preview whose id is not in `displayed`. Returns how many
    /// were released.
    ///
    /// # Errors
    ///
    /// Returns an error if a preview file cannot be removed.
    pub fn release_except(&mut self, displayed: &[Id]) -> Result<usize, PreviewError> {
        let keep: Vec<String> = displayed.iter().map(file_key).collect();
        let stale: Vec<String> = self.files.keys().filter(|key| !keep.contains(key)).cloned().collect();
        for key in &stale {
            if let Some(path) = self.files.remove(key) {
                remove_quietly(&path)?;
            }
        }
        if !stale.is_empty() {
            debug!(released = stale.len(), "previews released");
        }
        Ok(stale.len())
    }

    /// # Errors
    ///
    /// Returns an error if a preview file cannot be removed.
    pub fn release_all(&mut self) -> Result<usize, PreviewError> {
        self.release_except(&[])
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PreviewError {
    PreviewError::Io { path: path.to_path_buf(), source }
}

fn remove_quietly(path: &Path) -> Result<(), PreviewError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(io_error(path, error)),
    }
}

/// Filesystem-safe, collision-free form of an id: ASCII alphanumerics and
/// `-` pass through, every other byte becomes `_xx` hex.
fn file_key(id: &Id) -> String {
    let mut key = String::with_capacity(id.as_str().len());
    for byte in id.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            key.push(char::from(byte));
        } else {
            let _ = write!(key, "_{byte:02x}");
        }
    }
    key
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| FALLBACK_EXTENSION.to_owned(), str::to_ascii_lowercase)
}

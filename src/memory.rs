//! In-memory filesystem.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use crate::path::{base_name, check_path, prefix};
use crate::{DirEntry, File, FileSystem, FileType, FsError, MemFile, Metadata};

/// A filesystem backed by a map of paths to contents.
///
/// Directories are implied by the files below them. Only
/// [`open`](FileSystem::open) is implemented, so every other operation runs
/// through the derived defaults; this makes `MemoryFs` the reference for how
/// a minimal backend behaves. A query on an opened name is ignored.
///
/// # Example
///
/// ```rust
/// use layerfs::{FileSystem, MemoryFs};
///
/// let fs = MemoryFs::new()
///     .with_file("config/app.json", r#"{"debug":true}"#)
///     .with_file("config/db.json", "{}");
///
/// let names: Vec<_> = fs.read_dir("config").unwrap().into_iter().map(|e| e.name).collect();
/// assert_eq!(names, ["app.json", "db.json"]);
/// assert!(fs.stat("config").unwrap().is_dir());
/// ```
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RwLock<BTreeMap<String, Entry>>,
}

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    modified: SystemTime,
}

impl MemoryFs {
    /// An empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_file(self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path, data);
        self
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.write().insert(
            path.into(),
            Entry {
                data: data.into(),
                modified: SystemTime::now(),
            },
        );
    }

    /// Remove a file, returning `true` if it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.write().remove(path).is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Entry>> {
        self.files.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Entry>> {
        self.files.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl FileSystem for MemoryFs {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        check_path("open", path)?;
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        let files = self.read();

        if let Some(entry) = files.get(path) {
            return Ok(Box::new(MemFile::new(
                entry.data.clone(),
                Metadata::file(base_name(path), 0, entry.modified),
            )));
        }

        let dir_prefix = if path == "." {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut children: BTreeMap<&str, DirEntry> = BTreeMap::new();
        let mut modified = SystemTime::UNIX_EPOCH;
        for (key, entry) in files.range(dir_prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&dir_prefix) else {
                break;
            };
            modified = modified.max(entry.modified);
            let (name, file_type, size) = match rest.split_once('/') {
                Some((dir, _)) => (dir, FileType::Directory, 0),
                None => (rest, FileType::File, entry.data.len() as u64),
            };
            children.entry(name).or_insert_with(|| DirEntry {
                name: name.to_string(),
                path: prefix(path, name),
                file_type,
                size,
            });
        }
        if children.is_empty() && path != "." {
            return Err(FsError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(Box::new(MemFile::dir(
            Metadata::dir(base_name(path), modified),
            children.into_values().collect(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_file_and_missing() {
        let fs = MemoryFs::new().with_file("a/b.txt", "b");
        assert_eq!(fs.read_file("a/b.txt").unwrap(), b"b");
        assert!(fs.open("a/c.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn open_rejects_invalid_path() {
        let fs = MemoryFs::new();
        assert!(matches!(fs.open("../x"), Err(FsError::InvalidPath { .. })));
    }

    #[test]
    fn empty_root_is_a_directory() {
        let fs = MemoryFs::new();
        assert!(fs.stat(".").unwrap().is_dir());
        assert!(fs.read_dir(".").unwrap().is_empty());
    }

    #[test]
    fn directories_are_synthesized() {
        let fs = MemoryFs::new()
            .with_file("a/x.txt", "1")
            .with_file("a/b/y.txt", "22")
            .with_file("ab.txt", "3");
        let entries = fs.read_dir("a").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "b");
        assert!(entries[0].is_dir());
        assert_eq!(entries[0].path, "a/b");
        assert_eq!(entries[1].name, "x.txt");
        assert_eq!(entries[1].size, 1);
    }

    #[test]
    fn query_is_ignored() {
        let fs = MemoryFs::new().with_file("a.txt", "a");
        assert_eq!(fs.read_file("a.txt?x=1").unwrap(), b"a");
    }

    #[test]
    fn insert_and_remove() {
        let fs = MemoryFs::new();
        fs.insert("a", "1");
        assert!(fs.remove("a"));
        assert!(!fs.remove("a"));
        assert!(fs.stat("a").is_err());
    }
}

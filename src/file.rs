//! Concrete [`File`] handles.

use std::fs;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;

use crate::path::{base_name, prefix};
use crate::{DirEntry, File, FileType, FsError, Metadata, Permissions};

/// A file held entirely in memory.
///
/// Returned by adapters that must see the whole content before handing it
/// out (the cache after storing, checksum verification after open) and by
/// [`MemoryFs`](crate::MemoryFs).
#[derive(Debug, Clone)]
pub struct MemFile {
    data: Cursor<Vec<u8>>,
    meta: Metadata,
    entries: Option<Vec<DirEntry>>,
}

impl MemFile {
    /// A regular file with the given content.
    ///
    /// The metadata size is set to the content length.
    pub fn new(data: Vec<u8>, mut meta: Metadata) -> Self {
        meta.size = data.len() as u64;
        Self {
            data: Cursor::new(data),
            meta,
            entries: None,
        }
    }

    /// A directory handle listing `entries`.
    pub fn dir(meta: Metadata, entries: Vec<DirEntry>) -> Self {
        Self {
            data: Cursor::new(Vec::new()),
            meta,
            entries: Some(entries),
        }
    }
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}

impl File for MemFile {
    fn stat(&self) -> Result<Metadata, FsError> {
        Ok(self.meta.clone())
    }

    fn read_dir(&mut self) -> Result<Vec<DirEntry>, FsError> {
        self.entries.clone().ok_or(FsError::NotSupported {
            operation: "read_dir",
        })
    }
}

/// A file or directory opened on the host filesystem.
#[derive(Debug)]
pub struct OsFile {
    file: fs::File,
    name: String,
    path: PathBuf,
}

impl OsFile {
    /// Open `path` on the host, recording `name` as its filesystem path.
    pub(crate) fn open(name: &str, path: PathBuf) -> Result<Self, FsError> {
        let file = fs::File::open(&path).map_err(|e| FsError::from_io(e, "open", name))?;
        Ok(Self {
            file,
            name: name.to_string(),
            path,
        })
    }
}

impl Read for OsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl File for OsFile {
    fn stat(&self) -> Result<Metadata, FsError> {
        let meta = self
            .file
            .metadata()
            .map_err(|e| FsError::from_io(e, "stat", &self.name))?;
        Ok(metadata_from_std(base_name(&self.name), &meta))
    }

    fn read_dir(&mut self) -> Result<Vec<DirEntry>, FsError> {
        read_os_dir(&self.name, &self.path)
    }
}

/// List a host directory as entries named relative to `name`.
pub(crate) fn read_os_dir(name: &str, path: &std::path::Path) -> Result<Vec<DirEntry>, FsError> {
    let io_err = |e: io::Error| FsError::from_io(e, "read_dir", name);
    let mut entries = Vec::new();
    for entry in fs::read_dir(path).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let meta = entry.metadata().map_err(io_err)?;
        let entry_name = entry.file_name().to_string_lossy().into_owned();
        entries.push(DirEntry {
            path: prefix(name, &entry_name),
            name: entry_name,
            file_type: file_type(&meta),
            size: if meta.is_dir() { 0 } else { meta.len() },
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Convert host metadata.
pub(crate) fn metadata_from_std(name: &str, meta: &fs::Metadata) -> Metadata {
    let mut out = match file_type(meta) {
        FileType::Directory => Metadata::dir(name, meta.modified().unwrap_or(std::time::UNIX_EPOCH)),
        FileType::File => Metadata::file(
            name,
            meta.len(),
            meta.modified().unwrap_or(std::time::UNIX_EPOCH),
        ),
    };
    out.permissions = permissions(meta);
    out
}

fn file_type(meta: &fs::Metadata) -> FileType {
    if meta.is_dir() {
        FileType::Directory
    } else {
        FileType::File
    }
}

#[cfg(unix)]
fn permissions(meta: &fs::Metadata) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    Permissions::from_mode(meta.permissions().mode())
}

#[cfg(not(unix))]
fn permissions(meta: &fs::Metadata) -> Permissions {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (_, true) => Permissions::read_only(),
        (true, false) => Permissions::default_dir(),
        (false, false) => Permissions::default_file(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn mem_file_reads_and_sizes() {
        let mut file = MemFile::new(b"hello".to_vec(), Metadata::file("a", 0, SystemTime::now()));
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello");
        assert_eq!(file.stat().unwrap().size, 5);
        assert!(matches!(file.read_dir(), Err(FsError::NotSupported { .. })));
    }

    #[test]
    fn mem_dir_lists_entries() {
        let entry = DirEntry {
            name: "x".into(),
            path: "d/x".into(),
            file_type: FileType::File,
            size: 1,
        };
        let mut dir = MemFile::dir(Metadata::dir("d", SystemTime::now()), vec![entry.clone()]);
        assert_eq!(dir.read_dir().unwrap(), vec![entry]);
        assert!(dir.stat().unwrap().is_dir());
    }

    #[test]
    fn os_file_stat_and_read_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.txt"), "bb").unwrap();
        fs::create_dir(tmp.path().join("a")).unwrap();

        let mut dir = OsFile::open("root", tmp.path().to_path_buf()).unwrap();
        assert!(dir.stat().unwrap().is_dir());
        let entries = dir.read_dir().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert!(entries[0].is_dir());
        assert_eq!(entries[1].path, "root/b.txt");
        assert_eq!(entries[1].size, 2);

        let file = OsFile::open("root/b.txt", tmp.path().join("b.txt")).unwrap();
        let meta = file.stat().unwrap();
        assert_eq!(meta.name, "b.txt");
        assert_eq!(meta.size, 2);
    }

    #[test]
    fn os_file_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = OsFile::open("nope", tmp.path().join("nope")).unwrap_err();
        assert!(err.is_not_found());
    }
}

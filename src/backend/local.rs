//! Local disk backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::file::{OsFile, metadata_from_std, read_os_dir};
use crate::path::{base_name, check_path};
use crate::{DirEntry, File, FileSystem, FsError, FsRef, Metadata, Protocol};

/// A filesystem rooted at a host directory.
///
/// Paths are resolved below the root; a query on a name is ignored. Besides
/// `open`, this backend answers `read_file`, `stat`, `read_dir` and `sub`
/// directly from the host.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    /// A filesystem rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The host directory this filesystem is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, operation: &'static str, name: &str) -> Result<PathBuf, FsError> {
        check_path(operation, name)?;
        let path = name.split_once('?').map_or(name, |(path, _)| path);
        if path == "." {
            return Ok(self.root.clone());
        }
        Ok(path.split('/').fold(self.root.clone(), |acc, elem| acc.join(elem)))
    }
}

impl FileSystem for DirFs {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        let host = self.resolve("open", path)?;
        Ok(Box::new(OsFile::open(path, host)?))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let host = self.resolve("read_file", path)?;
        std::fs::read(host).map_err(|e| FsError::from_io(e, "read_file", path))
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        let host = self.resolve("stat", path)?;
        let meta = std::fs::metadata(host).map_err(|e| FsError::from_io(e, "stat", path))?;
        Ok(metadata_from_std(base_name(path), &meta))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let host = self.resolve("read_dir", path)?;
        read_os_dir(path, &host)
    }

    fn sub(&self, dir: &str) -> Result<Option<FsRef>, FsError> {
        let root = self.resolve("sub", dir)?;
        Ok(Some(Arc::new(DirFs::new(root))))
    }
}

/// Protocol for `file` URIs.
///
/// The host must be empty or `localhost`. The filesystem is rooted at the
/// working directory (default `/`) and the URI path, without its leading
/// slash, is resolved below it.
#[derive(Debug, Clone)]
pub struct FileProto {
    working_dir: PathBuf,
}

impl FileProto {
    /// A protocol rooted at `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

impl Default for FileProto {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Protocol for FileProto {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        if uri.scheme() != "file" {
            return Err(FsError::InvalidUri {
                uri: uri.to_string(),
                reason: format!("unexpected scheme: {}", uri.scheme()),
            });
        }
        match uri.host_str() {
            None | Some("") | Some("localhost") => {}
            Some(host) => {
                return Err(FsError::InvalidUri {
                    uri: uri.to_string(),
                    reason: format!("unexpected host: {host}, must be empty or 'localhost'"),
                });
            }
        }
        let path = crate::uri::uri_path(uri, true);
        debug!(uri = %uri, %path, root = %self.working_dir.display(), "resolved file URI");
        Ok((Arc::new(DirFs::new(&self.working_dir)), path))
    }
}

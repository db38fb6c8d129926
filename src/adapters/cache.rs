//! Write-through disk cache.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;

use crate::file::OsFile;
use crate::path::{check_path, check_pattern};
use crate::traits::read_all;
use crate::uri::uri_split;
use crate::{DirEntry, File, FileSystem, FsError, FsRef, Layer, Metadata, Protocol};

/// Cache location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CacheConfig {
    /// Cache directory; `None` means `<user cache dir>/layerfs`.
    pub dir: Option<PathBuf>,
}

impl CacheConfig {
    /// Cache in `dir`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Resolve the directory and create it if missing.
    fn prepare(&self) -> Result<PathBuf, FsError> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .ok_or_else(|| FsError::Io {
                    operation: "cache_dir",
                    path: String::new(),
                    source: io::Error::new(io::ErrorKind::NotFound, "no user cache directory"),
                })?
                .join("layerfs"),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| FsError::from_io(e, "create_dir_all", &dir.to_string_lossy()))?;
        Ok(dir)
    }
}

/// Caches file contents on local disk.
///
/// `open` and `read_file` look for an entry named by the hex SHA-256 of the
/// full name, query included. On a miss the content is read from the inner
/// filesystem, stored, and served from the stored copy. Entries are never
/// invalidated. `stat`, `read_dir` and `glob` go straight to the inner
/// filesystem.
///
/// Keys depend only on the name unless a namespace is set with
/// [`with_namespace`](Self::with_namespace). [`CacheProto`] sets it to the
/// URI base, so equal paths on different hosts get different entries.
///
/// Entries are written to a temporary file in the cache directory and
/// renamed into place, so concurrent readers never see a partial entry and
/// concurrent writers of the same key leave one complete copy.
///
/// # Example
///
/// ```rust
/// use layerfs::{CacheConfig, CacheFs, FileSystem, MemoryFs};
///
/// let dir = tempfile::tempdir().unwrap();
/// let fs = CacheFs::new(
///     MemoryFs::new().with_file("a.txt", "alpha"),
///     CacheConfig::with_dir(dir.path()),
/// )
/// .unwrap();
/// assert_eq!(fs.read_file("a.txt").unwrap(), b"alpha");
/// assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct CacheFs<F> {
    inner: F,
    dir: PathBuf,
    namespace: String,
}

impl<F: FileSystem> CacheFs<F> {
    /// Wrap `inner`, creating the cache directory if needed.
    ///
    /// # Errors
    ///
    /// - [`FsError::Io`] if the directory cannot be determined or created
    pub fn new(inner: F, config: CacheConfig) -> Result<Self, FsError> {
        Ok(Self::with_prepared_dir(inner, config.prepare()?))
    }

    fn with_prepared_dir(inner: F, dir: PathBuf) -> Self {
        Self {
            inner,
            dir,
            namespace: String::new(),
        }
    }

    /// Mix `namespace` into every key.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        self.dir.join(cache_key(&self.namespace, name))
    }

    fn store(&self, name: &str, data: &[u8]) -> Result<(), FsError> {
        let target = self.entry_path(name);
        let io_err = |e: io::Error| FsError::from_io(e, "store", name);
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(data).map_err(io_err)?;
        tmp.persist(&target).map_err(|e| io_err(e.error))?;
        debug!(name, entry = %target.display(), bytes = data.len(), "cache store");
        Ok(())
    }

    fn open_cached(&self, name: &str) -> Result<Box<dyn File>, FsError> {
        if let Ok(file) = OsFile::open(name, self.entry_path(name)) {
            debug!(name, "cache hit");
            return Ok(Box::new(file));
        }
        debug!(name, "cache miss");
        let data = read_all(self.inner.open(name)?, "open", name)?;
        self.store(name, &data)?;
        Ok(Box::new(OsFile::open(name, self.entry_path(name))?))
    }

    fn read_cached(&self, name: &str) -> Result<Vec<u8>, FsError> {
        let entry = self.entry_path(name);
        if let Ok(data) = fs::read(&entry) {
            debug!(name, "cache hit");
            return Ok(data);
        }
        debug!(name, "cache miss");
        let data = self.inner.read_file(name)?;
        self.store(name, &data)?;
        fs::read(&entry).map_err(|e| FsError::from_io(e, "read_file", name))
    }
}

/// Hex SHA-256 of the namespace followed by the name.
fn cache_key(namespace: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(name.as_bytes());
    hex::encode(hasher.finalize())
}

impl<F: FileSystem> FileSystem for CacheFs<F> {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        check_path("open", path)
            .and_then(|()| self.open_cached(path))
            .map_err(|e| e.layer("cache"))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        check_path("read_file", path)
            .and_then(|()| self.read_cached(path))
            .map_err(|e| e.layer("cache"))
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        check_path("stat", path)
            .and_then(|()| self.inner.stat(path))
            .map_err(|e| e.layer("cache"))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        check_path("read_dir", path)
            .and_then(|()| self.inner.read_dir(path))
            .map_err(|e| e.layer("cache"))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        check_pattern("glob", pattern)
            .and_then(|()| self.inner.glob(pattern))
            .map_err(|e| e.layer("cache"))
    }

    // Keys are full names, so a subtree is served through a prefixing view
    // of this filesystem rather than a cache over the inner subtree.
    fn sub(&self, dir: &str) -> Result<Option<FsRef>, FsError> {
        check_path("sub", dir).map_err(|e| e.layer("cache"))?;
        Ok(None)
    }
}

/// Layer producing [`CacheFs`].
#[derive(Debug, Clone)]
pub struct CacheLayer {
    dir: PathBuf,
}

impl CacheLayer {
    /// A layer caching into the directory of `config`, created now.
    ///
    /// # Errors
    ///
    /// - [`FsError::Io`] if the directory cannot be determined or created
    pub fn new(config: CacheConfig) -> Result<Self, FsError> {
        Ok(Self {
            dir: config.prepare()?,
        })
    }
}

impl<F: FileSystem> Layer<F> for CacheLayer {
    type FileSystem = CacheFs<F>;

    fn layer(self, inner: F) -> Self::FileSystem {
        CacheFs::with_prepared_dir(inner, self.dir)
    }
}

/// Wraps the filesystem of another protocol in [`CacheFs`].
#[derive(Debug, Clone)]
pub struct CacheProto<P> {
    proto: P,
    dir: PathBuf,
}

impl<P: Protocol> CacheProto<P> {
    /// Cache filesystems produced by `proto`.
    ///
    /// # Errors
    ///
    /// - [`FsError::Io`] if the directory cannot be determined or created
    pub fn new(proto: P, config: CacheConfig) -> Result<Self, FsError> {
        Ok(Self {
            proto,
            dir: config.prepare()?,
        })
    }
}

impl<P: Protocol> Protocol for CacheProto<P> {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        let (fs, path) = self.proto.file_system(uri).map_err(|e| e.layer("cache"))?;
        let (base, _) = uri_split(uri);
        let cached = CacheFs::with_prepared_dir(fs, self.dir.clone()).with_namespace(base);
        Ok((Arc::new(cached), path))
    }
}

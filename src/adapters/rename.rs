//! Name rewriting before delegation.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tracing::trace;
use url::Url;

use crate::path::check_path;
use crate::uri::RelativeUri;
use crate::{DirEntry, File, FileSystem, FsError, FsRef, Layer, Metadata, Protocol};

/// Rewrites a parsed name into the name passed to the inner filesystem.
pub type RenameFn = Arc<dyn Fn(&RelativeUri) -> String + Send + Sync>;

/// Rewrites names before `open`, `read_file` and `stat` reach the inner
/// filesystem.
///
/// The name is split into path, query and fragment first, so a rewrite can
/// move query parameters into the path or drop them. Without a rewrite
/// function every call passes through unchanged. Listings and globs are not
/// rewritten.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use layerfs::{FileSystem, MemoryFs, RenameFs};
///
/// let inner = MemoryFs::new().with_file("v2/data.json", "{}");
/// let fs = RenameFs::new(
///     inner,
///     Some(Arc::new(|name: &layerfs::RelativeUri| {
///         match name.query.as_deref() {
///             Some(q) if q.starts_with("v=") => format!("v{}/{}", &q[2..], name.path),
///             _ => name.path.clone(),
///         }
///     })),
/// );
/// assert_eq!(fs.read_file("data.json?v=2").unwrap(), b"{}");
/// ```
#[derive(Clone)]
pub struct RenameFs<F> {
    inner: F,
    rename: Option<RenameFn>,
}

impl<F> fmt::Debug for RenameFs<F>
where
    F: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenameFs")
            .field("inner", &self.inner)
            .field("rename", &self.rename.is_some())
            .finish()
    }
}

impl<F: FileSystem> RenameFs<F> {
    /// Rewrite names with `rename`; `None` passes names through.
    pub fn new(inner: F, rename: Option<RenameFn>) -> Self {
        Self { inner, rename }
    }

    fn rename<'a>(&self, operation: &'static str, name: &'a str) -> Result<Cow<'a, str>, FsError> {
        check_path(operation, name)?;
        Ok(match &self.rename {
            Some(rename) => {
                let renamed = rename(&RelativeUri::parse(name));
                trace!(from = name, to = %renamed, "renamed");
                renamed.into()
            }
            None => name.into(),
        })
    }
}

impl<F: FileSystem> FileSystem for RenameFs<F> {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        self.rename("open", path)
            .and_then(|name| self.inner.open(&name))
            .map_err(|e| e.layer("rename"))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        self.rename("read_file", path)
            .and_then(|name| self.inner.read_file(&name))
            .map_err(|e| e.layer("rename"))
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        self.rename("stat", path)
            .and_then(|name| self.inner.stat(&name))
            .map_err(|e| e.layer("rename"))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        self.inner.read_dir(path).map_err(|e| e.layer("rename"))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        self.inner.glob(pattern).map_err(|e| e.layer("rename"))
    }
}

/// Layer producing [`RenameFs`].
#[derive(Clone, Default)]
pub struct RenameLayer {
    rename: Option<RenameFn>,
}

impl RenameLayer {
    /// A layer rewriting names with `rename`.
    pub fn new(rename: Option<RenameFn>) -> Self {
        Self { rename }
    }
}

impl<F: FileSystem> Layer<F> for RenameLayer {
    type FileSystem = RenameFs<F>;

    fn layer(self, inner: F) -> Self::FileSystem {
        RenameFs::new(inner, self.rename)
    }
}

/// Wraps the filesystem of another protocol in [`RenameFs`].
#[derive(Clone)]
pub struct RenameProto<P> {
    proto: P,
    rename: Option<RenameFn>,
}

impl<P: Protocol> RenameProto<P> {
    /// Rewrite names on filesystems produced by `proto`.
    pub fn new(proto: P, rename: Option<RenameFn>) -> Self {
        Self { proto, rename }
    }
}

impl<P: Protocol> Protocol for RenameProto<P> {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        let (fs, path) = self.proto.file_system(uri).map_err(|e| e.layer("rename"))?;
        Ok((Arc::new(RenameFs::new(fs, self.rename.clone())), path))
    }
}

//! Views of a subtree.

use std::sync::Arc;

use crate::path::{check_path, check_pattern, prefix};
use crate::{DirEntry, File, FileSystem, FsError, FsRef, Metadata};

/// The subtree of `fs` rooted at `dir`.
///
/// Uses the filesystem's native [`FileSystem::sub`] when it offers one and
/// falls back to a [`SubFs`] prefixing view otherwise. `dir == "."` returns
/// `fs` itself.
///
/// # Errors
///
/// - [`FsError::InvalidPath`] if `dir` is not a valid path or has a query
///
/// # Example
///
/// ```rust
/// use layerfs::{sub, FileSystem, FsRef, MemoryFs};
/// use std::sync::Arc;
///
/// let fs: FsRef = Arc::new(MemoryFs::new().with_file("assets/logo.svg", "<svg/>"));
/// let assets = sub(fs, "assets").unwrap();
/// assert_eq!(assets.read_file("logo.svg").unwrap(), b"<svg/>");
/// ```
pub fn sub(fs: FsRef, dir: &str) -> Result<FsRef, FsError> {
    check_dir(dir)?;
    if dir == "." {
        return Ok(fs);
    }
    if let Some(native) = fs.sub(dir)? {
        return Ok(native);
    }
    Ok(Arc::new(SubFs {
        inner: fs,
        dir: dir.to_string(),
    }))
}

fn check_dir(dir: &str) -> Result<(), FsError> {
    check_path("sub", dir)?;
    if dir.contains('?') {
        return Err(FsError::InvalidPath {
            path: dir.to_string(),
            operation: "sub",
        });
    }
    Ok(())
}

/// A filesystem that prefixes every path with a fixed directory.
#[derive(Clone)]
pub struct SubFs {
    inner: FsRef,
    dir: String,
}

impl SubFs {
    /// View `inner` rooted at `dir`.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPath`] if `dir` is not a valid path or has a query
    pub fn new(inner: FsRef, dir: &str) -> Result<Self, FsError> {
        check_dir(dir)?;
        Ok(Self {
            inner,
            dir: dir.to_string(),
        })
    }

    fn full(&self, operation: &'static str, name: &str) -> Result<String, FsError> {
        check_path(operation, name)?;
        Ok(prefix(&self.dir, name))
    }

    fn shorten<'a>(&self, name: &'a str) -> Option<&'a str> {
        if name == self.dir {
            return Some(".");
        }
        name.strip_prefix(self.dir.as_str())?.strip_prefix('/')
    }
}

impl std::fmt::Debug for SubFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubFs").field("dir", &self.dir).finish_non_exhaustive()
    }
}

impl FileSystem for SubFs {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        self.inner.open(&self.full("open", path)?)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        self.inner.read_file(&self.full("read_file", path)?)
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        self.inner.stat(&self.full("stat", path)?)
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let entries = self.inner.read_dir(&self.full("read_dir", path)?)?;
        Ok(entries
            .into_iter()
            .map(|mut entry| {
                if let Some(short) = self.shorten(&entry.path) {
                    entry.path = short.to_string();
                }
                entry
            })
            .collect())
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        check_pattern("glob", pattern)?;
        if pattern == "." {
            return Ok(vec![".".to_string()]);
        }
        let full = format!("{}/{pattern}", escape_meta(&self.dir));
        let matches = self.inner.glob(&full)?;
        Ok(matches
            .iter()
            .filter_map(|name| self.shorten(name))
            .map(str::to_string)
            .collect())
    }

    fn sub(&self, dir: &str) -> Result<Option<FsRef>, FsError> {
        check_dir(dir)?;
        sub(Arc::clone(&self.inner), &prefix(&self.dir, dir)).map(Some)
    }
}

fn escape_meta(dir: &str) -> String {
    let mut out = String::with_capacity(dir.len());
    for c in dir.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\' | '{' | '}') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

//! The filesystem capability contract.

use std::io::Read;
use std::sync::Arc;

use crate::path::{self, check_path};
use crate::{DirEntry, File, FsError, Metadata};

/// Shared, type-erased filesystem handle.
///
/// Protocols and combinators work with heterogeneous filesystems, so they
/// pass them around as `FsRef`. Decorators are generic over their inner
/// filesystem and accept an `FsRef` like any other.
pub type FsRef = Arc<dyn FileSystem>;

/// A read-only filesystem addressed by slash-separated relative paths.
///
/// Only [`open`](Self::open) is required. Every other operation has a
/// correct but slow default built on `open`; implementations override the
/// ones they can do better. Decorators forward each operation to the inner
/// filesystem's own method, so an inner optimization (a cache hit, a native
/// directory listing) is never lost to a default.
///
/// # Paths
///
/// Paths follow the `io/fs` convention: relative, slash-separated, no `.` or
/// `..` elements, no empty elements, `.` alone names the root. A path may
/// carry a query (`file.json?checksum=...`) for adapters that read
/// side-channel parameters. Passing an invalid path is a caller error
/// ([`FsError::InvalidPath`]).
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; all methods take `&self`.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn FileSystem`.
///
/// # Example
///
/// ```rust
/// use layerfs::{FileSystem, MemoryFs};
///
/// let fs = MemoryFs::new().with_file("dir/a.txt", "hello");
/// assert_eq!(fs.read_file("dir/a.txt").unwrap(), b"hello");
/// assert_eq!(fs.glob("dir/*.txt").unwrap(), vec!["dir/a.txt".to_string()]);
/// ```
pub trait FileSystem: Send + Sync {
    /// Open the named file or directory.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPath`] if `path` is not a valid path
    /// - [`FsError::NotFound`] if the path does not exist
    /// - [`FsError::PermissionDenied`] if access is refused
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError>;

    /// Read the entire file.
    ///
    /// Default: `open`, drain, `close`.
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        read_all(self.open(path)?, "read_file", path)
    }

    /// Metadata for a path.
    ///
    /// Default: `open`, [`File::stat`], `close`.
    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        let file = self.open(path)?;
        let stat = file.stat();
        close_with(file, stat)
    }

    /// List a directory, sorted by name.
    ///
    /// Default: `open`, [`File::read_dir`], `close`.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotSupported`] if the opened file cannot list entries
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let mut file = self.open(path)?;
        let entries = file.read_dir();
        let mut entries = close_with(file, entries)?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Paths matching `pattern`, sorted.
    ///
    /// Pattern syntax follows `path.Match`: `*`, `?` and `[...]` classes,
    /// none of which cross a `/`. Default: walk with `stat` and `read_dir`.
    ///
    /// # Errors
    ///
    /// - [`FsError::BadPattern`] if the pattern is malformed
    fn glob(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        path::glob(self, pattern)
    }

    /// A native view of the subtree at `dir`, if the filesystem offers one.
    ///
    /// `Ok(None)` means "no native support"; use [`crate::sub`] to get a
    /// view of any filesystem.
    fn sub(&self, dir: &str) -> Result<Option<FsRef>, FsError> {
        check_path("sub", dir)?;
        Ok(None)
    }
}

/// Drain an open file and close it, reporting read and close errors
/// together.
pub(crate) fn read_all(
    mut file: Box<dyn File>,
    operation: &'static str,
    path: &str,
) -> Result<Vec<u8>, FsError> {
    let mut buf = Vec::new();
    let read = file
        .read_to_end(&mut buf)
        .map(|_| buf)
        .map_err(|e| FsError::from_io(e, operation, path));
    close_with(file, read)
}

/// Close `file` and merge the close outcome into `result`.
pub(crate) fn close_with<T>(file: Box<dyn File>, result: Result<T, FsError>) -> Result<T, FsError> {
    match (result, file.close()) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
        (Err(err), Err(close)) => Err(err.append(close)),
    }
}

impl<F: FileSystem + ?Sized> FileSystem for Arc<F> {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        (**self).open(path)
    }
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        (**self).read_file(path)
    }
    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        (**self).stat(path)
    }
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        (**self).read_dir(path)
    }
    fn glob(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        (**self).glob(pattern)
    }
    fn sub(&self, dir: &str) -> Result<Option<FsRef>, FsError> {
        (**self).sub(dir)
    }
}

impl<F: FileSystem + ?Sized> FileSystem for Box<F> {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        (**self).open(path)
    }
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        (**self).read_file(path)
    }
    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        (**self).stat(path)
    }
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        (**self).read_dir(path)
    }
    fn glob(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        (**self).glob(pattern)
    }
    fn sub(&self, dir: &str) -> Result<Option<FsRef>, FsError> {
        (**self).sub(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemFile, MemoryFs};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;

    /// Counts how often the derived defaults fall back to `open`.
    struct OpenOnly {
        inner: MemoryFs,
        opens: AtomicUsize,
    }

    impl FileSystem for OpenOnly {
        fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.inner.open(path)
        }
    }

    struct FailingClose;

    impl std::io::Read for FailingClose {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("read failed"))
        }
    }

    impl File for FailingClose {
        fn stat(&self) -> Result<Metadata, FsError> {
            Ok(Metadata::default())
        }
        fn close(self: Box<Self>) -> Result<(), FsError> {
            Err(FsError::NotSupported { operation: "close" })
        }
    }

    fn fixture() -> OpenOnly {
        OpenOnly {
            inner: MemoryFs::new()
                .with_file("a.txt", "alpha")
                .with_file("dir/b.txt", "beta")
                .with_file("dir/c.md", "gamma"),
            opens: AtomicUsize::new(0),
        }
    }

    #[test]
    fn filesystem_is_object_safe() {
        fn _check(_: &dyn FileSystem) {}
    }

    #[test]
    fn default_read_file_uses_open() {
        let fs = fixture();
        assert_eq!(fs.read_file("a.txt").unwrap(), b"alpha");
        assert_eq!(fs.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_stat_reports_file_and_dir() {
        let fs = fixture();
        let file = fs.stat("dir/b.txt").unwrap();
        assert!(file.is_file());
        assert_eq!(file.size, 4);
        assert!(fs.stat("dir").unwrap().is_dir());
    }

    #[test]
    fn default_read_dir_is_sorted() {
        let fs = fixture();
        let names: Vec<_> = fs
            .read_dir(".")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "dir"]);
    }

    #[test]
    fn default_read_dir_on_file_is_not_supported() {
        let fs = fixture();
        let err = fs.read_dir("a.txt").unwrap_err();
        assert!(matches!(err, FsError::NotSupported { .. }));
    }

    #[test]
    fn default_sub_rejects_invalid_dir() {
        let fs = fixture();
        assert!(fs.sub("dir").unwrap().is_none());
        assert!(matches!(fs.sub("/dir"), Err(FsError::InvalidPath { .. })));
    }

    #[test]
    fn read_all_reports_read_and_close_errors() {
        let err = read_all(Box::new(FailingClose), "read_file", "x").unwrap_err();
        match err {
            FsError::Multiple(errors) => {
                assert!(matches!(errors[0], FsError::Io { .. }));
                assert!(matches!(errors[1], FsError::NotSupported { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn close_with_keeps_value_on_clean_close() {
        let file = Box::new(MemFile::new(b"x".to_vec(), Metadata::file("x", 1, SystemTime::now())));
        assert_eq!(close_with(file, Ok(7)).unwrap(), 7);
    }

    #[test]
    fn arc_and_box_forward() {
        let fs: FsRef = Arc::new(fixture());
        assert_eq!(fs.read_file("a.txt").unwrap(), b"alpha");
        let boxed: Box<dyn FileSystem> = Box::new(fixture());
        assert_eq!(boxed.glob("*.txt").unwrap(), vec!["a.txt".to_string()]);
    }
}

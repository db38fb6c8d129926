//! URI scheme resolution.

use url::Url;

use crate::{FsError, FsRef};

/// Resolves a parsed URI to a filesystem and a path inside it.
///
/// The filesystem is rooted at the highest level the scheme and authority
/// address (a local root, an HTTP origin, an IPFS gateway chain); the path is
/// a valid relative path, possibly carrying the URI's query.
///
/// # Example
///
/// ```rust
/// use layerfs::{FileProto, FileSystem, Protocol};
/// use url::Url;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
///
/// let uri = Url::from_file_path(dir.path().join("a.txt")).unwrap();
/// let (fs, path) = FileProto::default().file_system(&uri).unwrap();
/// assert_eq!(fs.read_file(&path).unwrap(), b"hi");
/// ```
pub trait Protocol: Send + Sync {
    /// Build the filesystem for `uri` and return it with the relative path.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidUri`] if the URI violates the scheme's constraints
    /// - [`FsError::UnknownScheme`] if no protocol handles the scheme
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError>;
}

impl<P: Protocol + ?Sized> Protocol for std::sync::Arc<P> {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        (**self).file_system(uri)
    }
}

impl<P: Protocol + ?Sized> Protocol for Box<P> {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        (**self).file_system(uri)
    }
}

//! Routing by URI scheme.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwest::blocking::Client;
use tracing::debug;
use url::Url;

use crate::uri::parse_uri;
use crate::{Context, FileProto, FsError, FsRef, HttpProto, IpfsConfig, IpfsProto, Protocol};

/// Builds the protocol that serves a URI.
///
/// Factories run on every resolution, so they can pick settings from the URI
/// itself (credentials, query parameters) or hand out a shared protocol.
pub type ProtoFactory = Arc<dyn Fn(&Url) -> Result<Arc<dyn Protocol>, FsError> + Send + Sync>;

/// Dispatches URIs to the protocol registered for their scheme.
///
/// Use [`Mux::resolve`] for strings: a string without `://` resolves as a
/// `file` URI. Unregistered schemes fail with [`FsError::UnknownScheme`].
///
/// # Example
///
/// ```rust
/// use layerfs::{FileProto, Mux};
///
/// let mux = Mux::new().with_protocol("file", FileProto::default());
/// let (_fs, path) = mux.resolve("/etc/hosts").unwrap();
/// assert_eq!(path, "etc/hosts");
/// assert!(mux.resolve("ftp://example.com/x").is_err());
/// ```
#[derive(Clone, Default)]
pub struct Mux {
    factories: HashMap<String, ProtoFactory>,
}

impl Mux {
    /// An empty mux.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `scheme`, replacing any previous one.
    pub fn register<F>(&mut self, scheme: impl Into<String>, factory: F)
    where
        F: Fn(&Url) -> Result<Arc<dyn Protocol>, FsError> + Send + Sync + 'static,
    {
        self.factories.insert(scheme.into(), Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_factory<F>(mut self, scheme: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Url) -> Result<Arc<dyn Protocol>, FsError> + Send + Sync + 'static,
    {
        self.register(scheme, factory);
        self
    }

    /// Serve `scheme` with one shared protocol.
    pub fn with_protocol(self, scheme: impl Into<String>, protocol: impl Protocol + 'static) -> Self {
        let protocol: Arc<dyn Protocol> = Arc::new(protocol);
        self.with_factory(scheme, move |_: &Url| Ok(Arc::clone(&protocol)))
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Parse `uri` and resolve it; bare paths use the `file` scheme.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidUri`] if `uri` cannot be parsed
    /// - [`FsError::UnknownScheme`] if no protocol serves the scheme
    pub fn resolve(&self, uri: &str) -> Result<(FsRef, String), FsError> {
        parse_uri(self, uri)
    }
}

impl fmt::Debug for Mux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mux").field("schemes", &self.schemes()).finish()
    }
}

impl Protocol for Mux {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        let scheme = match uri.scheme() {
            "" => "file",
            scheme => scheme,
        };
        let factory = self
            .factories
            .get(scheme)
            .ok_or_else(|| FsError::UnknownScheme {
                scheme: scheme.to_string(),
            })?;
        debug!(scheme, uri = %uri, "dispatch");
        factory(uri)?.file_system(uri)
    }
}

/// A mux serving `file`, `http`, `https`, `ipfs` and `ipfs+gateway`.
///
/// HTTP and IPFS share `client`; IPFS uses the default gateway list.
pub fn default_mux(ctx: Context, client: Client) -> Mux {
    let http = HttpProto::new(ctx.clone(), client.clone());
    let ipfs = IpfsProto::new(ctx, client, IpfsConfig::default());
    Mux::new()
        .with_protocol("file", FileProto::default())
        .with_protocol("http", http.clone())
        .with_protocol("https", http)
        .with_protocol("ipfs", ipfs.clone())
        .with_protocol("ipfs+gateway", ipfs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, FileSystem};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn bare_paths_resolve_as_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "local").unwrap();
        let mux = Mux::new().with_protocol("file", FileProto::new(dir.path()));

        let (fs, path) = mux.resolve("a.txt").unwrap();
        assert_eq!(fs.read_file(&path).unwrap(), b"local");
    }

    #[test]
    fn unknown_scheme_is_permanent() {
        let err = Mux::new().resolve("ftp://host/x").err().expect("expected error");
        assert!(matches!(&err, FsError::UnknownScheme { scheme } if scheme == "ftp"));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(!err.is_retryable());
    }

    #[test]
    fn factory_runs_per_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mux = Mux::new().with_factory("file", move |_: &Url| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FileProto::default()) as Arc<dyn Protocol>)
        });
        mux.resolve("file:///tmp").unwrap();
        mux.resolve("/tmp").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn factory_errors_propagate() {
        let mux = Mux::new().with_factory("file", |uri: &Url| {
            Err(FsError::InvalidUri {
                uri: uri.to_string(),
                reason: "disabled".into(),
            })
        });
        assert!(matches!(mux.resolve("x"), Err(FsError::InvalidUri { .. })));
    }

    #[test]
    fn default_mux_schemes() {
        let mux = default_mux(Context::background(), Client::new());
        assert_eq!(mux.schemes(), ["file", "http", "https", "ipfs", "ipfs+gateway"]);
        let (_, path) = mux.resolve("https://example.com/a/b?c=d").unwrap();
        assert_eq!(path, "a/b?c=d");
        let (_, path) = mux.resolve("ipfs://bafycid/dir/file.json").unwrap();
        assert_eq!(path, "bafycid/dir/file.json");
    }
}

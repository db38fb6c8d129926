//! HTTP backend.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::SystemTime;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::LAST_MODIFIED;
use tracing::debug;
use url::Url;

use crate::path::{base_name, check_path};
use crate::uri::{uri_join, uri_split};
use crate::{Context, File, FileSystem, FsError, FsRef, Metadata, Permissions, Protocol};

/// Turns a filesystem path into the URL to fetch.
///
/// The default, [`JoinResolver`], appends the path and its query to the base
/// URL. Gateways that encode part of the path elsewhere (in a subdomain, in a
/// fixed prefix) supply their own resolver; any
/// `Fn(&Url, &str) -> Result<Url, FsError>` closure works.
pub trait ResolvePath: Send + Sync {
    /// The URL for `name` below `base`.
    fn resolve(&self, base: &Url, name: &str) -> Result<Url, FsError>;
}

impl<F> ResolvePath for F
where
    F: Fn(&Url, &str) -> Result<Url, FsError> + Send + Sync,
{
    fn resolve(&self, base: &Url, name: &str) -> Result<Url, FsError> {
        self(base, name)
    }
}

/// Resolves a path by joining it, with its query, onto the base URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinResolver;

impl ResolvePath for JoinResolver {
    fn resolve(&self, base: &Url, name: &str) -> Result<Url, FsError> {
        uri_join(base, name)
    }
}

/// A client with the crate's defaults.
///
/// # Errors
///
/// - [`FsError::Http`] if the TLS backend cannot be initialized
pub fn default_client() -> Result<Client, FsError> {
    Client::builder().build().map_err(|source| FsError::Http {
        url: String::new(),
        source,
    })
}

/// Check that `uri` can serve as an HTTP base.
///
/// The scheme must be `http` or `https`, the URI must not be opaque, the host
/// must be present and there must be no fragment.
///
/// # Errors
///
/// - [`FsError::InvalidUri`] naming the violated constraint
pub fn validate_http_uri(uri: &Url) -> Result<(), FsError> {
    let invalid = |reason: String| FsError::InvalidUri {
        uri: uri.to_string(),
        reason,
    };
    if uri.scheme() != "http" && uri.scheme() != "https" {
        return Err(invalid(format!("unknown scheme: {}", uri.scheme())));
    }
    if uri.cannot_be_a_base() {
        return Err(invalid("opaque URI not allowed".into()));
    }
    if uri.host_str().is_none_or(str::is_empty) {
        return Err(invalid("empty host".into()));
    }
    if uri.fragment().is_some() {
        return Err(invalid("fragment not allowed".into()));
    }
    Ok(())
}

/// A read-only filesystem served over HTTP GET.
///
/// `open` fetches the resolved URL and streams the response body. The
/// status code decides the outcome:
///
/// | Status | Result |
/// |--------|--------|
/// | 200 | file with `Content-Length` size and `Last-Modified` time |
/// | 404 | [`FsError::NotFound`] |
/// | 401, 402, 403 | [`FsError::PermissionDenied`] |
/// | anything else | [`FsError::HttpStatus`] |
///
/// Requests are bounded by the context's deadline and abandoned once the
/// context is cancelled.
#[derive(Clone)]
pub struct HttpFs {
    ctx: Context,
    client: Client,
    base: Url,
    resolver: Arc<dyn ResolvePath>,
}

impl HttpFs {
    /// A filesystem rooted at `base` using a default client.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidUri`] if `base` is not a valid HTTP base
    pub fn new(ctx: Context, base: Url) -> Result<Self, FsError> {
        Self::with_client(ctx, default_client()?, base)
    }

    /// A filesystem rooted at `base` sharing `client`.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidUri`] if `base` is not a valid HTTP base
    pub fn with_client(ctx: Context, client: Client, base: Url) -> Result<Self, FsError> {
        validate_http_uri(&base)?;
        Ok(Self {
            ctx,
            client,
            base,
            resolver: Arc::new(JoinResolver),
        })
    }

    /// Replace the path resolution strategy.
    pub fn with_resolver(mut self, resolver: impl ResolvePath + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// The base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn fail(&self, url: &Url, source: reqwest::Error) -> FsError {
        if let Some(err) = self.ctx.err() {
            return err;
        }
        FsError::Http {
            url: url.to_string(),
            source,
        }
    }
}

impl fmt::Debug for HttpFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFs")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl FileSystem for HttpFs {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        check_path("open", path)?;
        let url = self.resolver.resolve(&self.base, path)?;
        if let Some(err) = self.ctx.err() {
            return Err(err);
        }

        let mut request = self.client.get(url.clone());
        if let Some(remaining) = self.ctx.remaining() {
            request = request.timeout(remaining);
        }
        debug!(url = %url, "GET");
        let response = request.send().map_err(|e| self.fail(&url, e))?;
        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "response");
        if let Some(err) = status_error(&url, status) {
            return Err(err);
        }

        let mut meta = Metadata::file(
            base_name(path),
            response.content_length().unwrap_or(0),
            last_modified(&response),
        );
        meta.permissions = Permissions::read_only();
        Ok(Box::new(HttpFile {
            ctx: self.ctx.clone(),
            response,
            meta,
        }))
    }
}

fn status_error(url: &Url, status: StatusCode) -> Option<FsError> {
    match status {
        StatusCode::OK => None,
        StatusCode::NOT_FOUND => Some(FsError::NotFound {
            path: url.to_string(),
        }),
        StatusCode::UNAUTHORIZED | StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN => {
            Some(FsError::PermissionDenied {
                path: url.to_string(),
                operation: "open",
            })
        }
        status => Some(FsError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        }),
    }
}

fn last_modified(response: &Response) -> SystemTime {
    response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
        .unwrap_or_else(SystemTime::now)
}

fn parse_http_date(value: &str) -> Option<SystemTime> {
    chrono::DateTime::parse_from_rfc2822(value)
        .ok()
        .map(SystemTime::from)
}

struct HttpFile {
    ctx: Context,
    response: Response,
    meta: Metadata,
}

impl Read for HttpFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.ctx.err() {
            return Err(err.into_io());
        }
        // A client timeout on the body surfaces as the context's own error.
        self.response.read(buf).map_err(|err| match self.ctx.err() {
            Some(ctx_err) => ctx_err.into_io(),
            None => err,
        })
    }
}

impl File for HttpFile {
    fn stat(&self) -> Result<Metadata, FsError> {
        Ok(self.meta.clone())
    }
}

/// Protocol for `http` and `https` URIs.
///
/// The filesystem is rooted at the URI's scheme and authority; the path,
/// with its query, is returned relative to it.
#[derive(Clone)]
pub struct HttpProto {
    ctx: Context,
    client: Client,
}

impl HttpProto {
    /// A protocol issuing requests with `client` under `ctx`.
    pub fn new(ctx: Context, client: Client) -> Self {
        Self { ctx, client }
    }
}

impl fmt::Debug for HttpProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProto").finish_non_exhaustive()
    }
}

impl Protocol for HttpProto {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        validate_http_uri(uri)?;
        let (base, path) = uri_split(uri);
        let fs = HttpFs::with_client(self.ctx.clone(), self.client.clone(), base)?;
        Ok((Arc::new(fs), path))
    }
}

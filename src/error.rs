//! Error types for the layerfs filesystem adapters.

use std::fmt;
use std::io;

/// Canonical error classification shared by every backend and adapter.
///
/// Backends map their native conditions (HTTP status codes, OS errors) onto
/// these kinds so upper layers such as retry and chain can decide what to do
/// without knowing which backend produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed path, pattern or URI. Never retried.
    InvalidInput,
    /// Resource absent at the backend. Never retried.
    NotFound,
    /// Backend refused access. Never retried.
    PermissionDenied,
    /// Network failure, unexpected status, temporary I/O error.
    Transient,
    /// Content arrived but is wrong (checksum, decompression). Never retried.
    Integrity,
    /// The operation's context was cancelled or ran past its deadline.
    Cancelled,
}

/// Filesystem error type with contextual variants.
///
/// Adapters wrap errors in [`FsError::Layer`] to record which layer failed;
/// [`FsError::is_kind`] looks through any number of layers and aggregates, so
/// callers can still test for the original condition.
///
/// # Examples
///
/// ```rust
/// use layerfs::{ErrorKind, FsError};
///
/// let err = FsError::NotFound { path: "missing.txt".into() }.layer("retry");
/// assert_eq!(err.to_string(), "retry: not found: missing.txt");
/// assert!(err.is_kind(ErrorKind::NotFound));
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    // Invalid input
    /// Path is not a clean, relative, slash-separated path.
    #[error("{operation}: invalid path: {path}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// The operation that rejected it.
        operation: &'static str,
    },

    /// Glob pattern is malformed.
    #[error("{operation}: bad pattern: {pattern}")]
    BadPattern {
        /// The rejected pattern.
        pattern: String,
        /// The operation that rejected it.
        operation: &'static str,
    },

    /// URI is malformed or violates a protocol's constraints.
    #[error("invalid URI: {uri} ({reason})")]
    InvalidUri {
        /// The rejected URI.
        uri: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No protocol is registered for the scheme.
    #[error("unknown scheme: {scheme}")]
    UnknownScheme {
        /// The unregistered scheme.
        scheme: String,
    },

    /// Checksum query parameter could not be decoded.
    #[error("invalid checksum for {path}: {value}")]
    InvalidChecksum {
        /// The path carrying the parameter.
        path: String,
        /// The raw parameter value.
        value: String,
    },

    /// Operation is not supported by this filesystem or file.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: &'static str,
    },

    // Not found / permission
    /// Path does not exist.
    #[error("not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: String,
    },

    /// Permission denied for operation.
    #[error("{operation}: permission denied: {path}")]
    PermissionDenied {
        /// The path where permission was denied.
        path: String,
        /// The operation that was denied.
        operation: &'static str,
    },

    // Transient
    /// HTTP server answered with a status other than 200, 401-404.
    #[error("{url}: unexpected status code: {status} {}", status_text(.status))]
    HttpStatus {
        /// The requested URL.
        url: String,
        /// The status code received.
        status: u16,
    },

    /// HTTP request could not be completed.
    #[error("{url}: request failed: {source}")]
    Http {
        /// The requested URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved in the operation.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    // Integrity
    /// Content digest does not match the expected checksum.
    #[error("checksum mismatch: {path} (expected {expected}, got {actual})")]
    ChecksumMismatch {
        /// The path that failed verification.
        path: String,
        /// Hex digest requested by the caller.
        expected: String,
        /// Hex digest of the received content.
        actual: String,
    },

    /// Decompressed data exceeded the configured budget.
    #[error("unexpected end of data: {path} exceeds the {limit} byte limit")]
    Truncated {
        /// The path being decompressed.
        path: String,
        /// The decompression budget in bytes.
        limit: u64,
    },

    /// Invalid data encountered (corrupt stream, bad encoding).
    #[error("invalid data: {path} ({details})")]
    InvalidData {
        /// The path with invalid data.
        path: String,
        /// Details about the invalid data.
        details: String,
    },

    // Cancellation
    /// The context was cancelled.
    #[error("context cancelled")]
    Cancelled,

    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    // Composition
    /// Error annotated with the adapter layer it passed through.
    #[error("{layer}: {source}")]
    Layer {
        /// Name of the adapter layer.
        layer: &'static str,
        /// The wrapped error.
        #[source]
        source: Box<FsError>,
    },

    /// Several errors from independent attempts (chain members, close calls).
    #[error("following errors occurred: [{}]", DisplayList(.0))]
    Multiple(Vec<FsError>),
}

impl FsError {
    /// Wrap this error with the name of the layer it passed through.
    pub fn layer(self, layer: &'static str) -> Self {
        FsError::Layer {
            layer,
            source: Box::new(self),
        }
    }

    /// Combine two errors into one, flattening nested aggregates.
    pub fn append(self, other: FsError) -> Self {
        let mut errors = match self {
            FsError::Multiple(errors) => errors,
            err => vec![err],
        };
        match other {
            FsError::Multiple(more) => errors.extend(more),
            err => errors.push(err),
        }
        FsError::Multiple(errors)
    }

    /// Join zero or more errors.
    ///
    /// Returns `None` for an empty input and the error itself for a single
    /// one; anything else becomes a flattened [`FsError::Multiple`].
    pub fn join<I>(errors: I) -> Option<Self>
    where
        I: IntoIterator<Item = FsError>,
    {
        errors.into_iter().fold(None, |acc, err| match acc {
            None => Some(err),
            Some(acc) => Some(acc.append(err)),
        })
    }

    /// Canonical kind of this error.
    ///
    /// Layers report the kind of the error they wrap. An aggregate reports a
    /// kind only when every member agrees, and [`ErrorKind::Transient`]
    /// otherwise.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::InvalidPath { .. }
            | FsError::BadPattern { .. }
            | FsError::InvalidUri { .. }
            | FsError::UnknownScheme { .. }
            | FsError::InvalidChecksum { .. }
            | FsError::NotSupported { .. } => ErrorKind::InvalidInput,
            FsError::NotFound { .. } => ErrorKind::NotFound,
            FsError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            FsError::HttpStatus { .. } | FsError::Http { .. } | FsError::Io { .. } => {
                ErrorKind::Transient
            }
            FsError::ChecksumMismatch { .. }
            | FsError::Truncated { .. }
            | FsError::InvalidData { .. } => ErrorKind::Integrity,
            FsError::Cancelled | FsError::DeadlineExceeded => ErrorKind::Cancelled,
            FsError::Layer { source, .. } => source.kind(),
            FsError::Multiple(errors) => {
                let mut kinds = errors.iter().map(FsError::kind);
                match kinds.next() {
                    Some(first) if kinds.all(|k| k == first) => first,
                    _ => ErrorKind::Transient,
                }
            }
        }
    }

    /// Returns `true` if this error, any error it wraps, or any member of an
    /// aggregate it contains has the given kind.
    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        match self {
            FsError::Layer { source, .. } => source.is_kind(kind),
            FsError::Multiple(errors) => errors.iter().any(|e| e.is_kind(kind)),
            other => other.kind() == kind,
        }
    }

    /// Shorthand for `is_kind(ErrorKind::NotFound)`.
    pub fn is_not_found(&self) -> bool {
        self.is_kind(ErrorKind::NotFound)
    }

    /// Shorthand for `is_kind(ErrorKind::PermissionDenied)`.
    pub fn is_permission_denied(&self) -> bool {
        self.is_kind(ErrorKind::PermissionDenied)
    }

    /// Shorthand for `is_kind(ErrorKind::Cancelled)`.
    pub fn is_cancelled(&self) -> bool {
        self.is_kind(ErrorKind::Cancelled)
    }

    /// Returns `true` if repeating the operation might succeed.
    ///
    /// Invalid input, not-found, permission, integrity and cancellation
    /// errors are permanent, wherever they appear in the error tree.
    pub fn is_retryable(&self) -> bool {
        ![
            ErrorKind::InvalidInput,
            ErrorKind::NotFound,
            ErrorKind::PermissionDenied,
            ErrorKind::Integrity,
            ErrorKind::Cancelled,
        ]
        .into_iter()
        .any(|kind| self.is_kind(kind))
    }

    /// Convert an I/O error raised while working on `path`.
    ///
    /// Readers report integrity failures by tunnelling an `FsError` through
    /// `io::Error`; such errors are unwrapped intact instead of being
    /// reclassified as plain I/O failures.
    pub fn from_io(error: io::Error, operation: &'static str, path: &str) -> Self {
        if error
            .get_ref()
            .is_some_and(|inner| inner.is::<FsError>())
        {
            if let Some(inner) = error.into_inner() {
                if let Ok(fs_error) = inner.downcast::<FsError>() {
                    return *fs_error;
                }
            }
            return FsError::Io {
                operation,
                path: path.to_string(),
                source: io::Error::other("unrecoverable wrapped error"),
            };
        }
        match error.kind() {
            io::ErrorKind::NotFound => FsError::NotFound {
                path: path.to_string(),
            },
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied {
                path: path.to_string(),
                operation,
            },
            _ => FsError::Io {
                operation,
                path: path.to_string(),
                source: error,
            },
        }
    }

    /// Tunnel this error through `io::Error` so it survives `Read` calls.
    pub fn into_io(self) -> io::Error {
        let kind = match &self {
            FsError::NotFound { .. } => io::ErrorKind::NotFound,
            FsError::PermissionDenied { .. } => io::ErrorKind::PermissionDenied,
            FsError::Truncated { .. } => io::ErrorKind::UnexpectedEof,
            // `Interrupted` is retried by `read_to_end` and friends.
            FsError::Cancelled => io::ErrorKind::Other,
            FsError::DeadlineExceeded => io::ErrorKind::TimedOut,
            err if err.kind() == ErrorKind::Integrity => io::ErrorKind::InvalidData,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }
}

impl From<io::Error> for FsError {
    fn from(error: io::Error) -> Self {
        FsError::from_io(error, "io", "")
    }
}

fn status_text(status: &u16) -> &'static str {
    reqwest::StatusCode::from_u16(*status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

struct DisplayList<'a>(&'a [FsError]);

impl fmt::Display for DisplayList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

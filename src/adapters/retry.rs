//! Retrying decorator.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::retry::{Attempt, try_with};
use crate::{Context, DirEntry, File, FileSystem, FsError, FsRef, Layer, Metadata, Protocol};

/// Retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// Maximum number of attempts; negative retries until the context ends.
    pub attempts: i32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Retries every operation of the inner filesystem on transient errors.
///
/// Errors that cannot improve by repetition (invalid path or pattern, not
/// found, permission denied, integrity failures) are returned after the first
/// attempt. Once the attempts run out the last error is returned, labelled
/// `retry`. If the context ends first its cancellation error is returned
/// as is.
///
/// # Example
///
/// ```rust
/// use layerfs::{Context, FileSystem, MemoryFs, RetryConfig, RetryFs};
/// use std::time::Duration;
///
/// let config = RetryConfig { attempts: 5, delay: Duration::from_millis(10) };
/// let fs = RetryFs::new(Context::background(), MemoryFs::new(), config);
/// let err = fs.read_file("missing.txt").unwrap_err();
/// assert!(err.is_not_found());
/// ```
#[derive(Debug, Clone)]
pub struct RetryFs<F> {
    ctx: Context,
    inner: F,
    config: RetryConfig,
}

impl<F: FileSystem> RetryFs<F> {
    /// Wrap `inner` with `config`, aborting waits when `ctx` ends.
    pub fn new(ctx: Context, inner: F, config: RetryConfig) -> Self {
        Self { ctx, inner, config }
    }

    /// The wrapped filesystem.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    fn run<T>(
        &self,
        operation: &'static str,
        path: &str,
        mut f: impl FnMut(&F) -> Result<T, FsError>,
    ) -> Result<T, FsError> {
        let mut attempt = 0u32;
        let result = try_with(&self.ctx, self.config.attempts, self.config.delay, |_| {
            attempt += 1;
            match f(&self.inner) {
                Ok(value) => Attempt::Done(Ok(value)),
                Err(err) if err.is_retryable() => {
                    debug!(operation, path, attempt, error = %err, "attempt failed");
                    Attempt::Retry(err)
                }
                Err(err) => Attempt::Done(Err(err)),
            }
        });
        result.map_err(|err| match err {
            FsError::Cancelled | FsError::DeadlineExceeded => err,
            err => {
                if err.is_retryable() {
                    warn!(operation, path, attempts = attempt, error = %err, "retries exhausted");
                }
                err.layer("retry")
            }
        })
    }
}

impl<F: FileSystem> FileSystem for RetryFs<F> {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        self.run("open", path, |fs| fs.open(path))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        self.run("read_file", path, |fs| fs.read_file(path))
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        self.run("stat", path, |fs| fs.stat(path))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        self.run("read_dir", path, |fs| fs.read_dir(path))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        self.run("glob", pattern, |fs| fs.glob(pattern))
    }

    fn sub(&self, dir: &str) -> Result<Option<FsRef>, FsError> {
        let native = self.inner.sub(dir).map_err(|e| e.layer("retry"))?;
        Ok(native.map(|inner| {
            Arc::new(RetryFs::new(self.ctx.clone(), inner, self.config)) as FsRef
        }))
    }
}

/// Layer producing [`RetryFs`].
#[derive(Debug, Clone, Default)]
pub struct RetryLayer {
    ctx: Context,
    config: RetryConfig,
}

impl RetryLayer {
    /// A layer retrying with `config` under `ctx`.
    pub fn new(ctx: Context, config: RetryConfig) -> Self {
        Self { ctx, config }
    }
}

impl<F: FileSystem> Layer<F> for RetryLayer {
    type FileSystem = RetryFs<F>;

    fn layer(self, inner: F) -> Self::FileSystem {
        RetryFs::new(self.ctx, inner, self.config)
    }
}

/// Wraps the filesystem of another protocol in [`RetryFs`].
#[derive(Debug, Clone)]
pub struct RetryProto<P> {
    ctx: Context,
    proto: P,
    config: RetryConfig,
}

impl<P: Protocol> RetryProto<P> {
    /// Retry filesystems produced by `proto`.
    pub fn new(ctx: Context, proto: P, config: RetryConfig) -> Self {
        Self { ctx, proto, config }
    }
}

impl<P: Protocol> Protocol for RetryProto<P> {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        let (fs, path) = self.proto.file_system(uri).map_err(|e| e.layer("retry"))?;
        Ok((Arc::new(RetryFs::new(self.ctx.clone(), fs, self.config)), path))
    }
}

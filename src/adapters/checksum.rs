//! Content verification against a digest carried in the query.

use std::io::{self, Read};
use std::sync::Arc;

use sha2::digest::DynDigest;
use sha2::{Digest, Sha256, Sha384, Sha512};
use url::Url;
use url::form_urlencoded;

use crate::path::{check_path, check_pattern};
use crate::traits::close_with;
use crate::{DirEntry, File, FileSystem, FsError, FsRef, Layer, MemFile, Metadata, Protocol};

/// When a digest is compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VerifyMode {
    /// Hash while the caller reads; a mismatch fails the read that reaches
    /// end of stream.
    #[default]
    AfterRead,
    /// Read and hash everything inside `open`; a mismatch fails `open` and no
    /// byte reaches the caller.
    AfterOpen,
}

/// Digest algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum HashAlgorithm {
    /// SHA-256.
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    fn hasher(self) -> Box<dyn DynDigest + Send> {
        match self {
            HashAlgorithm::Sha256 => Box::new(Sha256::new()),
            HashAlgorithm::Sha384 => Box::new(Sha384::new()),
            HashAlgorithm::Sha512 => Box::new(Sha512::new()),
        }
    }

    /// Digest length in bytes.
    pub fn output_size(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Digest of `data`.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize().into_vec()
    }
}

/// Checksum verification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChecksumConfig {
    /// Query parameter carrying the hex digest.
    pub param: String,
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// When the digest is compared.
    pub mode: VerifyMode,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            param: "checksum".into(),
            algorithm: HashAlgorithm::default(),
            mode: VerifyMode::default(),
        }
    }
}

/// Verifies content against `?checksum=<hex>` on the opened name.
///
/// The parameter is removed before the name reaches the inner filesystem;
/// other query parameters are kept. The hex value may carry a `0x` prefix.
/// Names without the parameter pass through unverified.
///
/// # Example
///
/// ```rust
/// use layerfs::{ChecksumConfig, ChecksumFs, FileSystem, HashAlgorithm, MemoryFs};
///
/// let fs = ChecksumFs::new(MemoryFs::new().with_file("a.txt", "hello"), ChecksumConfig::default());
/// let sum = hex::encode(HashAlgorithm::Sha256.digest(b"hello"));
///
/// assert_eq!(fs.read_file(&format!("a.txt?checksum={sum}")).unwrap(), b"hello");
/// assert!(fs.read_file(&format!("a.txt?checksum={}", "00".repeat(32))).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ChecksumFs<F> {
    inner: F,
    config: ChecksumConfig,
}

impl<F: FileSystem> ChecksumFs<F> {
    /// Verify content read from `inner`.
    pub fn new(inner: F, config: ChecksumConfig) -> Self {
        Self { inner, config }
    }

    fn verify_open(&self, name: &str) -> Result<Box<dyn File>, FsError> {
        let (stripped, expected) = split_checksum(&self.config, name)?;
        let file = self.inner.open(&stripped)?;
        let Some(expected) = expected else {
            return Ok(file);
        };
        let mut file = ChecksumFile::new(file, self.config.algorithm, expected, name);
        match self.config.mode {
            VerifyMode::AfterRead => Ok(Box::new(file)),
            VerifyMode::AfterOpen => {
                let meta = file.inner.stat();
                let mut data = Vec::new();
                let read = file
                    .read_to_end(&mut data)
                    .map_err(|e| FsError::from_io(e, "open", name));
                let meta = close_with(Box::new(file), read.and(meta))?;
                Ok(Box::new(MemFile::new(data, meta)))
            }
        }
    }

    fn verify_read(&self, name: &str) -> Result<Vec<u8>, FsError> {
        let (stripped, expected) = split_checksum(&self.config, name)?;
        let data = self.inner.read_file(&stripped)?;
        if let Some(expected) = expected {
            let actual = self.config.algorithm.digest(&data);
            if actual != expected {
                return Err(mismatch(name, &expected, &actual));
            }
        }
        Ok(data)
    }
}

fn mismatch(name: &str, expected: &[u8], actual: &[u8]) -> FsError {
    FsError::ChecksumMismatch {
        path: name.to_string(),
        expected: hex::encode(expected),
        actual: hex::encode(actual),
    }
}

/// Remove the checksum parameter from `name` and decode its value.
///
/// Returns the name to pass on and the expected digest, if any.
fn split_checksum(config: &ChecksumConfig, name: &str) -> Result<(String, Option<Vec<u8>>), FsError> {
    let Some((path, query)) = name.split_once('?') else {
        return Ok((name.to_string(), None));
    };
    let mut value = None;
    let mut rest = Vec::new();
    for pair in query.split('&') {
        let key = form_urlencoded::parse(pair.as_bytes()).next();
        match key {
            Some((key, val)) if key == config.param.as_str() => {
                value.get_or_insert(val.into_owned());
            }
            _ => rest.push(pair),
        }
    }
    let Some(value) = value else {
        return Ok((name.to_string(), None));
    };

    let invalid = || FsError::InvalidChecksum {
        path: name.to_string(),
        value: value.clone(),
    };
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(&value);
    let expected = hex::decode(digits).map_err(|_| invalid())?;
    if expected.len() != config.algorithm.output_size() {
        return Err(invalid());
    }

    // Other parameters are passed on byte for byte.
    let stripped = if rest.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", rest.join("&"))
    };
    Ok((stripped, Some(expected)))
}

impl<F: FileSystem> FileSystem for ChecksumFs<F> {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        check_path("open", path)
            .and_then(|()| self.verify_open(path))
            .map_err(|e| e.layer("checksum"))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        check_path("read_file", path)
            .and_then(|()| self.verify_read(path))
            .map_err(|e| e.layer("checksum"))
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        check_path("stat", path)
            .and_then(|()| split_checksum(&self.config, path))
            .and_then(|(stripped, _)| self.inner.stat(&stripped))
            .map_err(|e| e.layer("checksum"))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        check_path("read_dir", path)
            .and_then(|()| self.inner.read_dir(path))
            .map_err(|e| e.layer("checksum"))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        check_pattern("glob", pattern)
            .and_then(|()| self.inner.glob(pattern))
            .map_err(|e| e.layer("checksum"))
    }

    fn sub(&self, dir: &str) -> Result<Option<FsRef>, FsError> {
        let native = self.inner.sub(dir).map_err(|e| e.layer("checksum"))?;
        Ok(native.map(|inner| Arc::new(ChecksumFs::new(inner, self.config.clone())) as FsRef))
    }
}

/// Hashes the stream as it is read and compares at end of stream.
struct ChecksumFile {
    inner: Box<dyn File>,
    hasher: Option<Box<dyn DynDigest + Send>>,
    expected: Vec<u8>,
    name: String,
    actual: Option<Vec<u8>>,
}

impl ChecksumFile {
    fn new(inner: Box<dyn File>, algorithm: HashAlgorithm, expected: Vec<u8>, name: &str) -> Self {
        Self {
            inner,
            hasher: Some(algorithm.hasher()),
            expected,
            name: name.to_string(),
            actual: None,
        }
    }

    fn check(&self) -> io::Result<usize> {
        match &self.actual {
            Some(actual) if *actual != self.expected => {
                Err(mismatch(&self.name, &self.expected, actual).into_io())
            }
            _ => Ok(0),
        }
    }
}

impl Read for ChecksumFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.actual.is_some() {
            return self.check();
        }
        let n = self.inner.read(buf)?;
        if n > 0 || buf.is_empty() {
            if let Some(hasher) = self.hasher.as_mut() {
                hasher.update(&buf[..n]);
            }
            return Ok(n);
        }
        self.actual = self.hasher.take().map(|h| h.finalize().into_vec());
        self.check()
    }
}

impl File for ChecksumFile {
    fn stat(&self) -> Result<Metadata, FsError> {
        self.inner.stat()
    }

    fn close(self: Box<Self>) -> Result<(), FsError> {
        self.inner.close()
    }
}

/// Layer producing [`ChecksumFs`].
#[derive(Debug, Clone, Default)]
pub struct ChecksumLayer {
    config: ChecksumConfig,
}

impl ChecksumLayer {
    /// A layer verifying with `config`.
    pub fn new(config: ChecksumConfig) -> Self {
        Self { config }
    }
}

impl<F: FileSystem> Layer<F> for ChecksumLayer {
    type FileSystem = ChecksumFs<F>;

    fn layer(self, inner: F) -> Self::FileSystem {
        ChecksumFs::new(inner, self.config)
    }
}

/// Wraps the filesystem of another protocol in [`ChecksumFs`].
#[derive(Debug, Clone)]
pub struct ChecksumProto<P> {
    proto: P,
    config: ChecksumConfig,
}

impl<P: Protocol> ChecksumProto<P> {
    /// Verify filesystems produced by `proto`.
    pub fn new(proto: P, config: ChecksumConfig) -> Self {
        Self { proto, config }
    }
}

impl<P: Protocol> Protocol for ChecksumProto<P> {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        let (fs, path) = self.proto.file_system(uri).map_err(|e| e.layer("checksum"))?;
        Ok((Arc::new(ChecksumFs::new(fs, self.config.clone())), path))
    }
}

//! Transparent gzip decompression.

use std::io::{self, Read};
use std::sync::Arc;

use flate2::read::MultiGzDecoder;
use url::Url;

use crate::path::{check_path, check_pattern};
use crate::traits::read_all;
use crate::{DirEntry, File, FileSystem, FsError, FsRef, Layer, Metadata, Protocol};

const DEFAULT_READ_LIMIT: u64 = 128 * 1024 * 1024;

/// Decompression settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GzipConfig {
    /// Maximum number of decompressed bytes per file.
    pub read_limit: u64,
    /// Only decompress names ending in one of `extensions`.
    pub check_extension: bool,
    /// Extensions without the leading dot.
    pub extensions: Vec<String>,
}

impl Default for GzipConfig {
    fn default() -> Self {
        Self {
            read_limit: DEFAULT_READ_LIMIT,
            check_extension: true,
            extensions: vec!["gz".into()],
        }
    }
}

impl GzipConfig {
    fn should_decompress(&self, name: &str) -> bool {
        if !self.check_extension {
            return true;
        }
        let path = name.split_once('?').map_or(name, |(path, _)| path);
        self.extensions.iter().any(|ext| {
            path.strip_suffix(ext.as_str())
                .is_some_and(|stem| stem.ends_with('.'))
        })
    }
}

/// Decompresses gzip content on `open` and `read_file`.
///
/// The extension test looks at the path part of the name only, so
/// `data.json.gz?v=2` is decompressed. Decompressed output is capped at
/// [`GzipConfig::read_limit`]; a stream with more data fails with
/// [`FsError::Truncated`] instead of ending quietly. `stat`, `read_dir` and
/// `glob` describe the compressed files.
///
/// # Example
///
/// ```rust
/// use std::io::Write;
/// use flate2::{Compression, write::GzEncoder};
/// use layerfs::{FileSystem, GzipConfig, GzipFs, MemoryFs};
///
/// let mut enc = GzEncoder::new(Vec::new(), Compression::default());
/// enc.write_all(b"hello").unwrap();
/// let packed = enc.finish().unwrap();
///
/// let fs = GzipFs::new(MemoryFs::new().with_file("a.txt.gz", packed), GzipConfig::default());
/// assert_eq!(fs.read_file("a.txt.gz").unwrap(), b"hello");
/// ```
#[derive(Debug, Clone)]
pub struct GzipFs<F> {
    inner: F,
    config: GzipConfig,
}

impl<F: FileSystem> GzipFs<F> {
    /// Decompress files of `inner`.
    pub fn new(inner: F, config: GzipConfig) -> Self {
        Self { inner, config }
    }

    fn open_decoded(&self, name: &str) -> Result<Box<dyn File>, FsError> {
        let file = self.inner.open(name)?;
        if !self.config.should_decompress(name) {
            return Ok(file);
        }
        Ok(Box::new(GzipFile::new(file, self.config.read_limit, name)))
    }
}

impl<F: FileSystem> FileSystem for GzipFs<F> {
    fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        check_path("open", path)
            .and_then(|()| self.open_decoded(path))
            .map_err(|e| e.layer("gzip"))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        check_path("read_file", path)
            .and_then(|()| {
                if self.config.should_decompress(path) {
                    read_all(self.open_decoded(path)?, "read_file", path)
                } else {
                    self.inner.read_file(path)
                }
            })
            .map_err(|e| e.layer("gzip"))
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        check_path("stat", path)
            .and_then(|()| self.inner.stat(path))
            .map_err(|e| e.layer("gzip"))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        check_path("read_dir", path)
            .and_then(|()| self.inner.read_dir(path))
            .map_err(|e| e.layer("gzip"))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        check_pattern("glob", pattern)
            .and_then(|()| self.inner.glob(pattern))
            .map_err(|e| e.layer("gzip"))
    }

    fn sub(&self, dir: &str) -> Result<Option<FsRef>, FsError> {
        let native = self.inner.sub(dir).map_err(|e| e.layer("gzip"))?;
        Ok(native.map(|inner| Arc::new(GzipFs::new(inner, self.config.clone())) as FsRef))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reading,
    Eof,
    Truncated,
}

/// Decoder with a decompressed-size budget.
struct GzipFile {
    decoder: MultiGzDecoder<Box<dyn File>>,
    remaining: u64,
    limit: u64,
    name: String,
    state: State,
}

impl GzipFile {
    fn new(file: Box<dyn File>, limit: u64, name: &str) -> Self {
        Self {
            decoder: MultiGzDecoder::new(file),
            remaining: limit,
            limit,
            name: name.to_string(),
            state: State::Reading,
        }
    }

    fn truncated(&self) -> io::Error {
        FsError::Truncated {
            path: self.name.clone(),
            limit: self.limit,
        }
        .into_io()
    }

    /// Reclassify decoder failures as corrupt data, keeping errors that
    /// already carry an `FsError` from the wrapped file.
    fn decode_error(&self, err: io::Error) -> io::Error {
        let carries_fs_error = err.get_ref().is_some_and(|inner| inner.is::<FsError>());
        match err.kind() {
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
                if !carries_fs_error =>
            {
                FsError::InvalidData {
                    path: self.name.clone(),
                    details: format!("gzip: {err}"),
                }
                .into_io()
            }
            _ => err,
        }
    }
}

impl Read for GzipFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.state {
            State::Eof => return Ok(0),
            State::Truncated => return Err(self.truncated()),
            State::Reading => {}
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            let mut probe = [0u8; 1];
            return match self.decoder.read(&mut probe) {
                Ok(0) => {
                    self.state = State::Eof;
                    Ok(0)
                }
                Ok(_) => {
                    self.state = State::Truncated;
                    Err(self.truncated())
                }
                Err(err) => Err(self.decode_error(err)),
            };
        }
        let max = usize::try_from(self.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let n = self
            .decoder
            .read(&mut buf[..max])
            .map_err(|err| self.decode_error(err))?;
        if n == 0 {
            self.state = State::Eof;
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

impl File for GzipFile {
    /// Metadata of the compressed file.
    fn stat(&self) -> Result<Metadata, FsError> {
        self.decoder.get_ref().stat()
    }

    fn close(self: Box<Self>) -> Result<(), FsError> {
        self.decoder.into_inner().close()
    }
}

/// Layer producing [`GzipFs`].
#[derive(Debug, Clone, Default)]
pub struct GzipLayer {
    config: GzipConfig,
}

impl GzipLayer {
    /// A layer decompressing with `config`.
    pub fn new(config: GzipConfig) -> Self {
        Self { config }
    }
}

impl<F: FileSystem> Layer<F> for GzipLayer {
    type FileSystem = GzipFs<F>;

    fn layer(self, inner: F) -> Self::FileSystem {
        GzipFs::new(inner, self.config)
    }
}

/// Wraps the filesystem of another protocol in [`GzipFs`].
#[derive(Debug, Clone)]
pub struct GzipProto<P> {
    proto: P,
    config: GzipConfig,
}

impl<P: Protocol> GzipProto<P> {
    /// Decompress filesystems produced by `proto`.
    pub fn new(proto: P, config: GzipConfig) -> Self {
        Self { proto, config }
    }
}

impl<P: Protocol> Protocol for GzipProto<P> {
    fn file_system(&self, uri: &Url) -> Result<(FsRef, String), FsError> {
        let (fs, path) = self.proto.file_system(uri).map_err(|e| e.layer("gzip"))?;
        Ok((Arc::new(GzipFs::new(fs, self.config.clone())), path))
    }
}

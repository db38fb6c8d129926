//! # Extension Traits
//!
//! Convenience methods for any [`FileSystem`].
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`read_to_string`](FsExt::read_to_string) | Read a UTF-8 file |
//! | [`exists`](FsExt::exists) | Check if a path exists |
//! | [`is_file`](FsExt::is_file) | Check if path is a regular file |
//! | [`is_dir`](FsExt::is_dir) | Check if path is a directory |
//!
//! ## JSON Support (Feature-Gated)
//!
//! With the `serde` feature enabled, [`FsExtJson::read_json`] reads and
//! deserializes a JSON file.
//!
//! ```toml
//! [dependencies]
//! layerfs = { version = "0.1", features = ["serde"] }
//! ```

use crate::{FileSystem, FsError};

/// Extension methods for any filesystem.
///
/// # Example
///
/// ```rust
/// use layerfs::{FsExt, MemoryFs};
///
/// let fs = MemoryFs::new().with_file("notes/today.md", "# Today");
/// assert!(fs.is_dir("notes").unwrap());
/// assert!(!fs.exists("notes/yesterday.md").unwrap());
/// assert_eq!(fs.read_to_string("notes/today.md").unwrap(), "# Today");
/// ```
pub trait FsExt: FileSystem {
    /// Read the whole file as UTF-8.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidData`] if the content is not valid UTF-8
    /// - any error from [`FileSystem::read_file`]
    fn read_to_string(&self, path: &str) -> Result<String, FsError> {
        String::from_utf8(self.read_file(path)?).map_err(|e| FsError::InvalidData {
            path: path.to_string(),
            details: e.to_string(),
        })
    }

    /// Check if the path exists.
    ///
    /// Returns `Ok(false)` if the path doesn't exist (not an error).
    fn exists(&self, path: &str) -> Result<bool, FsError> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check if the path points to a regular file.
    ///
    /// Returns `Ok(false)` if the path doesn't exist (not an error).
    /// Returns `Err` only for actual failures (permission denied, etc.).
    fn is_file(&self, path: &str) -> Result<bool, FsError> {
        match self.stat(path) {
            Ok(m) => Ok(m.is_file()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check if the path points to a directory.
    ///
    /// Returns `Ok(false)` if the path doesn't exist (not an error).
    fn is_dir(&self, path: &str) -> Result<bool, FsError> {
        match self.stat(path) {
            Ok(m) => Ok(m.is_dir()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<F: FileSystem + ?Sized> FsExt for F {}

#[cfg(feature = "serde")]
mod json {
    use super::*;
    use serde::de::DeserializeOwned;

    /// JSON extension methods.
    ///
    /// Available when the `serde` feature is enabled.
    pub trait FsExtJson: FileSystem {
        /// Read a file and deserialize it as JSON.
        ///
        /// # Errors
        ///
        /// - [`FsError::InvalidData`] if the content is not valid JSON for `T`
        /// - any error from [`FileSystem::read_file`]
        ///
        /// # Example
        ///
        /// ```rust
        /// use layerfs::{FsExtJson, MemoryFs};
        ///
        /// let fs = MemoryFs::new().with_file("config.json", r#"{"retries": 3}"#);
        /// let value: serde_json::Value = fs.read_json("config.json").unwrap();
        /// assert_eq!(value["retries"], 3);
        /// ```
        fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FsError> {
            let data = self.read_file(path)?;
            serde_json::from_slice(&data).map_err(|e| FsError::InvalidData {
                path: path.to_string(),
                details: e.to_string(),
            })
        }
    }

    impl<F: FileSystem + ?Sized> FsExtJson for F {}
}

#[cfg(feature = "serde")]
pub use json::FsExtJson;

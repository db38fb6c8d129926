//! Open file handles.

use std::io::Read;

use crate::{DirEntry, FsError, Metadata};

/// An open resource: a byte stream plus its metadata.
///
/// Files are created by [`FileSystem::open`](crate::FileSystem::open), read
/// through [`Read`], and released by [`close`](Self::close). Dropping a file
/// without closing it releases its resources but discards any close error.
///
/// Readers that detect an integrity failure (checksum mismatch, exceeded
/// decompression budget) report it as an `io::Error` wrapping an
/// [`FsError`]; [`FsError::from_io`] recovers the original error.
pub trait File: Read + Send {
    /// Metadata of the open file.
    fn stat(&self) -> Result<Metadata, FsError>;

    /// List the entries of an open directory.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotSupported`] if the handle is not a directory or the
    ///   backend cannot list it
    fn read_dir(&mut self) -> Result<Vec<DirEntry>, FsError> {
        Err(FsError::NotSupported {
            operation: "read_dir",
        })
    }

    /// Release the handle and every resource it owns.
    ///
    /// Handles composed of several resources close all of them and report
    /// every failure, joined.
    fn close(self: Box<Self>) -> Result<(), FsError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File").finish_non_exhaustive()
    }
}

//! # Filesystem Traits
//!
//! The contract every backend, decorator and combinator implements.
//!
//! | Trait | Role |
//! |-------|------|
//! | [`FileSystem`] | `open` plus optional operations with derived defaults |
//! | [`File`] | An open byte stream with metadata and an aggregating `close` |
//! | [`Protocol`] | URI → (filesystem, relative path) |
//!
//! ## Derived Defaults
//!
//! Only `open` is required. The remaining operations fall back to it:
//!
//! | Operation | Default |
//! |-----------|---------|
//! | `read_file` | `open`, read to end, `close` |
//! | `stat` | `open`, [`File::stat`], `close` |
//! | `read_dir` | `open`, [`File::read_dir`], `close` |
//! | `glob` | pattern walk over `stat` and `read_dir` |
//! | `sub` | `Ok(None)`; [`crate::sub`] then builds a prefixing view |
//!
//! Backends override whatever they can do natively. Decorators override
//! every operation and forward it to the inner filesystem's own method.

mod file;
mod filesystem;
mod protocol;

pub use file::File;
pub use filesystem::{FileSystem, FsRef};
pub(crate) use filesystem::{close_with, read_all};
pub use protocol::Protocol;

//! # layerfs
//!
//! Composable, read-only virtual filesystems over local disk, HTTP and IPFS
//! gateways.
//!
//! A filesystem only has to implement [`FileSystem::open`]; `read_file`,
//! `stat`, `read_dir`, `glob` and `sub` have working defaults built on it,
//! and adapters override them when they can do better. Adapters wrap other
//! filesystems, so behavior is assembled by stacking:
//!
//! ```text
//! caller ──▶ Retry ──▶ Checksum ──▶ Gzip ──▶ Http / Dir / Memory
//! ```
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust
//! use layerfs::{ChecksumLayer, FileSystem, GzipLayer, HashAlgorithm, LayerExt, MemoryFs};
//!
//! let fs = MemoryFs::new()
//!     .with_file("prices.json", r#"{"eth": 1}"#)
//!     .layer(GzipLayer::default())
//!     .layer(ChecksumLayer::default());
//!
//! let sum = hex::encode(HashAlgorithm::Sha256.digest(br#"{"eth": 1}"#));
//! let data = fs.read_file(&format!("prices.json?checksum={sum}")).unwrap();
//! assert_eq!(data, br#"{"eth": 1}"#);
//! ```
//!
//! Resolving URIs goes through a [`Protocol`]; [`default_mux`] serves
//! `file`, `http`, `https`, `ipfs` and `ipfs+gateway`:
//!
//! ```rust,no_run
//! use layerfs::{Context, FileSystem, default_client, default_mux};
//!
//! let mux = default_mux(Context::background(), default_client()?);
//! let (fs, path) = mux.resolve("https://example.com/data.json.gz")?;
//! let data = fs.read_file(&path)?;
//! # Ok::<(), layerfs::FsError>(())
//! ```
//!
//! ---
//!
//! ## Building Blocks
//!
//! | Kind | Types |
//! |------|-------|
//! | Contract | [`FileSystem`], [`File`], [`Protocol`], [`FsRef`] |
//! | Backends | [`DirFs`], [`HttpFs`], [`MemoryFs`] |
//! | Decorators | [`RetryFs`], [`CacheFs`], [`ChecksumFs`], [`GzipFs`], [`RenameFs`] |
//! | Combinators | [`ChainFs`], [`Mux`], [`SubFs`] |
//! | Gateways | [`IpfsFs`], [`IpfsProto`] |
//! | Composition | [`Layer`], [`LayerExt`], [`FsExt`] |
//!
//! ---
//!
//! ## Paths
//!
//! Names are slash-separated, relative and clean (`a/b.txt`, never `/a`,
//! `a/../b` or `a//b`); `.` is the root. Anything after the first `?` is a
//! query: adapters read parameters such as `checksum` from it and the HTTP
//! backend sends it along. See [`path`].
//!
//! ---
//!
//! ## Error Handling
//!
//! All operations return `Result<T, FsError>`. Adapters label the errors
//! passing through them, and [`FsError::is_kind`] still finds the original
//! condition:
//!
//! ```rust
//! use layerfs::{ChainFs, ErrorKind, FileSystem, MemoryFs};
//! use std::sync::Arc;
//!
//! let fs = ChainFs::new(vec![Arc::new(MemoryFs::new()), Arc::new(MemoryFs::new())]);
//! let err = fs.read_file("missing.txt").unwrap_err();
//! assert!(err.is_kind(ErrorKind::NotFound));
//! assert_eq!(
//!     err.to_string(),
//!     "chain: following errors occurred: [not found: missing.txt, not found: missing.txt]"
//! );
//! ```
//!
//! ---
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (retry attempts, chain fallthrough,
//! cache hits, HTTP requests) and never installs a subscriber.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialization for metadata and adapter configs, plus [`FsExtJson`] |

// Private modules
mod adapters;
mod backend;
mod combine;
mod context;
mod error;
mod ext;
mod file;
mod ipfs;
mod layer;
mod memory;
mod sub;
mod traits;
mod types;

// Public modules
pub mod path;
pub mod retry;
pub mod uri;

// Public re-exports - errors and types
pub use error::{ErrorKind, FsError};
pub use types::{DirEntry, FileType, Metadata, Permissions};

// Public re-exports - contract
pub use context::Context;
pub use file::MemFile;
pub use traits::{File, FileSystem, FsRef, Protocol};

// Public re-exports - backends
pub use backend::{
    DirFs, FileProto, HttpFs, HttpProto, JoinResolver, ResolvePath, default_client,
    validate_http_uri,
};
pub use memory::MemoryFs;
pub use sub::{SubFs, sub};

// Public re-exports - adapters
pub use adapters::{
    CacheConfig, CacheFs, CacheLayer, CacheProto, ChecksumConfig, ChecksumFs, ChecksumLayer,
    ChecksumProto, GzipConfig, GzipFs, GzipLayer, GzipProto, HashAlgorithm, RenameFn, RenameFs,
    RenameLayer, RenameProto, RetryConfig, RetryFs, RetryLayer, RetryProto, VerifyMode,
};
pub use combine::{ChainFs, ChainProto, Mux, ProtoFactory, default_mux};
pub use ipfs::{
    GatewayConfig, GatewayStyle, IpfsConfig, IpfsFs, IpfsProto, default_gateways,
    path_resolution, subdomain_resolution,
};

// Public re-exports - infrastructure
pub use ext::FsExt;
pub use layer::{Layer, LayerExt};
pub use uri::{RelativeUri, parse_uri};

// Conditional re-exports
#[cfg(feature = "serde")]
pub use ext::FsExtJson;

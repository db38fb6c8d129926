//! # Layer Trait
//!
//! Tower-style composition of filesystem decorators.
//!
//! ## How It Works
//!
//! ```text
//! FileSystem ──▶ Layer::layer() ──▶ Decorated FileSystem
//! ```
//!
//! Each decorator provides:
//! 1. A wrapper struct that implements [`FileSystem`]
//! 2. A `Layer` value carrying its configuration
//!
//! | Layer | Wraps into |
//! |-------|------------|
//! | [`RetryLayer`](crate::RetryLayer) | [`RetryFs`](crate::RetryFs) |
//! | [`CacheLayer`](crate::CacheLayer) | [`CacheFs`](crate::CacheFs) |
//! | [`ChecksumLayer`](crate::ChecksumLayer) | [`ChecksumFs`](crate::ChecksumFs) |
//! | [`GzipLayer`](crate::GzipLayer) | [`GzipFs`](crate::GzipFs) |
//! | [`RenameLayer`](crate::RenameLayer) | [`RenameFs`](crate::RenameFs) |
//!
//! ## Fluent Composition
//!
//! Layers apply innermost first:
//!
//! ```rust
//! use layerfs::{ChecksumLayer, FileSystem, GzipLayer, LayerExt, MemoryFs, RetryLayer};
//!
//! let fs = MemoryFs::new()
//!     .with_file("a.txt", "hello")
//!     .layer(GzipLayer::default())
//!     .layer(ChecksumLayer::default())
//!     .layer(RetryLayer::default());
//!
//! assert_eq!(fs.read_file("a.txt").unwrap(), b"hello");
//! ```

use crate::FileSystem;

/// A value that wraps a filesystem in a decorator.
///
/// `layer(self, inner)` consumes both the configuration and the inner
/// filesystem.
pub trait Layer<F> {
    /// The decorated filesystem.
    type FileSystem: FileSystem;

    /// Wrap `inner`.
    fn layer(self, inner: F) -> Self::FileSystem;
}

/// Fluent `.layer()` on every sized filesystem.
pub trait LayerExt: FileSystem + Sized {
    /// Wrap this filesystem with `layer`.
    fn layer<L: Layer<Self>>(self, layer: L) -> L::FileSystem {
        layer.layer(self)
    }
}

impl<F: FileSystem> LayerExt for F {}

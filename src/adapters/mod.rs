//! # Decorating Adapters
//!
//! Each adapter wraps exactly one inner filesystem and adds one concern.
//!
//! | Adapter | Concern | Error label |
//! |---------|---------|-------------|
//! | [`RetryFs`] | repeat transient failures with a fixed delay | `retry` |
//! | [`CacheFs`] | write-through disk cache keyed by name | `cache` |
//! | [`ChecksumFs`] | verify content against `?checksum=<hex>` | `checksum` |
//! | [`GzipFs`] | bounded gzip decompression by extension | `gzip` |
//! | [`RenameFs`] | rewrite names before delegation | `rename` |
//!
//! Every adapter also comes with a [`Layer`](crate::Layer) for fluent
//! composition and a `*Proto` that wraps the filesystems produced by another
//! [`Protocol`](crate::Protocol).

mod cache;
mod checksum;
mod gzip;
mod rename;
mod retry;

pub use cache::{CacheConfig, CacheFs, CacheLayer, CacheProto};
pub use checksum::{ChecksumConfig, ChecksumFs, ChecksumLayer, ChecksumProto, HashAlgorithm, VerifyMode};
pub use gzip::{GzipConfig, GzipFs, GzipLayer, GzipProto};
pub use rename::{RenameFn, RenameFs, RenameLayer, RenameProto};
pub use retry::{RetryConfig, RetryFs, RetryLayer, RetryProto};

//! Base backends: the filesystems at the bottom of every stack.
//!
//! | Backend | Protocol | Schemes |
//! |---------|----------|---------|
//! | [`DirFs`] | [`FileProto`] | `file` |
//! | [`HttpFs`] | [`HttpProto`] | `http`, `https` |

mod http;
mod local;

pub use http::{HttpFs, HttpProto, JoinResolver, ResolvePath, default_client, validate_http_uri};
pub use local::{DirFs, FileProto};

//! # Combining Adapters
//!
//! | Type | Role |
//! |------|------|
//! | [`ChainFs`] | try members in order (or random order); merge listings |
//! | [`ChainProto`] | hand out one shared chain for any URI |
//! | [`Mux`] | route URIs to protocols by scheme |
//! | [`default_mux`] | a mux for `file`, `http(s)` and `ipfs` |

mod chain;
mod mux;

pub use chain::{ChainFs, ChainProto};
pub use mux::{Mux, ProtoFactory, default_mux};

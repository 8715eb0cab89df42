#![warn(missing_docs)]

//! This crate constitutes a library of light weight helpers that are shared
//! by the graph-rule crates. Nothing in here knows about models or rules; the
//! helpers only deal with values that may not be available yet.

mod deferred;
pub use deferred::*;

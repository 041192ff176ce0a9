//! HTTP plumbing for upstream key-set retrieval.

pub mod client;
pub mod semantics;

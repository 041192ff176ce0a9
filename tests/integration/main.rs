//! Integration tests for key aggregation, discovery, and token verification.

mod common;
mod http_source;
mod manager_lifecycle;
mod verification;

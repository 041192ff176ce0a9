//! Tracing subscriber setup for the binary.

// crates.io
use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber filtered by `RUST_LOG`, falling back to `default_directive`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing(default_directive: &str) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

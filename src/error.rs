//! Crate-wide error types and `Result` alias.

// crates.io
use url::Url;

/// Library-wide result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for the JWKS mesh crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("JWKS manager is already running.")]
	AlreadyRunning,
	#[error("Operation cancelled.")]
	Cancelled,
	#[error("Key {index} cannot be published: {reason}")]
	InvalidKey { index: usize, reason: String },
	#[error("Key '{kid}' exists with different properties across sources.")]
	KeyConflict { kid: String },
	#[error("JWKS manager stopped before keys were loaded: {0}")]
	ManagerFailed(String),
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("GET {url}: {reason}")]
	SourceFetch { url: Url, reason: String },
	#[error("Parsing key set from {url}: {source}")]
	SourceParse { url: Url, source: serde_json::Error },
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}

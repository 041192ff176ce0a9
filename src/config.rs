//! Refresh policy and service configuration.
//!
//! [`RefreshPolicy`] governs every refresh loop the manager spawns. [`ServeConfig`] is the
//! registration boundary used by the binary: upstream key-set URLs and/or one local private key.

// std
use std::net::SocketAddr;
// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::_prelude::*;

/// Consecutive failures tolerated before a source that never loaded becomes fatal.
pub const DEFAULT_WARMUP_ERROR_BUDGET: u32 = 5;
/// Fixed delay before retrying a failed refresh.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
/// Refresh interval used when upstream caching headers give no usable guidance.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Interval reported by static sources.
pub const STATIC_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Per-request timeout for upstream fetches.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Default size guard (1 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 1_048_576;
/// Default listen address for the discovery server.
pub const DEFAULT_JWKS_ADDR: &str = "0.0.0.0:8081";

/// Scheduling and fetch limits shared by every refresh loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPolicy {
	/// Failures tolerated while a source has never loaded; one more is fatal.
	#[serde(default = "default_warmup_error_budget")]
	pub warmup_error_budget: u32,
	/// Delay before retrying after a failed refresh.
	#[serde(default = "default_retry_interval")]
	pub retry_interval: Duration,
	/// Poll interval used when `Cache-Control` is absent, unusable, or forbids caching.
	#[serde(default = "default_poll_interval")]
	pub default_interval: Duration,
	/// Timeout applied to each upstream request.
	#[serde(default = "default_request_timeout")]
	pub request_timeout: Duration,
	/// Maximum size allowed for upstream key-set documents in bytes.
	#[serde(default = "default_max_response_bytes")]
	pub max_response_bytes: u64,
}
impl RefreshPolicy {
	/// Validate invariants for the refresh policy.
	pub fn validate(&self) -> Result<()> {
		if self.retry_interval.is_zero() {
			return Err(Error::Validation {
				field: "retry_interval",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.default_interval.is_zero() {
			return Err(Error::Validation {
				field: "default_interval",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.request_timeout.is_zero() {
			return Err(Error::Validation {
				field: "request_timeout",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.max_response_bytes == 0 {
			return Err(Error::Validation {
				field: "max_response_bytes",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(())
	}
}
impl Default for RefreshPolicy {
	fn default() -> Self {
		Self {
			warmup_error_budget: DEFAULT_WARMUP_ERROR_BUDGET,
			retry_interval: DEFAULT_RETRY_INTERVAL,
			default_interval: DEFAULT_POLL_INTERVAL,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
		}
	}
}

/// Settings for the `serve` command.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServeConfig {
	/// Address the discovery server binds to.
	#[serde(default = "default_jwks_addr")]
	pub jwks_addr: SocketAddr,
	/// Base64-encoded private JWK whose public half is published.
	#[serde(default)]
	pub private_key: Option<String>,
	/// Upstream key-set endpoints merged into the published set.
	#[serde(default)]
	pub upstream_jwks: Vec<Url>,
}
impl ServeConfig {
	/// Validate that at least one key source is configured.
	pub fn validate(&self) -> Result<()> {
		let has_private_key = self.private_key.as_deref().is_some_and(|key| !key.trim().is_empty());

		if !has_private_key && self.upstream_jwks.is_empty() {
			return Err(Error::Validation {
				field: "serve",
				reason: "Set PRIVATE_KEY or UPSTREAM_JWKS (or both).".into(),
			});
		}

		for url in &self.upstream_jwks {
			if !matches!(url.scheme(), "http" | "https") {
				return Err(Error::Validation {
					field: "upstream_jwks",
					reason: format!("Unsupported scheme in {url}."),
				});
			}
		}

		Ok(())
	}
}
impl Default for ServeConfig {
	fn default() -> Self {
		Self { jwks_addr: default_jwks_addr(), private_key: None, upstream_jwks: Vec::new() }
	}
}

fn default_warmup_error_budget() -> u32 {
	DEFAULT_WARMUP_ERROR_BUDGET
}

fn default_retry_interval() -> Duration {
	DEFAULT_RETRY_INTERVAL
}

fn default_poll_interval() -> Duration {
	DEFAULT_POLL_INTERVAL
}

fn default_request_timeout() -> Duration {
	DEFAULT_REQUEST_TIMEOUT
}

fn default_max_response_bytes() -> u64 {
	DEFAULT_MAX_RESPONSE_BYTES
}

fn default_jwks_addr() -> SocketAddr {
	SocketAddr::from(([0, 0, 0, 0], 8081))
}

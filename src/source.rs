//! Key sources feeding the manager.
//!
//! A source is anything that can produce zero or more public signing keys and be refreshed. The
//! manager drives [`KeySource::refresh`] on its own schedule and reads [`KeySource::keys`] at any
//! time, so `keys` must never wait on I/O.

mod http_source;
mod static_source;

pub use http_source::HttpKeySource;
pub use static_source::StaticKeySource;

// std
use std::fmt::Debug;
// self
use crate::_prelude::*;

/// Refreshable provider of public signing keys.
#[async_trait::async_trait]
pub trait KeySource: Debug + Send + Sync {
	/// Reload the key set, returning how long to wait before the next refresh.
	///
	/// On error the previously loaded keys stay in place.
	async fn refresh(&self) -> Result<Duration>;

	/// Latest successfully loaded key set; empty before the first successful refresh.
	fn keys(&self) -> Arc<JwkSet>;

	/// Human-readable identifier used in logs, metrics, and summaries.
	fn name(&self) -> &str;
}

pub(crate) fn sorted_key_ids(jwks: &JwkSet) -> Vec<String> {
	let mut ids: Vec<String> =
		jwks.keys.iter().map(|key| key.common.key_id.clone().unwrap_or_default()).collect();

	ids.sort_unstable();

	ids
}

pub(crate) fn empty_set() -> JwkSet {
	JwkSet { keys: Vec::new() }
}

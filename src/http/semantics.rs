//! `Cache-Control` interpretation for upstream key-set documents.

// crates.io
use headers::CacheControl;
// self
use crate::_prelude::*;

/// Whether the origin forbids reuse without revalidation.
pub fn forbids_caching(cache_control: &CacheControl) -> bool {
	cache_control.no_cache() || cache_control.no_store() || cache_control.private()
}

/// Next refresh interval for a response carrying `cache_control`.
///
/// Caching prohibitions, a missing or malformed header, and a zero `max-age` all fall back to
/// `default`; otherwise a positive `max-age` is used as is.
pub fn refresh_interval(cache_control: Option<&CacheControl>, default: Duration) -> Duration {
	let Some(cache_control) = cache_control else {
		return default;
	};

	if forbids_caching(cache_control) {
		return default;
	}

	match cache_control.max_age() {
		Some(max_age) if !max_age.is_zero() => max_age,
		_ => default,
	}
}

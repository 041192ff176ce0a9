//! HTTP client integration for upstream key-set retrieval.

// crates.io
use headers::{CacheControl, HeaderMapExt};
use http::{
	HeaderMap, StatusCode,
	header::{ACCEPT, ETAG, IF_NONE_MATCH, USER_AGENT},
};
use reqwest::Client;
use url::Url;
// self
use crate::{_prelude::*, config::RefreshPolicy};

/// User agent sent with upstream requests.
pub const DEFAULT_USER_AGENT: &str = concat!("jwks-mesh/", env!("CARGO_PKG_VERSION"));

/// Outcome of a key-set fetch (200 or 304).
#[derive(Clone, Debug)]
pub struct HttpFetch {
	/// Parsed key set; `None` when the origin answered `304 Not Modified`.
	pub jwks: Option<JwkSet>,
	/// Entity tag validator advertised by the origin.
	pub etag: Option<String>,
	/// Parsed `Cache-Control` header; `None` when absent or malformed.
	pub cache_control: Option<CacheControl>,
	/// Response status.
	pub status: StatusCode,
	/// Round-trip duration of the exchange.
	pub elapsed: Duration,
}

/// Build the shared client used by HTTP sources when none is supplied.
pub fn default_client() -> Result<Client> {
	let client = Client::builder()
		.connect_timeout(crate::config::DEFAULT_REQUEST_TIMEOUT)
		.build()?;

	Ok(client)
}

/// GET the key set at `url`.
///
/// `etag` is replayed as `If-None-Match`. Transport failures and unexpected statuses become
/// [`Error::SourceFetch`]; undecodable bodies become [`Error::SourceParse`].
pub async fn fetch_jwks(
	client: &Client,
	url: &Url,
	etag: Option<&str>,
	policy: &RefreshPolicy,
) -> Result<HttpFetch> {
	let mut builder = client
		.get(url.clone())
		.header(ACCEPT, "application/json")
		.header(USER_AGENT, DEFAULT_USER_AGENT)
		.timeout(policy.request_timeout);

	if let Some(etag) = etag {
		builder = builder.header(IF_NONE_MATCH, etag);
	}

	let start = Instant::now();
	let response = builder.send().await.map_err(|err| fetch_error(url, err.to_string()))?;
	let elapsed = start.elapsed();
	let status = response.status();
	let response_etag = header_string(response.headers(), ETAG);
	let cache_control = response.headers().typed_get::<CacheControl>();

	if status == StatusCode::NOT_MODIFIED && etag.is_some() {
		tracing::debug!(url = %url, elapsed = ?elapsed, "key set not modified");

		return Ok(HttpFetch {
			jwks: None,
			etag: response_etag.or_else(|| etag.map(str::to_owned)),
			cache_control,
			status,
			elapsed,
		});
	}
	if status != StatusCode::OK {
		return Err(fetch_error(url, format!("Unexpected status {status}.")));
	}
	if let Some(length) = response.content_length()
		&& length > policy.max_response_bytes
	{
		return Err(oversized(url, length, policy.max_response_bytes));
	}

	let bytes = response.bytes().await.map_err(|err| fetch_error(url, err.to_string()))?;

	if bytes.len() as u64 > policy.max_response_bytes {
		return Err(oversized(url, bytes.len() as u64, policy.max_response_bytes));
	}

	let jwks: JwkSet = serde_json::from_slice(&bytes)
		.map_err(|source| Error::SourceParse { url: url.clone(), source })?;

	tracing::debug!(
		url = %url,
		status = %status,
		elapsed = ?elapsed,
		keys = jwks.keys.len(),
		"key set fetch complete"
	);

	Ok(HttpFetch { jwks: Some(jwks), etag: response_etag, cache_control, status, elapsed })
}

fn header_string(headers: &HeaderMap, name: http::HeaderName) -> Option<String> {
	headers.get(name).and_then(|value| value.to_str().ok()).map(|s| s.to_string())
}

fn fetch_error(url: &Url, reason: String) -> Error {
	Error::SourceFetch { url: url.clone(), reason }
}

fn oversized(url: &Url, size: u64, limit: u64) -> Error {
	fetch_error(
		url,
		format!("Response size {size} bytes exceeds the configured guard of {limit} bytes."),
	)
}

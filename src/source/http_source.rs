// crates.io
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use url::Url;
// self
use crate::{
	_prelude::*,
	config::RefreshPolicy,
	http::{client, semantics},
	source::{self, KeySource},
};

/// Key set polled from a remote JWKS endpoint.
///
/// The refresh interval follows the endpoint's `Cache-Control` header. The last `ETag` is replayed
/// so an unchanged document costs a `304`.
#[derive(Debug)]
pub struct HttpKeySource {
	url: Url,
	client: Client,
	policy: RefreshPolicy,
	state: RwLock<FetchedKeys>,
}
impl HttpKeySource {
	/// Create a source for `url` sharing `client`.
	pub fn new(url: Url, client: Client, policy: RefreshPolicy) -> Self {
		Self { url, client, policy, state: RwLock::new(FetchedKeys::default()) }
	}

	/// Endpoint this source polls.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// When the key set was last replaced or revalidated.
	pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
		self.state.read().refreshed_at
	}

	fn store(&self, jwks: JwkSet, etag: Option<String>) {
		let new_ids = source::sorted_key_ids(&jwks);
		let mut state = self.state.write();
		let old_ids = source::sorted_key_ids(&state.keys);

		if old_ids != new_ids {
			tracing::info!(
				url = %self.url,
				old_keys = ?old_ids,
				new_keys = ?new_ids,
				"loaded new keys"
			);
		}

		state.keys = Arc::new(jwks);
		state.etag = etag;
		state.refreshed_at = Some(Utc::now());
	}
}
#[async_trait]
impl KeySource for HttpKeySource {
	#[tracing::instrument(skip(self), fields(url = %self.url))]
	async fn refresh(&self) -> Result<Duration> {
		let etag = self.state.read().etag.clone();
		let fetch =
			client::fetch_jwks(&self.client, &self.url, etag.as_deref(), &self.policy).await?;
		let interval =
			semantics::refresh_interval(fetch.cache_control.as_ref(), self.policy.default_interval);

		match fetch.jwks {
			Some(jwks) => self.store(jwks, fetch.etag),
			None => {
				let mut state = self.state.write();

				state.etag = fetch.etag;
				state.refreshed_at = Some(Utc::now());
			},
		}

		tracing::debug!(interval = ?interval, "next refresh scheduled");

		Ok(interval)
	}

	fn keys(&self) -> Arc<JwkSet> {
		self.state.read().keys.clone()
	}

	fn name(&self) -> &str {
		self.url.as_str()
	}
}

#[derive(Debug)]
struct FetchedKeys {
	keys: Arc<JwkSet>,
	etag: Option<String>,
	refreshed_at: Option<DateTime<Utc>>,
}
impl Default for FetchedKeys {
	fn default() -> Self {
		Self { keys: Arc::new(source::empty_set()), etag: None, refreshed_at: None }
	}
}

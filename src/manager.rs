//! Aggregating key manager.
//!
//! The manager owns every registered [`KeySource`], runs one refresh loop per source, and merges
//! all of their keys into a single published snapshot after every successful refresh. Readers
//! ([`KeyManager::jwks`], [`KeyManager::merged_keys`]) only clone an `Arc` out of a short-lived
//! read lock, so they observe either the previous or the next snapshot and never a mix.

mod readiness;
mod state;

pub use readiness::ReadinessState;
pub use state::{FailureAction, RefreshPhase};

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use axum::body::Bytes;
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use serde::Serialize;
use tokio::{task::JoinSet, time};
use tokio_util::sync::CancellationToken;
use url::Url;
// self
use crate::{
	_prelude::*,
	config::RefreshPolicy,
	http::client,
	manager::readiness::{LoadBarrier, Readiness},
	metrics::{self, SourceMetrics, SourceMetricsSnapshot},
	security,
	source::{self, HttpKeySource, KeySource, StaticKeySource},
};

const EMPTY_DOCUMENT: &[u8] = br#"{"keys":[]}"#;

/// Builder for [`KeyManager`].
#[derive(Debug, Default)]
pub struct KeyManagerBuilder {
	policy: RefreshPolicy,
	client: Option<Client>,
}
impl KeyManagerBuilder {
	/// Create a builder with the default refresh policy.
	pub fn new() -> Self {
		Self::default()
	}

	/// Override the refresh policy.
	pub fn policy(mut self, policy: RefreshPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Share an existing HTTP client with every HTTP source.
	pub fn http_client(mut self, client: Client) -> Self {
		self.client = Some(client);

		self
	}

	/// Validate the configuration and build the manager.
	pub fn build(self) -> Result<KeyManager> {
		self.policy.validate()?;

		let client = match self.client {
			Some(client) => client,
			None => client::default_client()?,
		};

		Ok(KeyManager {
			inner: Arc::new(Inner {
				policy: self.policy,
				client,
				sources: RwLock::new(Vec::new()),
				published: RwLock::new(Arc::new(PublishedKeys::empty())),
				merge_lock: Mutex::new(()),
				readiness: Readiness::new(),
				running: AtomicBool::new(false),
			}),
		})
	}
}

/// Aggregates many key sources into one published key set.
///
/// Cloning is cheap; clones share state. A manager runs at most once.
#[derive(Clone, Debug)]
pub struct KeyManager {
	inner: Arc<Inner>,
}
impl KeyManager {
	/// Build a manager with the default policy and HTTP client.
	pub fn new() -> Result<Self> {
		KeyManagerBuilder::new().build()
	}

	/// Start configuring a manager.
	pub fn builder() -> KeyManagerBuilder {
		KeyManagerBuilder::new()
	}

	/// Active refresh policy.
	pub fn policy(&self) -> &RefreshPolicy {
		&self.inner.policy
	}

	/// Register a source. Sources added after [`Self::run`] starts are not refreshed.
	pub fn add_source(&self, source: Arc<dyn KeySource>) {
		tracing::debug!(source = source.name(), "registered key source");

		self.inner
			.sources
			.write()
			.push(RegisteredSource { source, metrics: SourceMetrics::new() });
	}

	/// Register one HTTP source per URL, sharing the manager's client.
	///
	/// Every URL is parsed before any source is added.
	pub fn add_source_urls<I, S>(&self, urls: I) -> Result<()>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let urls = urls
			.into_iter()
			.map(|url| Url::parse(url.as_ref()))
			.collect::<Result<Vec<_>, _>>()?;

		for url in urls {
			self.add_source(Arc::new(HttpKeySource::new(
				url,
				self.inner.client.clone(),
				self.inner.policy.clone(),
			)));
		}

		Ok(())
	}

	/// Validate `keys` and register them as one static source.
	///
	/// Nothing is registered when any key is rejected.
	pub fn add_public_keys(&self, keys: impl IntoIterator<Item = Jwk>) -> Result<()> {
		let keys = keys.into_iter().collect::<Vec<_>>();

		for (index, key) in keys.iter().enumerate() {
			security::validate_publishable(index, key)?;
		}

		self.add_source(Arc::new(StaticKeySource::new(keys)));

		Ok(())
	}

	/// Drive every source until `cancel` fires or a source fails before ever loading.
	///
	/// Returns `Ok(())` on cancellation and the first fatal source error otherwise; remaining loops
	/// are cancelled in either case.
	pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
		if self.inner.running.swap(true, Ordering::AcqRel) {
			return Err(Error::AlreadyRunning);
		}

		let sources = self.inner.sources.read().clone();
		let barrier = Arc::new(LoadBarrier::new(sources.len()));
		let cancel = cancel.child_token();
		let mut loops = JoinSet::new();

		tracing::info!(sources = sources.len(), "key manager running");

		if sources.is_empty() {
			self.inner.readiness.resolve(ReadinessState::Ready);
		}

		for registered in sources {
			loops.spawn(self.clone().refresh_loop(registered, barrier.clone(), cancel.clone()));
		}

		let result = loop {
			tokio::select! {
				_ = cancel.cancelled() => break Ok(()),
				joined = loops.join_next() => match joined {
					None => {
						cancel.cancelled().await;

						break Ok(());
					},
					Some(Ok(Ok(()) | Err(Error::Cancelled))) => continue,
					Some(Ok(Err(err))) => break Err(err),
					Some(Err(err)) =>
						break Err(Error::ManagerFailed(format!("Refresh loop aborted: {err}."))),
				},
			}
		};

		cancel.cancel();
		loops.shutdown().await;

		let reason = match &result {
			Ok(()) => "Manager was cancelled.".to_owned(),
			Err(err) => err.to_string(),
		};

		if self.inner.readiness.resolve(ReadinessState::Failed(reason)) {
			tracing::warn!("key manager stopped before every source loaded");
		}
		if let Err(err) = &result {
			tracing::error!(error = %err, "key manager stopped");
		}

		result
	}

	async fn refresh_loop(
		self,
		registered: RegisteredSource,
		barrier: Arc<LoadBarrier>,
		cancel: CancellationToken,
	) -> Result<()> {
		let RegisteredSource { source, metrics: stats } = registered;
		let policy = &self.inner.policy;
		let mut phase = RefreshPhase::default();
		let mut delay = Duration::ZERO;

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				_ = time::sleep(delay) => {},
			}

			let started = Instant::now();
			let outcome = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				outcome = source.refresh() => outcome,
			};

			match outcome {
				Ok(next) => {
					let elapsed = started.elapsed();

					stats.record_refresh_success(elapsed);
					metrics::record_refresh_success(source.name(), elapsed);
					self.merge_keys();

					if phase.succeed() {
						tracing::info!(source = source.name(), "initial key load complete");

						if barrier.arrive() {
							tracing::info!("every key source has loaded");
							self.inner.readiness.resolve(ReadinessState::Ready);
						}
					}

					delay = next;
				},
				Err(err) => {
					stats.record_refresh_error();
					metrics::record_refresh_error(source.name());

					match phase.fail(policy) {
						FailureAction::Retry(retry) => {
							tracing::error!(
								source = source.name(),
								failures = phase.failures(),
								error = %err,
								"key source refresh failed"
							);

							delay = retry;
						},
						FailureAction::GiveUp => {
							tracing::error!(
								source = source.name(),
								failures = phase.failures(),
								error = %err,
								"key source never loaded; giving up"
							);

							return Err(err);
						},
					}
				},
			}
		}
	}

	/// Rebuild the published snapshot from every source's current keys.
	///
	/// Keys are concatenated in registration order. On serialization failure the previous snapshot
	/// stays published.
	pub fn merge_keys(&self) {
		let _merging = self.inner.merge_lock.lock();
		let keys = self
			.inner
			.sources
			.read()
			.iter()
			.flat_map(|registered| registered.source.keys().keys.clone())
			.collect::<Vec<_>>();
		let count = keys.len();

		match PublishedKeys::build(keys) {
			Ok(published) => {
				*self.inner.published.write() = Arc::new(published);

				metrics::record_merge(count);
				tracing::debug!(keys = count, "published merged key set");
			},
			Err(err) => {
				tracing::error!(error = %err, "failed to serialize merged key set; keeping previous")
			},
		}
	}

	/// Serialized discovery document from the last merge; `{"keys":[]}` before the first.
	pub fn jwks(&self) -> Bytes {
		self.inner.published.read().document.clone()
	}

	/// Merged key set from the last merge.
	pub fn merged_keys(&self) -> Arc<JwkSet> {
		self.inner.published.read().keys.clone()
	}

	/// When the published snapshot was last replaced.
	pub fn merged_at(&self) -> Option<DateTime<Utc>> {
		self.inner.published.read().merged_at
	}

	/// Every key with id `kid` across all sources.
	///
	/// Identical duplicates collapse to one key. Keys sharing the id but differing in algorithm or
	/// material yield [`Error::KeyConflict`].
	pub fn get_keys(&self, kid: &str) -> Result<Vec<Jwk>> {
		let mut candidates = Vec::new();

		for registered in self.inner.sources.read().iter() {
			let keys = registered.source.keys();

			candidates.extend(
				keys.keys.iter().filter(|key| key.common.key_id.as_deref() == Some(kid)).cloned(),
			);
		}

		if let Some((first, rest)) = candidates.split_first()
			&& rest.iter().any(|key| !security::keys_match(first, key))
		{
			return Err(Error::KeyConflict { kid: kid.to_owned() });
		}

		candidates.truncate(1);

		Ok(candidates)
	}

	/// Wait until every source has loaded once.
	///
	/// Fails with [`Error::ManagerFailed`] if the manager stopped first, or [`Error::Cancelled`]
	/// if `cancel` fires.
	pub async fn wait_for_keys(&self, cancel: &CancellationToken) -> Result<()> {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(Error::Cancelled),
			result = self.inner.readiness.wait() => result,
		}
	}

	/// Current readiness.
	pub fn readiness(&self) -> ReadinessState {
		self.inner.readiness.state()
	}

	/// Per-source key ids and refresh counters, in registration order.
	pub fn key_summary(&self) -> Vec<KeySummary> {
		self.inner
			.sources
			.read()
			.iter()
			.map(|registered| KeySummary {
				source: registered.source.name().to_owned(),
				keys: source::sorted_key_ids(&registered.source.keys()),
				refresh: registered.metrics.snapshot(),
			})
			.collect()
	}
}

/// Diagnostic view of one source.
#[derive(Clone, Debug, Serialize)]
pub struct KeySummary {
	/// Source name.
	pub source: String,
	/// Sorted key ids currently held by the source.
	pub keys: Vec<String>,
	/// Refresh counters.
	pub refresh: SourceMetricsSnapshot,
}

#[derive(Debug)]
struct Inner {
	policy: RefreshPolicy,
	client: Client,
	sources: RwLock<Vec<RegisteredSource>>,
	published: RwLock<Arc<PublishedKeys>>,
	merge_lock: Mutex<()>,
	readiness: Readiness,
	running: AtomicBool,
}

#[derive(Clone, Debug)]
struct RegisteredSource {
	source: Arc<dyn KeySource>,
	metrics: Arc<SourceMetrics>,
}

#[derive(Debug)]
struct PublishedKeys {
	keys: Arc<JwkSet>,
	document: Bytes,
	merged_at: Option<DateTime<Utc>>,
}
impl PublishedKeys {
	fn empty() -> Self {
		Self {
			keys: Arc::new(source::empty_set()),
			document: Bytes::from_static(EMPTY_DOCUMENT),
			merged_at: None,
		}
	}

	fn build(keys: Vec<Jwk>) -> Result<Self> {
		let keys = JwkSet { keys };
		let document = Bytes::from(serde_json::to_vec(&keys)?);

		Ok(Self { keys: Arc::new(keys), document, merged_at: Some(Utc::now()) })
	}
}

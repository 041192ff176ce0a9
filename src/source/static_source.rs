// crates.io
use async_trait::async_trait;
// self
use crate::{_prelude::*, config::STATIC_REFRESH_INTERVAL, source::KeySource};

/// Fixed key set; refreshing is a no-op.
#[derive(Clone, Debug)]
pub struct StaticKeySource {
	keys: Arc<JwkSet>,
}
impl StaticKeySource {
	/// Wrap `keys` as a source.
	pub fn new(keys: impl IntoIterator<Item = Jwk>) -> Self {
		Self { keys: Arc::new(JwkSet { keys: keys.into_iter().collect() }) }
	}
}
#[async_trait]
impl KeySource for StaticKeySource {
	async fn refresh(&self) -> Result<Duration> {
		Ok(STATIC_REFRESH_INTERVAL)
	}

	fn keys(&self) -> Arc<JwkSet> {
		self.keys.clone()
	}

	fn name(&self) -> &str {
		"static"
	}
}

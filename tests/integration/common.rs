// std
use std::time::Duration;
// crates.io
use jsonwebtoken::{
	Algorithm, Header,
	jwk::{Jwk, JwkSet},
};
use jwks_mesh::{KeyManager, PrivateSigningKey, RefreshPolicy};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub const JWKS_PATH: &str = "/.well-known/jwks.json";

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

/// Policy with millisecond retry and poll intervals.
pub fn fast_policy(warmup_error_budget: u32) -> RefreshPolicy {
	RefreshPolicy {
		warmup_error_budget,
		retry_interval: Duration::from_millis(10),
		default_interval: Duration::from_millis(10),
		..Default::default()
	}
}

pub fn manager(policy: RefreshPolicy) -> KeyManager {
	KeyManager::builder().policy(policy).build().expect("manager")
}

pub fn signing_key(kid: &str, seed: u8) -> PrivateSigningKey {
	PrivateSigningKey::from_seed(kid, [seed; 32])
}

pub fn public_jwk(kid: &str, seed: u8) -> Jwk {
	signing_key(kid, seed).public_jwk().expect("jwk")
}

pub fn jwks_body(keys: Vec<Jwk>) -> String {
	serde_json::to_string(&JwkSet { keys }).expect("jwks body")
}

pub fn sign(key: &PrivateSigningKey, claims: &Value) -> String {
	let mut header = Header::new(Algorithm::EdDSA);

	header.kid = Some(key.kid().to_owned());

	jsonwebtoken::encode(&header, claims, &key.encoding_key()).expect("token")
}

pub fn key_ids(jwks: &JwkSet) -> Vec<String> {
	jwks.keys.iter().map(|key| key.common.key_id.clone().unwrap_or_default()).collect()
}

/// Spawn `run` and wait (bounded) for readiness.
pub async fn start(
	manager: &KeyManager,
) -> (CancellationToken, tokio::task::JoinHandle<jwks_mesh::Result<()>>) {
	let cancel = CancellationToken::new();
	let handle = tokio::spawn({
		let manager = manager.clone();
		let cancel = cancel.clone();

		async move { manager.run(cancel).await }
	});

	tokio::time::timeout(Duration::from_secs(5), manager.wait_for_keys(&CancellationToken::new()))
		.await
		.expect("ready in time")
		.expect("ready");

	(cancel, handle)
}

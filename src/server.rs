//! Discovery endpoint publishing the merged key set.

// std
use std::net::SocketAddr;
// crates.io
use axum::{Router, extract::State, response::IntoResponse, routing::get};
use http::{HeaderValue, header::CONTENT_TYPE};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
// self
#[cfg(feature = "prometheus")] use crate::metrics;
use crate::{_prelude::*, manager::KeyManager};

/// Path of the discovery document.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";
/// Path of the Prometheus scrape endpoint.
#[cfg(feature = "prometheus")]
pub const METRICS_PATH: &str = "/metrics";

/// Router serving [`JWKS_PATH`]; every other path is `404`.
///
/// With the `prometheus` feature and an installed exporter, [`METRICS_PATH`] is served as well.
pub fn router(manager: KeyManager) -> Router {
	let router = Router::new().route(JWKS_PATH, get(jwks_document));
	#[cfg(feature = "prometheus")]
	let router = match metrics::prometheus_handle() {
		Some(handle) => {
			let handle = handle.clone();

			router.route(METRICS_PATH, get(move || async move { handle.render() }))
		},
		None => router,
	};

	router.with_state(manager)
}

/// Wait until `manager` has loaded every source, then serve on `addr` until `cancel` fires.
pub async fn serve_jwks(
	manager: KeyManager,
	addr: SocketAddr,
	cancel: CancellationToken,
) -> Result<()> {
	manager.wait_for_keys(&cancel).await?;

	let listener = TcpListener::bind(addr).await?;

	serve_listener(manager, listener, cancel).await
}

/// Serve on an already bound listener until `cancel` fires.
pub async fn serve_listener(
	manager: KeyManager,
	listener: TcpListener,
	cancel: CancellationToken,
) -> Result<()> {
	tracing::info!(addr = ?listener.local_addr().ok(), "serving key set at {JWKS_PATH}");

	axum::serve(listener, router(manager))
		.with_graceful_shutdown(async move { cancel.cancelled_owned().await })
		.await?;

	Ok(())
}

async fn jwks_document(State(manager): State<KeyManager>) -> impl IntoResponse {
	([(CONTENT_TYPE, HeaderValue::from_static("application/json"))], manager.jwks())
}

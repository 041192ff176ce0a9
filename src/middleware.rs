//! Tower middleware enforcing bearer-token authentication.
//!
//! [`JwtAuthLayer`] verifies the `Authorization` header of every request. Verified requests reach
//! the inner service with [`VerifiedClaims`] in their extensions and the payload JSON in the
//! `X-Verified-JWT` header. Everything else is answered with `401` and a JSON `{"error": ...}`
//! body without touching the inner service.

// std
use std::{
	future::Future,
	pin::Pin,
	task::{Context, Poll},
};
// crates.io
use axum::{
	Json,
	response::{IntoResponse, Response},
};
use http::{
	HeaderValue, Request,
	header::{HeaderName, WWW_AUTHENTICATE},
};
use serde_json::json;
use tower::{Layer, Service};
// self
use crate::verify::{KeyLookup, VERIFIED_JWT_HEADER, VerifiedClaims, Verifier, VerifyError};

/// Layer wrapping services with [`JwtAuthService`].
#[derive(Clone, Debug)]
pub struct JwtAuthLayer<L> {
	verifier: Verifier<L>,
}
impl<L> JwtAuthLayer<L>
where
	L: KeyLookup,
{
	/// Authenticate requests with `verifier`.
	pub fn new(verifier: Verifier<L>) -> Self {
		Self { verifier }
	}
}
impl<S, L> Layer<S> for JwtAuthLayer<L>
where
	L: Clone,
{
	type Service = JwtAuthService<S, L>;

	fn layer(&self, inner: S) -> Self::Service {
		JwtAuthService { inner, verifier: self.verifier.clone() }
	}
}

/// Service produced by [`JwtAuthLayer`].
#[derive(Clone, Debug)]
pub struct JwtAuthService<S, L> {
	inner: S,
	verifier: Verifier<L>,
}
impl<S, L, B> Service<Request<B>> for JwtAuthService<S, L>
where
	S: Service<Request<B>, Response = Response>,
	S::Future: Send + 'static,
	S::Error: Send + 'static,
	L: KeyLookup,
{
	type Error = S::Error;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
	type Response = Response;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, mut req: Request<B>) -> Self::Future {
		// Never forward a client-supplied copy of the verified header.
		req.headers_mut().remove(VERIFIED_JWT_HEADER);

		match self.verifier.verify_headers(req.headers()) {
			Ok(verified) => {
				attach(&mut req, verified);

				Box::pin(self.inner.call(req))
			},
			Err(err) => Box::pin(async move { Ok(rejection(err)) }),
		}
	}
}

fn attach<B>(req: &mut Request<B>, verified: VerifiedClaims) {
	match HeaderValue::from_str(&verified.raw) {
		Ok(value) => {
			req.headers_mut().insert(HeaderName::from_static(VERIFIED_JWT_HEADER), value);
		},
		Err(err) => tracing::warn!(
			kid = %verified.kid,
			error = %err,
			"verified claims cannot be carried in a header"
		),
	}

	req.extensions_mut().insert(verified);
}

/// Response sent for a rejected request.
pub fn rejection(err: VerifyError) -> Response {
	let mut response = (err.status(), Json(json!({ "error": err.reason() }))).into_response();

	response.headers_mut().insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));

	response
}

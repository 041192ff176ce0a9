//! End-to-end bearer-token verification through the middleware and a running manager.

// crates.io
use axum::{
	Extension, Json, Router,
	body::{Body, to_bytes},
	response::Response,
	routing::get,
};
use http::{Request, StatusCode, header::AUTHORIZATION};
use jwks_mesh::{
	JwtAuthLayer, KeyManager, VerifiedClaims, Verifier,
	verify::{
		INVALID_AUTH_HEADER_MESSAGE, MISSING_AUTH_HEADER_MESSAGE, NO_TRUSTED_KEY_MESSAGE,
		TOKEN_EXPIRED_MESSAGE,
	},
};
use serde_json::{Value, json};
use tower::ServiceExt;
// self
use crate::common;

fn app(manager: KeyManager) -> Router {
	Router::new()
		.route(
			"/whoami",
			get(|Extension(verified): Extension<VerifiedClaims>| async move {
				Json(json!({ "sub": verified.claims.sub, "kid": verified.kid }))
			}),
		)
		.route_layer(JwtAuthLayer::new(Verifier::new(manager)))
}

async fn call(app: &Router, authorization: Option<String>) -> Response {
	let mut request = Request::builder().uri("/whoami");

	if let Some(value) = authorization {
		request = request.header(AUTHORIZATION, value);
	}

	app.clone().oneshot(request.body(Body::empty()).expect("request")).await.expect("response")
}

async fn json_body(response: Response) -> Value {
	let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");

	serde_json::from_slice(&bytes).expect("json")
}

fn now() -> i64 {
	chrono::Utc::now().timestamp()
}

#[tokio::test]
async fn token_signed_by_published_key_is_accepted() {
	common::init_tracing();

	let key = common::signing_key("svc-key", 7);
	let manager = common::manager(common::fast_policy(1));

	manager.add_public_keys([key.public_jwk().expect("jwk")]).expect("keys");

	let (cancel, _handle) = common::start(&manager).await;
	let app = app(manager);
	let token = common::sign(&key, &json!({ "sub": "orders", "exp": now() + 300 }));
	let response = call(&app, Some(format!("Bearer {token}"))).await;

	assert_eq!(response.status(), StatusCode::OK);

	let body = json_body(response).await;

	assert_eq!(body["sub"], "orders");
	assert_eq!(body["kid"], "svc-key");

	cancel.cancel();
}

#[tokio::test]
async fn rejected_requests_carry_stable_reasons() {
	let key = common::signing_key("svc-key", 7);
	let manager = common::manager(common::fast_policy(1));

	manager.add_public_keys([key.public_jwk().expect("jwk")]).expect("keys");

	let (cancel, _handle) = common::start(&manager).await;
	let app = app(manager);
	let expired = common::sign(&key, &json!({ "sub": "orders", "exp": now() - 1 }));
	let stranger = common::sign(
		&common::signing_key("unknown", 8),
		&json!({ "sub": "orders", "exp": now() + 300 }),
	);
	let cases = [
		(None, MISSING_AUTH_HEADER_MESSAGE),
		(Some("Basic abc".to_owned()), INVALID_AUTH_HEADER_MESSAGE),
		(Some(format!("Bearer {expired}")), TOKEN_EXPIRED_MESSAGE),
		(Some(format!("Bearer {stranger}")), NO_TRUSTED_KEY_MESSAGE),
	];

	for (authorization, reason) in cases {
		let response = call(&app, authorization).await;

		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(json_body(response).await["error"], reason);
	}

	cancel.cancel();
}

#[tokio::test]
async fn conflicting_key_ids_are_not_trusted() {
	let key = common::signing_key("shared", 7);
	let manager = common::manager(common::fast_policy(1));

	manager.add_public_keys([key.public_jwk().expect("jwk")]).expect("a");
	manager.add_public_keys([common::public_jwk("shared", 9)]).expect("b");

	let (cancel, _handle) = common::start(&manager).await;
	let app = app(manager);
	let token = common::sign(&key, &json!({ "sub": "orders", "exp": now() + 300 }));
	let response = call(&app, Some(format!("Bearer {token}"))).await;

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(json_body(response).await["error"], NO_TRUSTED_KEY_MESSAGE);

	cancel.cancel();
}

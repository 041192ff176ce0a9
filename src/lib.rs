//! Aggregating JWKS manager and bearer-token verifier for service meshes.
//!
//! Many key sources (static keys, upstream JWKS endpoints) are refreshed independently and merged
//! into one published key set, which is served at `/.well-known/jwks.json` and used to verify
//! inbound bearer tokens.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cli;
pub mod config;
pub mod http;
pub mod keys;
pub mod manager;
pub mod metrics;
pub mod middleware;
pub mod security;
pub mod server;
pub mod source;
pub mod telemetry;
pub mod verify;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use jsonwebtoken::jwk::{Jwk, JwkSet};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	config::{RefreshPolicy, ServeConfig},
	error::{Error, Result},
	keys::PrivateSigningKey,
	manager::{KeyManager, KeyManagerBuilder, KeySummary, ReadinessState},
	middleware::{JwtAuthLayer, JwtAuthService},
	server::{JWKS_PATH, router, serve_jwks},
	source::{HttpKeySource, KeySource, StaticKeySource},
	verify::{KeyLookup, NumericDate, StandardClaims, VerifiedClaims, VerifyError, Verifier},
};

//! Bearer-token verification against a key lookup.
//!
//! Verification is stateless per call: parse the credential, resolve exactly one trusted key by
//! id, check the signature, then require an unexpired `exp`. Nothing about the token is trusted
//! until all of those steps pass.

pub mod error;

pub use error::*;

// crates.io
use base64::prelude::*;
use http::{HeaderMap, header::AUTHORIZATION};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize, Serializer, de::DeserializeOwned};
// self
use crate::{_prelude::*, manager::KeyManager, metrics};

/// Header carrying the verified claims JSON to downstream handlers.
pub const VERIFIED_JWT_HEADER: &str = "x-verified-jwt";

/// Resolves key ids to candidate verification keys.
pub trait KeyLookup: Send + Sync {
	/// Every key known under `kid`.
	fn get_keys(&self, kid: &str) -> Result<Vec<Jwk>>;
}
impl KeyLookup for KeyManager {
	fn get_keys(&self, kid: &str) -> Result<Vec<Jwk>> {
		KeyManager::get_keys(self, kid)
	}
}
impl KeyLookup for JwkSet {
	fn get_keys(&self, kid: &str) -> Result<Vec<Jwk>> {
		Ok(self
			.keys
			.iter()
			.filter(|key| key.common.key_id.as_deref() == Some(kid))
			.cloned()
			.collect())
	}
}
impl<T> KeyLookup for Arc<T>
where
	T: KeyLookup + ?Sized,
{
	fn get_keys(&self, kid: &str) -> Result<Vec<Jwk>> {
		(**self).get_keys(kid)
	}
}

/// `aud` as either a single string or a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
	/// Single audience.
	Single(String),
	/// Several audiences.
	Multiple(Vec<String>),
}
impl Audience {
	/// Whether `audience` is listed.
	pub fn contains(&self, audience: &str) -> bool {
		match self {
			Audience::Single(value) => value == audience,
			Audience::Multiple(values) => values.iter().any(|value| value == audience),
		}
	}
}

/// RFC 7519 `NumericDate`: seconds since the Unix epoch, integral or fractional.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Deserialize)]
#[serde(transparent)]
pub struct NumericDate(f64);
impl NumericDate {
	/// Wrap a count of seconds since the Unix epoch.
	pub fn from_seconds(seconds: f64) -> Self {
		Self(seconds)
	}

	/// Current time with microsecond precision.
	pub fn now() -> Self {
		Self(Utc::now().timestamp_micros() as f64 / 1_000_000.)
	}

	/// Seconds since the Unix epoch.
	pub fn seconds(self) -> f64 {
		self.0
	}

	/// The same instant as a timestamp, truncated to microseconds.
	pub fn to_datetime(self) -> Option<DateTime<Utc>> {
		if !self.0.is_finite() {
			return None;
		}

		DateTime::from_timestamp_micros((self.0 * 1_000_000.).trunc() as i64)
	}
}
impl Serialize for NumericDate {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		// Whole seconds keep their integer form.
		if self.0.fract() == 0. && self.0.abs() < i64::MAX as f64 {
			serializer.serialize_i64(self.0 as i64)
		} else {
			serializer.serialize_f64(self.0)
		}
	}
}

/// Registered JWT claims.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardClaims {
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub iss: Option<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sub: Option<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aud: Option<Audience>,
	/// Expiry.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exp: Option<NumericDate>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nbf: Option<NumericDate>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub iat: Option<NumericDate>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jti: Option<String>,
}
impl StandardClaims {
	/// Expiry as a timestamp.
	pub fn expires_at(&self) -> Option<DateTime<Utc>> {
		self.exp.and_then(NumericDate::to_datetime)
	}
}

/// Claims of a token that passed verification.
#[derive(Clone, Debug)]
pub struct VerifiedClaims {
	/// Key id that verified the signature.
	pub kid: String,
	/// Signature algorithm.
	pub algorithm: Algorithm,
	/// Registered claims.
	pub claims: StandardClaims,
	/// Verified payload JSON exactly as signed.
	pub raw: Arc<str>,
}
impl VerifiedClaims {
	/// Deserialize the full payload into a caller-defined claims type.
	pub fn deserialize<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		Ok(serde_json::from_str(&self.raw)?)
	}
}

/// Verifies bearer tokens against keys resolved through `L`.
#[derive(Clone, Debug)]
pub struct Verifier<L> {
	lookup: L,
	algorithms: Arc<[Algorithm]>,
}
impl<L> Verifier<L>
where
	L: KeyLookup,
{
	/// Verifier accepting `EdDSA` tokens.
	pub fn new(lookup: L) -> Self {
		Self { lookup, algorithms: Arc::from([Algorithm::EdDSA]) }
	}

	/// Replace the accepted signature algorithms.
	pub fn with_algorithms(mut self, algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
		self.algorithms = algorithms.into_iter().collect();

		self
	}

	/// Accepted signature algorithms.
	pub fn algorithms(&self) -> &[Algorithm] {
		&self.algorithms
	}

	/// Verify the `Authorization` header in `headers`.
	pub fn verify_headers(&self, headers: &HeaderMap) -> Result<VerifiedClaims, VerifyError> {
		let outcome = bearer_token(headers).and_then(|token| self.verify_token(token));

		match &outcome {
			Ok(_) => metrics::record_verification("verified"),
			Err(err) => metrics::record_verification(err.label()),
		}

		outcome
	}

	/// Verify a compact-serialized JWT.
	pub fn verify_token(&self, token: &str) -> Result<VerifiedClaims, VerifyError> {
		let header = jsonwebtoken::decode_header(token).map_err(|err| {
			tracing::debug!(error = %err, "unparseable token header");

			VerifyError::MalformedToken
		})?;

		if !self.algorithms.contains(&header.alg) {
			tracing::debug!(alg = ?header.alg, "token algorithm not allowed");

			return Err(VerifyError::MalformedToken);
		}

		let kid = match header.kid {
			Some(kid) if !kid.is_empty() => kid,
			_ => return Err(VerifyError::MalformedToken),
		};
		let keys = self.lookup.get_keys(&kid).map_err(|err| {
			tracing::warn!(kid = %kid, error = %err, "key lookup failed");

			VerifyError::UntrustedKey
		})?;
		let [key] = keys.as_slice() else {
			tracing::debug!(kid = %kid, candidates = keys.len(), "no single trusted key");

			return Err(VerifyError::UntrustedKey);
		};
		let decoding_key = DecodingKey::from_jwk(key).map_err(|err| {
			tracing::warn!(kid = %kid, error = %err, "trusted key is unusable");

			VerifyError::UntrustedKey
		})?;
		let mut validation = Validation::new(header.alg);

		validation.validate_exp = false;
		validation.validate_aud = false;
		validation.required_spec_claims.clear();

		let data = jsonwebtoken::decode::<StandardClaims>(token, &decoding_key, &validation)
			.map_err(|err| match err.kind() {
				ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
					tracing::debug!(kid = %kid, error = %err, "payload is not a claims object");

					VerifyError::MalformedClaims
				},
				_ => {
					tracing::debug!(kid = %kid, error = %err, "signature verification failed");

					VerifyError::InvalidSignature
				},
			})?;
		let raw = payload_json(token).ok_or(VerifyError::MalformedClaims)?;
		let now = NumericDate::now();

		match data.claims.exp {
			Some(exp) if exp > now => {},
			exp => {
				tracing::debug!(kid = %kid, exp = ?exp, now = now.seconds(), "token expired");

				return Err(VerifyError::TokenExpired);
			},
		}

		Ok(VerifiedClaims { kid, algorithm: header.alg, claims: data.claims, raw: raw.into() })
	}
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, VerifyError> {
	let value = headers.get(AUTHORIZATION).ok_or(VerifyError::MissingCredential)?;
	let value = value.to_str().map_err(|_| VerifyError::MalformedCredential)?;
	let (scheme, token) = value.split_once(' ').ok_or(VerifyError::MalformedCredential)?;

	if !scheme.eq_ignore_ascii_case("bearer") {
		return Err(VerifyError::MalformedCredential);
	}

	let token = token.trim();

	if token.is_empty() {
		return Err(VerifyError::MalformedToken);
	}

	Ok(token)
}

fn payload_json(token: &str) -> Option<String> {
	let payload = token.split('.').nth(1)?;
	let bytes = BASE64_URL_SAFE_NO_PAD.decode(payload).ok()?;

	String::from_utf8(bytes).ok()
}

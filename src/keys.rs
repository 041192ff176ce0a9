//! Local Ed25519 signing keys, exchanged as base64-encoded private JWK JSON.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use base64::prelude::*;
use ed25519_dalek::SigningKey;
use jsonwebtoken::EncodingKey;
use serde::{Deserialize, Serialize};
use serde_json::json;
// self
use crate::_prelude::*;

/// Algorithm advertised for generated keys.
pub const SIGNING_ALGORITHM: &str = "EdDSA";
/// Key usage advertised for generated keys.
pub const KEY_USE_SIGNATURE: &str = "sig";

// PKCS#8 v1 wrapper for a raw Ed25519 seed (RFC 8410).
const ED25519_PKCS8_PREFIX: [u8; 16] =
	[0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20];

/// Ed25519 private key with its key id.
#[derive(Clone)]
pub struct PrivateSigningKey {
	kid: String,
	signing_key: SigningKey,
}
impl PrivateSigningKey {
	/// Generate a fresh key with a random 128-bit key id.
	pub fn generate() -> Self {
		let seed: [u8; 32] = rand::random();
		let id: [u8; 16] = rand::random();

		Self::from_seed(BASE64_URL_SAFE_NO_PAD.encode(id), seed)
	}

	/// Build a key from a raw 32-byte seed.
	pub fn from_seed(kid: impl Into<String>, seed: [u8; 32]) -> Self {
		Self { kid: kid.into(), signing_key: SigningKey::from_bytes(&seed) }
	}

	/// Parse the base64(JWK JSON) form produced by [`Self::to_base64`].
	pub fn from_base64(encoded: &str) -> Result<Self> {
		let json = BASE64_STANDARD.decode(encoded.trim()).map_err(|err| Error::Validation {
			field: "private_key",
			reason: format!("Invalid base64: {err}."),
		})?;
		let jwk: PrivateJwk = serde_json::from_slice(&json).map_err(|err| Error::Validation {
			field: "private_key",
			reason: format!("Invalid JWK JSON: {err}."),
		})?;

		if jwk.kty != "OKP" || jwk.crv != "Ed25519" {
			return Err(Error::Validation {
				field: "private_key",
				reason: format!("Unsupported key type {}/{}.", jwk.kty, jwk.crv),
			});
		}
		if jwk.kid.is_empty() {
			return Err(Error::Validation {
				field: "private_key",
				reason: "Key has no key ID.".into(),
			});
		}

		let seed: [u8; 32] = BASE64_URL_SAFE_NO_PAD
			.decode(&jwk.d)
			.ok()
			.and_then(|bytes| bytes.try_into().ok())
			.ok_or_else(|| Error::Validation {
				field: "private_key",
				reason: "Member 'd' must be a base64url 32-byte seed.".into(),
			})?;
		let key = Self::from_seed(jwk.kid, seed);

		if let Some(x) = jwk.x
			&& x != key.public_x()
		{
			return Err(Error::Validation {
				field: "private_key",
				reason: "Member 'x' does not match the private key.".into(),
			});
		}

		Ok(key)
	}

	/// Encode as base64(JWK JSON), including the private member `d`.
	pub fn to_base64(&self) -> Result<String> {
		let jwk = PrivateJwk {
			kty: "OKP".into(),
			crv: "Ed25519".into(),
			kid: self.kid.clone(),
			alg: Some(SIGNING_ALGORITHM.into()),
			key_use: Some(KEY_USE_SIGNATURE.into()),
			x: Some(self.public_x()),
			d: BASE64_URL_SAFE_NO_PAD.encode(self.signing_key.to_bytes()),
		};

		Ok(BASE64_STANDARD.encode(serde_json::to_vec(&jwk)?))
	}

	/// Key id.
	pub fn kid(&self) -> &str {
		&self.kid
	}

	/// Public half as a publishable JWK.
	pub fn public_jwk(&self) -> Result<Jwk> {
		let jwk = serde_json::from_value(json!({
			"kty": "OKP",
			"crv": "Ed25519",
			"x": self.public_x(),
			"kid": self.kid,
			"alg": SIGNING_ALGORITHM,
			"use": KEY_USE_SIGNATURE,
		}))?;

		Ok(jwk)
	}

	/// Signing key for `jsonwebtoken::encode`.
	pub fn encoding_key(&self) -> EncodingKey {
		let mut der = Vec::with_capacity(ED25519_PKCS8_PREFIX.len() + 32);

		der.extend_from_slice(&ED25519_PKCS8_PREFIX);
		der.extend_from_slice(self.signing_key.as_bytes());

		EncodingKey::from_ed_der(&der)
	}

	fn public_x(&self) -> String {
		BASE64_URL_SAFE_NO_PAD.encode(self.signing_key.verifying_key().as_bytes())
	}
}
impl Debug for PrivateSigningKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("PrivateSigningKey").field("kid", &self.kid).finish_non_exhaustive()
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct PrivateJwk {
	kty: String,
	crv: String,
	#[serde(default)]
	kid: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	alg: Option<String>,
	#[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
	key_use: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	x: Option<String>,
	d: String,
}

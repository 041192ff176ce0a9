//! Key admission checks and key-material fingerprints.
//!
//! # Trust Model
//! Only public asymmetric keys are ever published. Two keys that share an id are interchangeable
//! only when their algorithm and RFC 7638 thumbprint also agree; anything else is a conflict that
//! must not be resolved silently.

// crates.io
use jsonwebtoken::{
	DecodingKey,
	jwk::{AlgorithmParameters, EllipticCurve, ThumbprintHash},
};
// self
use crate::_prelude::*;

/// RFC 7638 SHA-256 thumbprint of `key`, base64url encoded.
///
/// `None` when the curve does not belong to the key type, which the thumbprint routine cannot
/// encode.
pub fn thumbprint(key: &Jwk) -> Option<String> {
	let consistent = match &key.algorithm {
		AlgorithmParameters::EllipticCurve(params) => params.curve != EllipticCurve::Ed25519,
		AlgorithmParameters::OctetKeyPair(params) => params.curve == EllipticCurve::Ed25519,
		AlgorithmParameters::RSA(_) | AlgorithmParameters::OctetKey(_) => true,
	};

	consistent.then(|| key.thumbprint(ThumbprintHash::SHA256))
}

/// Whether two keys sharing an id describe the same key.
///
/// Compares id, algorithm, and thumbprint. Keys whose thumbprint cannot be computed never match.
pub fn keys_match(a: &Jwk, b: &Jwk) -> bool {
	if a.common.key_id != b.common.key_id || a.common.key_algorithm != b.common.key_algorithm {
		return false;
	}

	match (thumbprint(a), thumbprint(b)) {
		(Some(a), Some(b)) => a == b,
		_ => false,
	}
}

/// Reject keys that must not be published: missing id, malformed material, or secret material.
///
/// `index` is the key's position in the caller's batch and is carried into the error.
pub fn validate_publishable(index: usize, key: &Jwk) -> Result<()> {
	let kid = match key.common.key_id.as_deref() {
		Some(kid) if !kid.is_empty() => kid,
		_ => return Err(Error::InvalidKey { index, reason: "Key has no key ID.".into() }),
	};

	if let Err(err) = DecodingKey::from_jwk(key) {
		return Err(Error::InvalidKey { index, reason: format!("Key '{kid}' is not valid: {err}.") });
	}
	if matches!(key.algorithm, AlgorithmParameters::OctetKey(_)) {
		return Err(Error::InvalidKey { index, reason: format!("Key '{kid}' is not public.") });
	}

	Ok(())
}

//! Rejection reasons for bearer-token verification.

// crates.io
use http::StatusCode;

/// Returned when the `Authorization` header is absent.
pub const MISSING_AUTH_HEADER_MESSAGE: &str = "missing authorization header";
/// Returned when the `Authorization` header does not use the bearer scheme.
pub const INVALID_AUTH_HEADER_MESSAGE: &str =
	"invalid authorization header, must begin with 'Bearer '";
/// Returned when the bearer credential is not a usable JWT.
pub const INVALID_TOKEN_FORMAT_MESSAGE: &str =
	"invalid token format in authorization header, must be JWT";
/// Returned when no single trusted key matches the token's key id.
pub const NO_TRUSTED_KEY_MESSAGE: &str =
	"A valid JWT was found, however it was not signed by any trusted key";
/// Returned when the signature does not verify.
pub const INVALID_SIGNATURE_MESSAGE: &str = "JWT signature is invalid";
/// Returned when the verified payload is not a valid claims object.
pub const MALFORMED_CLAIMS_MESSAGE: &str = "JWT claims are malformed";
/// Returned when the token is expired or carries no expiry.
pub const TOKEN_EXPIRED_MESSAGE: &str = "JWT is expired";

/// Why a request was not authenticated.
///
/// Every variant maps to `401 Unauthorized` with a stable, client-safe reason. Details of the
/// underlying failure are logged server-side only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
	/// No `Authorization` header.
	#[error("{}", MISSING_AUTH_HEADER_MESSAGE)]
	MissingCredential,
	/// `Authorization` header present but not `Bearer <token>`.
	#[error("{}", INVALID_AUTH_HEADER_MESSAGE)]
	MalformedCredential,
	/// Token header unparseable, disallowed algorithm, or missing key id.
	#[error("{}", INVALID_TOKEN_FORMAT_MESSAGE)]
	MalformedToken,
	/// Key id unknown, ambiguous, or unusable.
	#[error("{}", NO_TRUSTED_KEY_MESSAGE)]
	UntrustedKey,
	/// Signature check failed.
	#[error("{}", INVALID_SIGNATURE_MESSAGE)]
	InvalidSignature,
	/// Payload is not a valid claims object.
	#[error("{}", MALFORMED_CLAIMS_MESSAGE)]
	MalformedClaims,
	/// `exp` is absent or not in the future.
	#[error("{}", TOKEN_EXPIRED_MESSAGE)]
	TokenExpired,
}
impl VerifyError {
	/// Stable message returned to clients.
	pub fn reason(&self) -> &'static str {
		match self {
			VerifyError::MissingCredential => MISSING_AUTH_HEADER_MESSAGE,
			VerifyError::MalformedCredential => INVALID_AUTH_HEADER_MESSAGE,
			VerifyError::MalformedToken => INVALID_TOKEN_FORMAT_MESSAGE,
			VerifyError::UntrustedKey => NO_TRUSTED_KEY_MESSAGE,
			VerifyError::InvalidSignature => INVALID_SIGNATURE_MESSAGE,
			VerifyError::MalformedClaims => MALFORMED_CLAIMS_MESSAGE,
			VerifyError::TokenExpired => TOKEN_EXPIRED_MESSAGE,
		}
	}

	/// Short label used for metrics.
	pub fn label(&self) -> &'static str {
		match self {
			VerifyError::MissingCredential => "missing_credential",
			VerifyError::MalformedCredential => "malformed_credential",
			VerifyError::MalformedToken => "malformed_token",
			VerifyError::UntrustedKey => "untrusted_key",
			VerifyError::InvalidSignature => "invalid_signature",
			VerifyError::MalformedClaims => "malformed_claims",
			VerifyError::TokenExpired => "token_expired",
		}
	}

	/// HTTP status for the rejection.
	pub fn status(&self) -> StatusCode {
		StatusCode::UNAUTHORIZED
	}
}

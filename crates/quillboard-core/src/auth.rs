//! Transport authentication
//!
//! The sync WebSocket carries a JWT credential at connect time. The relay
//! rejects all events from an unauthenticated connection by closing the
//! socket before any join is honored; there is no per-message re-check.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Authenticated identity of one transport connection.
#[derive(Debug, Clone)]
pub struct AuthCtx {
	pub user_id: Box<str>,
	pub name: Box<str>,
	pub avatar_url: Option<Box<str>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
	sub: String,
	name: String,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	avatar: Option<String>,
	exp: u64,
}

/// Verify a connect-time credential and extract the connection identity.
pub fn verify_token(secret: &str, token: &str) -> QbResult<AuthCtx> {
	let key = DecodingKey::from_secret(secret.as_bytes());
	let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))
		.map_err(|_| Error::Unauthorized)?;
	Ok(AuthCtx {
		user_id: data.claims.sub.into(),
		name: data.claims.name.into(),
		avatar_url: data.claims.avatar.map(Into::into),
	})
}

/// Issue a credential. Session issuance proper lives outside the core; this
/// is used by the dev server and tests.
pub fn issue_token(
	secret: &str,
	user_id: &str,
	name: &str,
	avatar_url: Option<&str>,
	ttl_secs: u64,
) -> QbResult<String> {
	let exp = std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs() + ttl_secs;
	let claims = Claims {
		sub: user_id.to_string(),
		name: name.to_string(),
		avatar: avatar_url.map(ToString::to_string),
		exp,
	};
	encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
		.map_err(|e| Error::Internal(format!("token encoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn issue_and_verify_roundtrip() {
		let token =
			issue_token("secret", "alice.example.com", "Alice", Some("https://a/i.png"), 600)
				.unwrap();
		let auth = verify_token("secret", &token).unwrap();
		assert_eq!(&*auth.user_id, "alice.example.com");
		assert_eq!(&*auth.name, "Alice");
		assert_eq!(auth.avatar_url.as_deref(), Some("https://a/i.png"));
	}

	#[test]
	fn wrong_secret_is_unauthorized() {
		let token = issue_token("secret", "alice", "Alice", None, 600).unwrap();
		assert!(matches!(verify_token("other", &token), Err(Error::Unauthorized)));
	}

	#[test]
	fn garbage_token_is_unauthorized() {
		assert!(matches!(verify_token("secret", "not-a-jwt"), Err(Error::Unauthorized)));
	}
}

// vim: ts=4

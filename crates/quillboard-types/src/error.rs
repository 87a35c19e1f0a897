//! Error type shared across the workspace
//!
//! Decode and merge failures are contained where they happen: the offending
//! update is dropped and logged, never surfaced to the end user as a
//! document-corrupting error. The variants here cover the few conditions
//! callers actually branch on.

use axum::{http::StatusCode, response::IntoResponse};

pub type QbResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// Undecodable update payload (wrong element types, out-of-range bytes).
	/// The fragment must be dropped and must not be applied to a replica.
	MalformedUpdate,
	/// Missing or invalid transport credential.
	Unauthorized,
	NotFound,
	Parse,
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::MalformedUpdate => write!(f, "malformed update payload"),
			Error::Unauthorized => write!(f, "unauthorized"),
			Error::NotFound => write!(f, "not found"),
			Error::Parse => write!(f, "parse error"),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		match self {
			Error::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
			Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized").into_response(),
			Error::MalformedUpdate => {
				(StatusCode::BAD_REQUEST, "malformed update").into_response()
			}
			_ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
		}
	}
}

// vim: ts=4

//! Core identifier types

use serde::{Deserialize, Serialize};

/// Replica-local CRDT client identifier.
///
/// Distinguishes one process's edits within a document's causal history.
/// Unique per open connection per document, not globally stable — a
/// reconnect always starts with a freshly generated id.
pub type ClientId = u64;

/// Identity of one transport connection, used by the room multiplexer and
/// presence aggregator for fan-out purposes only. Components referencing a
/// connection by id never mutate its internal state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(pub Box<str>);

impl ConnId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for ConnId {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for ConnId {
	fn from(s: &str) -> Self {
		Self(s.into())
	}
}

impl From<String> for ConnId {
	fn from(s: String) -> Self {
		Self(s.into())
	}
}

// vim: ts=4

//! Wire protocol for the sync WebSocket
//!
//! Each direction exchanges named events carrying JSON-serializable payloads
//! plus one numeric-array field for binary CRDT/awareness payloads:
//!
//! ```json
//! { "event": "update", "documentId": "note:42", "update": [1, 2, 230] }
//! ```
//!
//! Per-connection ordering is preserved by the transport; no global ordering
//! across senders is assumed — document merge commutativity carries
//! correctness instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named event on the sync connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum WireMessage {
	/// Request to attach to a document's session (client → relay).
	#[serde(rename = "join", rename_all = "camelCase")]
	Join { document_id: Box<str> },

	/// Detach from a document, tombstoning awareness (client → relay).
	#[serde(rename = "leave", rename_all = "camelCase")]
	Leave { document_id: Box<str> },

	/// Initial/catch-up full-state snapshot (relay → client).
	#[serde(rename = "sync", rename_all = "camelCase")]
	Sync { document_id: Box<str>, update: Vec<i64> },

	/// Incremental CRDT fragment (bidirectional).
	#[serde(rename = "update", rename_all = "camelCase")]
	Update { document_id: Box<str>, update: Vec<i64> },

	/// Incremental awareness delta (bidirectional).
	#[serde(rename = "awareness", rename_all = "camelCase")]
	Awareness { document_id: Box<str>, update: Vec<i64> },

	/// Generic room membership for non-document channels (client → relay).
	#[serde(rename = "joinRoom")]
	JoinRoom { room: Box<str> },

	#[serde(rename = "leaveRoom")]
	LeaveRoom { room: Box<str> },

	/// Explicit "current page" update for presence (client → relay).
	#[serde(rename = "page")]
	Page { page: Box<str> },

	/// Recomputed global presence snapshot (relay → client).
	#[serde(rename = "presence:update")]
	PresenceUpdate { users: Vec<PresenceUser> },

	/// Domain event fan-out scoped to a room (`task:created`,
	/// `column:updated`, ...). The payload is opaque to the core; the sender
	/// is excluded from the fan-out.
	#[serde(rename = "room:event")]
	RoomEvent { room: Box<str>, name: Box<str>, data: Value },

	/// Keepalive.
	#[serde(rename = "ping")]
	Ping,

	#[serde(rename = "pong")]
	Pong,
}

/// One entry of the global presence snapshot.
///
/// Derived from connection metadata, never stored. A client must treat each
/// received snapshot as fully authoritative and discard prior state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUser {
	pub user_id: Box<str>,
	pub name: Box<str>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub avatar_url: Option<Box<str>>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub current_page: Option<Box<str>>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn update_event_roundtrip() {
		let msg = WireMessage::Update { document_id: "note:1".into(), update: vec![0, 17, 255] };
		let text = serde_json::to_string(&msg).unwrap();
		assert!(text.contains("\"event\":\"update\""));
		assert!(text.contains("\"documentId\":\"note:1\""));
		let back: WireMessage = serde_json::from_str(&text).unwrap();
		assert_eq!(back, msg);
	}

	#[test]
	fn presence_update_tag() {
		let msg = WireMessage::PresenceUpdate {
			users: vec![PresenceUser {
				user_id: "u1".into(),
				name: "Alice".into(),
				avatar_url: None,
				current_page: Some("Dashboard".into()),
			}],
		};
		let text = serde_json::to_string(&msg).unwrap();
		assert!(text.contains("\"event\":\"presence:update\""));
		assert!(text.contains("\"currentPage\":\"Dashboard\""));
		assert!(!text.contains("avatarUrl"));
	}

	#[test]
	fn room_event_payload_is_opaque() {
		let text = r#"{"event":"room:event","room":"board:7","name":"task:moved","data":{"taskId":"t1","column":"done"}}"#;
		let msg: WireMessage = serde_json::from_str(text).unwrap();
		match msg {
			WireMessage::RoomEvent { room, name, data } => {
				assert_eq!(&*room, "board:7");
				assert_eq!(&*name, "task:moved");
				assert_eq!(data.get("column"), Some(&json!("done")));
			}
			other => panic!("unexpected message: {:?}", other),
		}
	}

	#[test]
	fn unknown_event_fails_to_parse() {
		let text = r#"{"event":"definitely-not-a-thing"}"#;
		assert!(serde_json::from_str::<WireMessage>(text).is_err());
	}
}

// vim: ts=4

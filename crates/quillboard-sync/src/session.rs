//! Session Provider
//!
//! Binds one document replica and one awareness table to one transport
//! connection for the lifetime of an editing session on one document, and
//! enforces the join/leave protocol:
//!
//! ```text
//! Joining -> Syncing -> Synced -> Closed
//! ```
//!
//! There is no error state distinct from `Closed` — failures during
//! join/sync are logged and the session remains `Joining` until retried or
//! explicitly closed. Local mutations produced before `Synced` are queued
//! and flushed once the first snapshot applies; ordering relative to the
//! snapshot cannot corrupt state because merge is commutative, but the
//! pre-sync edits must never be dropped.
//!
//! Reconnection after a transport drop must discard this provider entirely
//! and open a new one — the fresh replica then carries a fresh client id.

use serde_json::Value;
use tokio::sync::mpsc;
use yrs::TransactionMut;

use quillboard_types::protocol::WireMessage;

use crate::awareness::AwarenessTable;
use crate::codec;
use crate::prelude::*;
use crate::replica::DocReplica;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Joining,
	Syncing,
	Synced,
	Closed,
}

/// One-time notification that the first snapshot applied.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionNotice {
	Ready,
}

pub struct SessionProvider {
	doc_id: Box<str>,
	state: SessionState,
	replica: DocReplica,
	awareness: AwarenessTable,
	outbound: mpsc::UnboundedSender<WireMessage>,
	/// Local fragments produced before the session reached `Synced`.
	pending: Vec<Vec<u8>>,
	ready_sent: bool,
}

impl SessionProvider {
	/// Open an editing session: emits the join request and starts in
	/// `Joining`. Local mutations are accepted immediately but queued until
	/// the initial snapshot applies.
	pub fn open(doc_id: impl Into<Box<str>>, outbound: mpsc::UnboundedSender<WireMessage>) -> Self {
		let doc_id = doc_id.into();
		let replica = DocReplica::new(doc_id.clone());
		let awareness = AwarenessTable::new(replica.client_id());
		let session = Self {
			doc_id: doc_id.clone(),
			state: SessionState::Joining,
			replica,
			awareness,
			outbound,
			pending: Vec::new(),
			ready_sent: false,
		};
		session.send(WireMessage::Join { document_id: doc_id });
		session
	}

	pub fn doc_id(&self) -> &str {
		&self.doc_id
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn is_synced(&self) -> bool {
		self.state == SessionState::Synced
	}

	pub fn replica(&self) -> &DocReplica {
		&self.replica
	}

	pub fn awareness(&self) -> &AwarenessTable {
		&self.awareness
	}

	/// Mutate the document under local authorship. Forwarded immediately
	/// once synced — no batching or debounce — to minimize convergence
	/// latency; queued otherwise.
	pub fn apply_local<F>(&mut self, mutator: F)
	where
		F: FnOnce(&mut TransactionMut<'_>),
	{
		if self.state == SessionState::Closed {
			debug!("Local mutation on closed session ignored: {}", self.doc_id);
			return;
		}
		let Some(fragment) = self.replica.apply_local(mutator) else { return };
		if self.is_synced() {
			self.send_update(fragment);
		} else {
			self.pending.push(fragment);
		}
	}

	/// Update a named field of the local awareness entry and forward the
	/// delta.
	pub fn set_awareness(&mut self, field: &str, value: Value) {
		if self.state == SessionState::Closed {
			return;
		}
		let delta = self.awareness.set_local_state(field, value);
		self.send(WireMessage::Awareness {
			document_id: self.doc_id.clone(),
			update: codec::encode_update(&delta),
		});
	}

	/// Apply one inbound wire event addressed to this session.
	///
	/// Events for other documents, or arriving after close, are ignored
	/// silently — an expected race during teardown, not a bug condition.
	pub fn handle_inbound(&mut self, msg: &WireMessage) -> Option<SessionNotice> {
		if self.state == SessionState::Closed {
			return None;
		}
		match msg {
			WireMessage::Sync { document_id, update } if **document_id == *self.doc_id => {
				// A snapshot is just a big update; once synced it merges like
				// any other remote fragment and the state machine stays put.
				// `Synced` is entered exactly once.
				if self.state == SessionState::Synced {
					match codec::decode_update(update)
						.and_then(|bytes| self.replica.apply_remote(&bytes))
					{
						Ok(()) => {}
						Err(e) => warn!("Dropped undecodable snapshot for {}: {}", self.doc_id, e),
					}
					return None;
				}
				self.state = SessionState::Syncing;
				match codec::decode_update(update)
					.and_then(|bytes| self.replica.apply_remote(&bytes))
				{
					Ok(()) => {
						self.state = SessionState::Synced;
						self.flush_pending();
						if !self.ready_sent {
							self.ready_sent = true;
							return Some(SessionNotice::Ready);
						}
					}
					Err(e) => {
						// Stay in Joining until the relay resends or the
						// caller closes.
						warn!("Snapshot for {} not applicable: {}", self.doc_id, e);
						self.state = SessionState::Joining;
					}
				}
				None
			}
			WireMessage::Update { document_id, update } if **document_id == *self.doc_id => {
				match codec::decode_update(update)
					.and_then(|bytes| self.replica.apply_remote(&bytes))
				{
					Ok(()) => {}
					Err(e) => warn!("Dropped undecodable update for {}: {}", self.doc_id, e),
				}
				None
			}
			WireMessage::Awareness { document_id, update } if **document_id == *self.doc_id => {
				match codec::decode_update(update)
					.and_then(|bytes| self.awareness.apply_remote_delta(&bytes))
				{
					Ok(_) => {}
					Err(e) => warn!("Dropped undecodable awareness delta for {}: {}", self.doc_id, e),
				}
				None
			}
			_ => {
				debug!("Event for another session ignored by {}", self.doc_id);
				None
			}
		}
	}

	/// Tear the session down: tombstones this connection's awareness entry,
	/// notifies the relay the document is being left, and drops queued
	/// traffic. Idempotent — both explicit close and connection-level
	/// disconnect may land here.
	pub fn close(&mut self) {
		if self.state == SessionState::Closed {
			return;
		}
		if let Some(tombstone) = self.awareness.remove_states(&[self.awareness.local_id()]) {
			self.send(WireMessage::Awareness {
				document_id: self.doc_id.clone(),
				update: codec::encode_update(&tombstone),
			});
		}
		self.send(WireMessage::Leave { document_id: self.doc_id.clone() });
		self.pending.clear();
		self.state = SessionState::Closed;
	}

	fn flush_pending(&mut self) {
		for fragment in std::mem::take(&mut self.pending) {
			self.send_update(fragment);
		}
	}

	fn send_update(&self, fragment: Vec<u8>) {
		self.send(WireMessage::Update {
			document_id: self.doc_id.clone(),
			update: codec::encode_update(&fragment),
		});
	}

	fn send(&self, msg: WireMessage) {
		if self.outbound.send(msg).is_err() {
			debug!("Transport gone while sending for {}", self.doc_id);
		}
	}
}

impl Drop for SessionProvider {
	fn drop(&mut self) {
		self.close();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use yrs::Text;

	fn channel() -> (mpsc::UnboundedSender<WireMessage>, mpsc::UnboundedReceiver<WireMessage>) {
		mpsc::unbounded_channel()
	}

	fn sync_msg(doc_id: &str, snapshot: &[u8]) -> WireMessage {
		WireMessage::Sync { document_id: doc_id.into(), update: codec::encode_update(snapshot) }
	}

	#[test]
	fn open_emits_join_and_starts_joining() {
		let (tx, mut rx) = channel();
		let session = SessionProvider::open("note:1", tx);
		assert_eq!(session.state(), SessionState::Joining);
		assert_eq!(rx.try_recv().unwrap(), WireMessage::Join { document_id: "note:1".into() });
	}

	#[test]
	fn presync_edits_are_queued_then_flushed() {
		let (tx, mut rx) = channel();
		let mut session = SessionProvider::open("note:1", tx);
		let _join = rx.try_recv().unwrap();

		let text = session.replica().text("content");
		session.apply_local(|txn| text.insert(txn, 0, "early"));
		assert!(rx.try_recv().is_err(), "pre-sync edit must not be forwarded yet");

		let server = DocReplica::new("note:1");
		let notice = session.handle_inbound(&sync_msg("note:1", &server.state_snapshot()));
		assert_eq!(notice, Some(SessionNotice::Ready));
		assert_eq!(session.state(), SessionState::Synced);

		// the queued edit goes out after the snapshot applies
		match rx.try_recv().unwrap() {
			WireMessage::Update { document_id, update } => {
				assert_eq!(&*document_id, "note:1");
				assert!(!update.is_empty());
			}
			other => panic!("expected queued update, got {:?}", other),
		}
	}

	#[test]
	fn ready_fires_exactly_once() {
		let (tx, _rx) = channel();
		let mut session = SessionProvider::open("note:1", tx);
		let server = DocReplica::new("note:1");
		let snapshot = server.state_snapshot();

		assert_eq!(session.handle_inbound(&sync_msg("note:1", &snapshot)), Some(SessionNotice::Ready));
		assert_eq!(session.handle_inbound(&sync_msg("note:1", &snapshot)), None);
		assert_eq!(session.state(), SessionState::Synced);
	}

	#[test]
	fn synced_edits_are_forwarded_immediately() {
		let (tx, mut rx) = channel();
		let mut session = SessionProvider::open("note:1", tx);
		let server = DocReplica::new("note:1");
		session.handle_inbound(&sync_msg("note:1", &server.state_snapshot()));
		while rx.try_recv().is_ok() {}

		let text = session.replica().text("content");
		session.apply_local(|txn| text.insert(txn, 0, "now"));
		assert!(matches!(rx.try_recv().unwrap(), WireMessage::Update { .. }));
	}

	#[test]
	fn events_for_other_documents_are_ignored() {
		let (tx, _rx) = channel();
		let mut session = SessionProvider::open("note:1", tx);
		let other = DocReplica::new("note:2");
		let snapshot = other.state_snapshot();
		assert_eq!(session.handle_inbound(&sync_msg("note:2", &snapshot)), None);
		assert_eq!(session.state(), SessionState::Joining);
	}

	#[test]
	fn malformed_resync_does_not_regress_synced_session() {
		let (tx, mut rx) = channel();
		let mut session = SessionProvider::open("note:1", tx);
		let server = DocReplica::new("note:1");
		session.handle_inbound(&sync_msg("note:1", &server.state_snapshot()));
		assert_eq!(session.state(), SessionState::Synced);
		while rx.try_recv().is_ok() {}

		// an undecodable late snapshot is dropped, not a state transition
		let msg = WireMessage::Sync { document_id: "note:1".into(), update: vec![999] };
		assert_eq!(session.handle_inbound(&msg), None);
		assert_eq!(session.state(), SessionState::Synced);

		// edits keep flowing immediately instead of piling up in the queue
		let text = session.replica().text("content");
		session.apply_local(|txn| text.insert(txn, 0, "still live"));
		assert!(matches!(rx.try_recv().unwrap(), WireMessage::Update { .. }));
	}

	#[test]
	fn late_snapshot_merges_without_second_ready() {
		let (tx, _rx) = channel();
		let mut session = SessionProvider::open("note:1", tx);
		let server = DocReplica::new("note:1");
		session.handle_inbound(&sync_msg("note:1", &server.state_snapshot()));

		let other = DocReplica::new("note:1");
		let text = other.text("content");
		other.apply_local(|txn| text.insert(txn, 0, "catch-up")).unwrap();
		assert_eq!(session.handle_inbound(&sync_msg("note:1", &other.state_snapshot())), None);
		assert_eq!(session.state(), SessionState::Synced);
	}

	#[test]
	fn malformed_snapshot_keeps_session_joining() {
		let (tx, _rx) = channel();
		let mut session = SessionProvider::open("note:1", tx);
		let msg = WireMessage::Sync { document_id: "note:1".into(), update: vec![999] };
		assert_eq!(session.handle_inbound(&msg), None);
		assert_eq!(session.state(), SessionState::Joining);
	}

	#[test]
	fn close_is_idempotent_and_tombstones_awareness() {
		let (tx, mut rx) = channel();
		let mut session = SessionProvider::open("note:1", tx);
		let _join = rx.try_recv().unwrap();
		session.set_awareness("cursor", json!({"x": 10, "y": 20}));
		let _awareness = rx.try_recv().unwrap();

		session.close();
		assert_eq!(session.state(), SessionState::Closed);

		// tombstone first, then leave
		match rx.try_recv().unwrap() {
			WireMessage::Awareness { update, .. } => {
				let bytes = codec::decode_update(&update).unwrap();
				let text = String::from_utf8(bytes).unwrap();
				assert!(text.contains("null"));
			}
			other => panic!("expected tombstone, got {:?}", other),
		}
		assert!(matches!(rx.try_recv().unwrap(), WireMessage::Leave { .. }));

		// entering Closed twice is a no-op
		session.close();
		assert!(rx.try_recv().is_err());
	}

	#[test]
	fn mutations_after_close_are_dropped() {
		let (tx, mut rx) = channel();
		let mut session = SessionProvider::open("note:1", tx);
		session.close();
		while rx.try_recv().is_ok() {}

		let text = session.replica().text("content");
		session.apply_local(|txn| text.insert(txn, 0, "too late"));
		assert!(rx.try_recv().is_err());
	}
}

// vim: ts=4

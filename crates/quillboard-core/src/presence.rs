//! Presence Aggregator
//!
//! Derives the global "who's online, on which page" view from connection
//! metadata and pushes full replacement snapshots — not diffs — to every
//! connected client on each recompute trigger (connect, disconnect, room
//! join/leave, explicit page change).
//!
//! Presence is best-effort, not authoritative: snapshots carry no sequence
//! numbers and a client may transiently see a stale snapshot superseded
//! moments later. Receivers must treat each snapshot as fully authoritative
//! and discard prior state. Nothing here is ever persisted.

use std::collections::{BTreeMap, HashMap};
use tokio::sync::{RwLock, broadcast};

use quillboard_types::protocol::PresenceUser;

use crate::prelude::*;

const SNAPSHOT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
struct ConnEntry {
	user_id: Box<str>,
	name: Box<str>,
	avatar_url: Option<Box<str>>,
	current_page: Option<Box<str>>,
}

/// Recomputes and broadcasts the global presence snapshot.
pub struct PresenceAggregator {
	connections: RwLock<HashMap<ConnId, ConnEntry>>,
	tx: broadcast::Sender<Vec<PresenceUser>>,
}

impl PresenceAggregator {
	pub fn new() -> Self {
		let (tx, _) = broadcast::channel(SNAPSHOT_BUFFER);
		Self { connections: RwLock::new(HashMap::new()), tx }
	}

	/// Subscribe to recomputed snapshots. The snapshot is pushed to all
	/// participants including the one whose action triggered the recompute —
	/// the sender needs the up-to-date view too.
	pub fn subscribe(&self) -> broadcast::Receiver<Vec<PresenceUser>> {
		self.tx.subscribe()
	}

	/// Register a new connection and push a recomputed snapshot.
	pub async fn register(
		&self,
		conn_id: &ConnId,
		user_id: &str,
		name: &str,
		avatar_url: Option<&str>,
	) {
		{
			let mut connections = self.connections.write().await;
			connections.insert(
				conn_id.clone(),
				ConnEntry {
					user_id: user_id.into(),
					name: name.into(),
					avatar_url: avatar_url.map(Into::into),
					current_page: None,
				},
			);
		}
		self.recompute().await;
	}

	/// Drop a terminated connection and push a recomputed snapshot.
	pub async fn unregister(&self, conn_id: &ConnId) {
		let removed = {
			let mut connections = self.connections.write().await;
			connections.remove(conn_id).is_some()
		};
		if removed {
			self.recompute().await;
		}
	}

	/// Record an explicit "current page" update and push a recomputed
	/// snapshot. Unknown connections are ignored (teardown race).
	pub async fn set_page(&self, conn_id: &ConnId, page: &str) {
		let updated = {
			let mut connections = self.connections.write().await;
			match connections.get_mut(conn_id) {
				Some(entry) => {
					entry.current_page = Some(page.into());
					true
				}
				None => false,
			}
		};
		if updated {
			self.recompute().await;
		} else {
			debug!("Page update for unknown connection ignored: {}", conn_id);
		}
	}

	/// Recompute the snapshot and push it to all subscribers. Also invoked
	/// by the connection handler after room join/leave.
	pub async fn recompute(&self) {
		let snapshot = self.snapshot().await;
		// Ignore if no receivers
		let _ = self.tx.send(snapshot);
	}

	/// Build the current snapshot: one entry per online user. When a user
	/// holds several connections, the page of one of them is reported;
	/// which one is unspecified.
	pub async fn snapshot(&self) -> Vec<PresenceUser> {
		let connections = self.connections.read().await;
		let mut users: BTreeMap<Box<str>, PresenceUser> = BTreeMap::new();
		for entry in connections.values() {
			let user = users.entry(entry.user_id.clone()).or_insert_with(|| PresenceUser {
				user_id: entry.user_id.clone(),
				name: entry.name.clone(),
				avatar_url: entry.avatar_url.clone(),
				current_page: None,
			});
			if entry.current_page.is_some() {
				user.current_page = entry.current_page.clone();
			}
		}
		users.into_values().collect()
	}

	pub async fn connection_count(&self) -> usize {
		let connections = self.connections.read().await;
		connections.len()
	}
}

impl Default for PresenceAggregator {
	fn default() -> Self {
		Self::new()
	}
}


// vim: ts=4

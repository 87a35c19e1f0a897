//! Room Multiplexer
//!
//! Maps logical room names (`board:<id>`, `workspace:<id>`, `note:<id>`) to
//! sets of connected participants over per-room broadcast channels. One
//! physical connection can participate in many rooms without cross-talk.
//!
//! Membership contract:
//! - `join` is idempotent per (connection, room) pair — a join already held
//!   is a no-op and hands out no second receiver.
//! - `leave` on a room the connection never joined is a no-op, not an error.
//! - `disconnect` leaves every room the connection held, exactly once,
//!   before the connection is released.
//!
//! Sender exclusion happens on the receiving side: every `RoomEvent` carries
//! the originating connection id and the per-connection forward task skips
//! its own echoes. Rooms are created implicitly on first join and garbage
//! collected when membership reaches zero.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::{RwLock, broadcast};

use crate::prelude::*;

/// A domain event broadcast to the members of one room.
#[derive(Debug, Clone)]
pub struct RoomEvent {
	/// Originating connection, skipped by its own forward task.
	pub sender: ConnId,
	/// Domain event name (`task:created`, `column:updated`, ...).
	pub name: Box<str>,
	/// Opaque domain payload.
	pub data: Value,
}

/// One member of a room, referenced by identity only.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomMember {
	pub conn_id: ConnId,
	pub user_id: Box<str>,
	pub name: Box<str>,
	pub avatar_url: Option<Box<str>>,
}

/// Room multiplexer configuration
#[derive(Clone, Debug)]
pub struct RoomConfig {
	/// Maximum number of events to buffer per room
	pub buffer_size: usize,
	/// Maximum room name length
	pub max_room_name: usize,
	/// Maximum number of rooms
	pub max_rooms: usize,
}

impl Default for RoomConfig {
	fn default() -> Self {
		Self { buffer_size: 128, max_room_name: 256, max_rooms: 10000 }
	}
}

struct RoomState {
	tx: broadcast::Sender<RoomEvent>,
	members: HashMap<ConnId, RoomMember>,
}

/// Tracks room membership and fans out room-scoped events.
pub struct RoomMultiplexer {
	rooms: RwLock<HashMap<Box<str>, RoomState>>,
	/// Per-connection set of currently-joined room names; the source of
	/// truth for join idempotence and disconnect cleanup.
	joined: RwLock<HashMap<ConnId, HashSet<Box<str>>>>,
	config: RoomConfig,
}

impl RoomMultiplexer {
	pub fn new() -> Self {
		Self::with_config(RoomConfig::default())
	}

	pub fn with_config(config: RoomConfig) -> Self {
		Self { rooms: RwLock::new(HashMap::new()), joined: RwLock::new(HashMap::new()), config }
	}

	/// Join a room, creating it if needed.
	///
	/// Returns `Ok(None)` when the connection already holds this room — the
	/// caller keeps its existing receiver and emits no duplicate join side
	/// effects.
	pub async fn join(
		&self,
		member: RoomMember,
		room: &str,
	) -> QbResult<Option<broadcast::Receiver<RoomEvent>>> {
		if room.is_empty() || room.len() > self.config.max_room_name {
			return Err(Error::Parse);
		}

		let mut joined = self.joined.write().await;
		let held = joined.entry(member.conn_id.clone()).or_default();
		if held.contains(room) {
			debug!("Duplicate join ignored: {} / {}", member.conn_id, room);
			return Ok(None);
		}

		let mut rooms = self.rooms.write().await;
		if !rooms.contains_key(room) && rooms.len() >= self.config.max_rooms {
			return Err(Error::Internal(format!("room limit reached ({})", self.config.max_rooms)));
		}

		let state = rooms.entry(room.into()).or_insert_with(|| {
			let (tx, _) = broadcast::channel(self.config.buffer_size);
			RoomState { tx, members: HashMap::new() }
		});
		held.insert(room.into());
		state.members.insert(member.conn_id.clone(), member);

		Ok(Some(state.tx.subscribe()))
	}

	/// Leave a room. Returns `false` (no-op) if the connection was never a
	/// member. Empty rooms are dropped.
	pub async fn leave(&self, conn_id: &ConnId, room: &str) -> bool {
		let mut joined = self.joined.write().await;
		let Some(held) = joined.get_mut(conn_id) else { return false };
		if !held.remove(room) {
			return false;
		}
		if held.is_empty() {
			joined.remove(conn_id);
		}
		drop(joined);

		let mut rooms = self.rooms.write().await;
		if let Some(state) = rooms.get_mut(room) {
			state.members.remove(conn_id);
			if state.members.is_empty() {
				rooms.remove(room);
			}
		}
		true
	}

	/// Leave every room held by a terminating connection, exactly once.
	///
	/// Returns the rooms that were left, so the caller can trigger the
	/// dependent presence recompute.
	pub async fn disconnect(&self, conn_id: &ConnId) -> Vec<Box<str>> {
		let held: Vec<Box<str>> = {
			let mut joined = self.joined.write().await;
			joined.remove(conn_id).map(|set| set.into_iter().collect()).unwrap_or_default()
		};

		let mut rooms = self.rooms.write().await;
		for room in &held {
			if let Some(state) = rooms.get_mut(&**room) {
				state.members.remove(conn_id);
				if state.members.is_empty() {
					rooms.remove(&**room);
				}
			}
		}
		held
	}

	/// Broadcast an event to a room. A missing room is silently ignored —
	/// the last member may have just left.
	pub async fn broadcast(&self, room: &str, event: RoomEvent) {
		let rooms = self.rooms.read().await;
		if let Some(state) = rooms.get(room) {
			// Ignore if no receivers
			let _ = state.tx.send(event);
		}
	}

	pub async fn is_member(&self, conn_id: &ConnId, room: &str) -> bool {
		let joined = self.joined.read().await;
		joined.get(conn_id).is_some_and(|held| held.contains(room))
	}

	pub async fn members(&self, room: &str) -> Vec<RoomMember> {
		let rooms = self.rooms.read().await;
		rooms.get(room).map(|state| state.members.values().cloned().collect()).unwrap_or_default()
	}

	/// Number of rooms a connection currently holds.
	pub async fn membership_count(&self, conn_id: &ConnId) -> usize {
		let joined = self.joined.read().await;
		joined.get(conn_id).map(HashSet::len).unwrap_or(0)
	}

	/// Number of live rooms (empty rooms are garbage collected).
	pub async fn room_count(&self) -> usize {
		let rooms = self.rooms.read().await;
		rooms.len()
	}
}

impl Default for RoomMultiplexer {
	fn default() -> Self {
		Self::new()
	}
}


// vim: ts=4

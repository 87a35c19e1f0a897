//! Awareness State Table
//!
//! Ephemeral per-client state (cursor position, display name, color) keyed
//! by replica-local client id. Not part of the durable CRDT history: entries
//! are replaced wholesale on every update (last write wins per client id),
//! never merged field-by-field, and never persisted.
//!
//! Deltas carry only the changed entries — added/updated records or `null`
//! tombstones — so broadcast cost is O(changed), not O(participants).

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::prelude::*;

/// The wire form of an awareness delta: client id → replaced entry, or
/// `null` for a tombstone.
type Delta = BTreeMap<ClientId, Option<Value>>;

/// Client ids touched by an applied remote delta.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AppliedDelta {
	pub updated: Vec<ClientId>,
	pub removed: Vec<ClientId>,
}

/// Shared table of live awareness entries for one document.
#[derive(Debug)]
pub struct AwarenessTable {
	local_id: ClientId,
	entries: HashMap<ClientId, Value>,
}

impl AwarenessTable {
	pub fn new(local_id: ClientId) -> Self {
		Self { local_id, entries: HashMap::new() }
	}

	pub fn local_id(&self) -> ClientId {
		self.local_id
	}

	pub fn get(&self, client_id: ClientId) -> Option<&Value> {
		self.entries.get(&client_id)
	}

	pub fn contains(&self, client_id: ClientId) -> bool {
		self.entries.contains_key(&client_id)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Update a named field in the local entry, creating the entry on the
	/// first write. Returns the encoded delta limited to the local entry.
	pub fn set_local_state(&mut self, field: &str, value: Value) -> Vec<u8> {
		let entry = self.entries.entry(self.local_id).or_insert_with(|| Value::Object(Map::new()));
		if let Value::Object(record) = entry {
			record.insert(field.to_string(), value);
		} else {
			// Entry was replaced by a non-object remote write; start over.
			let mut record = Map::new();
			record.insert(field.to_string(), value);
			*entry = Value::Object(record);
		}
		encode_delta(&BTreeMap::from([(self.local_id, Some(entry.clone()))]))
	}

	/// Merge a remote delta: each carried entry replaces the previous value
	/// for its client id, `null` removes it.
	pub fn apply_remote_delta(&mut self, update: &[u8]) -> QbResult<AppliedDelta> {
		let delta: Delta = serde_json::from_slice(update).map_err(|_| Error::MalformedUpdate)?;
		let mut applied = AppliedDelta::default();
		for (client_id, entry) in delta {
			match entry {
				Some(value) => {
					self.entries.insert(client_id, value);
					applied.updated.push(client_id);
				}
				None => {
					self.entries.remove(&client_id);
					applied.removed.push(client_id);
				}
			}
		}
		Ok(applied)
	}

	/// Tombstone entries, used on disconnect/leave so stale cursors don't
	/// linger for other participants. Returns the encoded tombstone delta,
	/// or `None` when none of the ids had an entry.
	pub fn remove_states(&mut self, client_ids: &[ClientId]) -> Option<Vec<u8>> {
		let mut delta: Delta = BTreeMap::new();
		for client_id in client_ids {
			if self.entries.remove(client_id).is_some() {
				delta.insert(*client_id, None);
			}
		}
		if delta.is_empty() { None } else { Some(encode_delta(&delta)) }
	}
}

fn encode_delta(delta: &Delta) -> Vec<u8> {
	// Serialization of ClientId -> Option<Value> maps cannot fail
	serde_json::to_vec(delta).unwrap_or_default()
}


// vim: ts=4

//! Shared test fixtures for relay-level sync tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use quillboard_core::{AppOpts, AppState, App};
use quillboard_types::error::QbResult;
use quillboard_types::snapshot_adapter::SnapshotAdapter;

/// In-memory snapshot store, so relay tests need no filesystem.
#[derive(Debug, Default)]
pub struct MemorySnapshotAdapter {
	store: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySnapshotAdapter {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn get(&self, doc_id: &str) -> Option<Vec<u8>> {
		self.store.lock().ok().and_then(|store| store.get(doc_id).cloned())
	}

	pub fn put(&self, doc_id: &str, data: Vec<u8>) {
		if let Ok(mut store) = self.store.lock() {
			store.insert(doc_id.to_string(), data);
		}
	}
}

#[async_trait]
impl SnapshotAdapter for MemorySnapshotAdapter {
	async fn load_snapshot(&self, doc_id: &str) -> QbResult<Option<Vec<u8>>> {
		Ok(self.get(doc_id))
	}

	async fn save_snapshot(&self, doc_id: &str, data: &[u8]) -> QbResult<()> {
		self.put(doc_id, data.to_vec());
		Ok(())
	}
}

pub fn test_app(adapter: Arc<MemorySnapshotAdapter>) -> App {
	AppState::new(
		AppOpts { listen: "127.0.0.1:0".into(), token_secret: "test-secret".into() },
		adapter,
	)
}

// vim: ts=4

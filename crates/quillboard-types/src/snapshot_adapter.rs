//! Snapshot persistence adapter
//!
//! Trait for pluggable backends that persist the latest full-state CRDT
//! snapshot of a document. The relay flushes snapshots opportunistically;
//! durable state lives only behind this trait, while replica and awareness
//! instances are purely in-memory.
//!
//! Adapters work with opaque binary snapshots (Yjs update format) rather
//! than typed documents — how the bytes are reconstructed into a document
//! is the sync engine's concern, not the adapter's.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::QbResult;

/// Snapshot Adapter trait.
///
/// Implementations provide their own constructors handling backend-specific
/// initialization (storage directory, connection settings, etc.).
#[async_trait]
pub trait SnapshotAdapter: Debug + Send + Sync {
	/// Load the latest stored snapshot for a document.
	///
	/// Returns `Ok(None)` if the document has never been persisted — safe to
	/// treat as a new, empty document.
	async fn load_snapshot(&self, doc_id: &str) -> QbResult<Option<Vec<u8>>>;

	/// Persist the latest full-state snapshot for a document, replacing any
	/// previous snapshot. The write must be atomic: a concurrent load must
	/// see either the old or the new snapshot, never a partial one.
	async fn save_snapshot(&self, doc_id: &str, data: &[u8]) -> QbResult<()>;
}

// vim: ts=4

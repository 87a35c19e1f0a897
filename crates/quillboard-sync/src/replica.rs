//! CRDT Document Replica
//!
//! Wraps a `yrs::Doc` as the per-document mutable state holding the merged
//! history of all applied updates. The merge algorithm itself is the
//! supplied primitive with a known black-box contract: commutative,
//! associative, idempotent. This wrapper only adds the local/remote origin
//! split the session layer needs for loop prevention.
//!
//! There is no "missing dependency" failure mode: a well-formed fragment
//! referencing causal history this replica has never seen still merges.

use yrs::updates::decoder::Decode;
use yrs::{Doc, ReadTxn, StateVector, Transact, TransactionMut, Update};

use crate::prelude::*;

/// One process's local copy of a CRDT document plus its causal metadata.
pub struct DocReplica {
	doc_id: Box<str>,
	doc: Doc,
}

impl DocReplica {
	/// Create an empty replica with a freshly generated client id.
	pub fn new(doc_id: impl Into<Box<str>>) -> Self {
		Self { doc_id: doc_id.into(), doc: Doc::new() }
	}

	pub fn doc_id(&self) -> &str {
		&self.doc_id
	}

	/// Replica-local client id distinguishing this process's edits within
	/// the document's causal history. Not globally stable.
	pub fn client_id(&self) -> ClientId {
		self.doc.client_id()
	}

	/// Root text handle. Must be obtained before opening a transaction.
	pub fn text(&self, name: &str) -> yrs::TextRef {
		self.doc.get_or_insert_text(name)
	}

	/// Mutate the replica under local authorship.
	///
	/// Returns the update fragment covering exactly the mutation, or `None`
	/// when the mutator changed nothing. The caller (session provider)
	/// forwards the fragment outward; this replica never re-emits remote
	/// fragments, which is what prevents forwarding loops.
	pub fn apply_local<F>(&self, mutator: F) -> Option<Vec<u8>>
	where
		F: FnOnce(&mut TransactionMut<'_>),
	{
		let before = self.doc.transact().state_vector();
		{
			let mut txn = self.doc.transact_mut();
			mutator(&mut txn);
		}
		let txn = self.doc.transact();
		if txn.state_vector() == before {
			return None;
		}
		Some(txn.encode_state_as_update_v1(&before))
	}

	/// Merge an externally-received update fragment.
	///
	/// Safe to call multiple times with the same fragment and in any order
	/// relative to other fragments.
	pub fn apply_remote(&self, update: &[u8]) -> QbResult<()> {
		let update = Update::decode_v1(update).map_err(|_| Error::MalformedUpdate)?;
		let mut txn = self.doc.transact_mut();
		txn.apply_update(update)
			.map_err(|e| Error::Internal(format!("update merge failed: {}", e)))?;
		Ok(())
	}

	/// Full-state update representing all history to date, used to onboard a
	/// newly joining replica without replaying individual fragments.
	pub fn state_snapshot(&self) -> Vec<u8> {
		self.doc.transact().encode_state_as_update_v1(&StateVector::default())
	}
}

impl std::fmt::Debug for DocReplica {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("DocReplica")
			.field("doc_id", &self.doc_id)
			.field("client_id", &self.doc.client_id())
			.finish()
	}
}


// vim: ts=4

//! Filesystem-backed snapshot storage
//!
//! Stores each document's merged CRDT state as one file under the base
//! directory. Writes go through a temp file followed by a rename, so a crash
//! mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{
	fs::{File, create_dir_all, read, remove_file, rename},
	io::AsyncWriteExt,
};

use quillboard::{prelude::*, snapshot_adapter::SnapshotAdapter, utils::random_id};

/// Calculates the snapshot file path for a document, rejecting ids that
/// would escape the base directory
fn snapshot_file_path(base_dir: &Path, doc_id: &str) -> QbResult<PathBuf> {
	if doc_id.is_empty() || doc_id.contains(['/', '\\']) || doc_id.contains("..") {
		Err(Error::Parse)?
	}
	Ok(PathBuf::from(base_dir).join(format!("{}.ybin", doc_id)))
}

#[derive(Debug)]
pub struct SnapshotAdapterFs {
	base_dir: Box<Path>,
}

impl SnapshotAdapterFs {
	pub async fn new(base_dir: Box<Path>) -> Result<Self, Error> {
		create_dir_all(&base_dir).await?;
		Ok(Self { base_dir })
	}
}

#[async_trait]
impl SnapshotAdapter for SnapshotAdapterFs {
	async fn load_snapshot(&self, doc_id: &str) -> QbResult<Option<Vec<u8>>> {
		let path = snapshot_file_path(&self.base_dir, doc_id)?;
		match read(&path).await {
			Ok(data) => Ok(Some(data)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	async fn save_snapshot(&self, doc_id: &str, data: &[u8]) -> QbResult<()> {
		let path = snapshot_file_path(&self.base_dir, doc_id)?;
		let tmp_path = PathBuf::from(&*self.base_dir).join(format!("tmp-{}", random_id()?));
		debug!("save_snapshot: {:?} ({} bytes)", path, data.len());

		let res = async {
			let mut file = File::create(&tmp_path).await?;
			file.write_all(data).await?;
			file.sync_all().await?;
			rename(&tmp_path, &path).await?;
			Ok::<(), Error>(())
		}
		.await;
		if res.is_err() {
			let _ = remove_file(&tmp_path).await;
		}
		res
	}
}

// vim: ts=4

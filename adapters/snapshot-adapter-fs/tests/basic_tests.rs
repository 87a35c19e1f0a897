//! Basic filesystem snapshot adapter tests

use tempfile::TempDir;

use quillboard::error::Error;
use quillboard::snapshot_adapter::SnapshotAdapter;
use quillboard_snapshot_adapter_fs::SnapshotAdapterFs;

async fn create_test_adapter() -> (SnapshotAdapterFs, TempDir) {
	let tmp = TempDir::new().unwrap();
	let adapter = SnapshotAdapterFs::new(tmp.path().into()).await.unwrap();
	(adapter, tmp)
}

#[tokio::test]
async fn save_then_load_roundtrip() {
	let (adapter, _tmp) = create_test_adapter().await;

	adapter.save_snapshot("note:1", b"snapshot bytes").await.unwrap();
	let loaded = adapter.load_snapshot("note:1").await.unwrap();
	assert_eq!(loaded.as_deref(), Some(&b"snapshot bytes"[..]));
}

#[tokio::test]
async fn missing_snapshot_loads_as_none() {
	let (adapter, _tmp) = create_test_adapter().await;
	assert!(adapter.load_snapshot("never-saved").await.unwrap().is_none());
}

#[tokio::test]
async fn save_replaces_previous_snapshot() {
	let (adapter, _tmp) = create_test_adapter().await;

	adapter.save_snapshot("note:1", b"first").await.unwrap();
	adapter.save_snapshot("note:1", b"second").await.unwrap();
	assert_eq!(adapter.load_snapshot("note:1").await.unwrap().as_deref(), Some(&b"second"[..]));
}

#[tokio::test]
async fn empty_snapshot_is_preserved() {
	let (adapter, _tmp) = create_test_adapter().await;

	adapter.save_snapshot("note:1", b"").await.unwrap();
	assert_eq!(adapter.load_snapshot("note:1").await.unwrap().as_deref(), Some(&b""[..]));
}

#[tokio::test]
async fn path_escaping_doc_ids_are_rejected() {
	let (adapter, _tmp) = create_test_adapter().await;

	for doc_id in ["", "../secrets", "a/b", "a\\b", ".."] {
		assert!(matches!(adapter.save_snapshot(doc_id, b"x").await, Err(Error::Parse)));
		assert!(matches!(adapter.load_snapshot(doc_id).await, Err(Error::Parse)));
	}
}

#[tokio::test]
async fn no_temp_files_left_behind() {
	let (adapter, tmp) = create_test_adapter().await;

	adapter.save_snapshot("note:1", b"data").await.unwrap();
	let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
		.unwrap()
		.filter_map(|entry| entry.ok())
		.filter(|entry| entry.file_name().to_string_lossy().starts_with("tmp-"))
		.collect();
	assert!(leftovers.is_empty());
}

// vim: ts=4

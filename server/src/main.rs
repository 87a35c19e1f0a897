#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{env, path};

use quillboard::AppBuilder;
use quillboard_snapshot_adapter_fs::SnapshotAdapterFs;

pub struct Config {
	pub listen: String,
	pub token_secret: String,
	pub data_dir: path::PathBuf,
}

#[tokio::main]
async fn main() {
	let config = Config {
		listen: env::var("LISTEN").unwrap_or("127.0.0.1:8080".to_string()),
		token_secret: env::var("TOKEN_SECRET").expect("TOKEN_SECRET must be set"),
		data_dir: path::PathBuf::from(env::var("DATA_DIR").unwrap_or("./data".to_string())),
	};

	let snapshot_adapter = std::sync::Arc::new(
		SnapshotAdapterFs::new(config.data_dir.join("snapshots").into()).await.unwrap(),
	);

	let mut builder = AppBuilder::new();
	builder
		.listen(config.listen)
		.token_secret(config.token_secret)
		.snapshot_adapter(snapshot_adapter);
	builder.run().await.unwrap();
}

// vim: ts=4

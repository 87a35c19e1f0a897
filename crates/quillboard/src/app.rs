//! App builder - constructs and runs the Quillboard relay

use std::sync::Arc;

use quillboard_core::app::VERSION;
use quillboard_types::snapshot_adapter::SnapshotAdapter;

use crate::prelude::*;
use crate::routes;
pub use quillboard_core::{App, AppOpts, AppState};

pub struct AppBuilder {
	listen: Box<str>,
	token_secret: Option<Box<str>>,
	snapshot_adapter: Option<Arc<dyn SnapshotAdapter>>,
}

impl AppBuilder {
	pub fn new() -> Self {
		tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.init();
		AppBuilder { listen: "127.0.0.1:8080".into(), token_secret: None, snapshot_adapter: None }
	}

	// Opts
	pub fn listen(&mut self, listen: impl Into<Box<str>>) -> &mut Self {
		self.listen = listen.into();
		self
	}
	pub fn token_secret(&mut self, token_secret: impl Into<Box<str>>) -> &mut Self {
		self.token_secret = Some(token_secret.into());
		self
	}

	// Adapters
	pub fn snapshot_adapter(&mut self, snapshot_adapter: Arc<dyn SnapshotAdapter>) -> &mut Self {
		self.snapshot_adapter = Some(snapshot_adapter);
		self
	}

	pub async fn run(self) -> QbResult<()> {
		info!("Quillboard relay v{}", VERSION);

		let Some(token_secret) = self.token_secret else {
			error!("FATAL: No token secret configured");
			return Err(Error::Internal("No token secret configured".to_string()));
		};
		let Some(snapshot_adapter) = self.snapshot_adapter else {
			error!("FATAL: No snapshot adapter configured");
			return Err(Error::Internal("No snapshot adapter configured".to_string()));
		};

		let app = AppState::new(AppOpts { listen: self.listen, token_secret }, snapshot_adapter);
		let router = routes::init(app.clone());

		let listener = tokio::net::TcpListener::bind(app.opts.listen.as_ref()).await?;
		info!("Listening on {}", app.opts.listen);
		axum::serve(listener, router).await?;

		Ok(())
	}
}

impl Default for AppBuilder {
	fn default() -> Self {
		Self::new()
	}
}

// vim: ts=4

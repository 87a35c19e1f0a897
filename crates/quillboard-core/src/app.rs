//! App state type

use std::sync::Arc;

use quillboard_types::snapshot_adapter::SnapshotAdapter;

use crate::presence::PresenceAggregator;
use crate::rooms::RoomMultiplexer;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug)]
pub struct AppOpts {
	pub listen: Box<str>,
	/// HS256 secret used to verify transport credentials.
	pub token_secret: Box<str>,
}

pub struct AppState {
	pub opts: AppOpts,
	pub rooms: RoomMultiplexer,
	pub presence: PresenceAggregator,
	pub snapshot_adapter: Arc<dyn SnapshotAdapter>,
}

pub type App = Arc<AppState>;

impl AppState {
	pub fn new(opts: AppOpts, snapshot_adapter: Arc<dyn SnapshotAdapter>) -> App {
		Arc::new(AppState {
			opts,
			rooms: RoomMultiplexer::new(),
			presence: PresenceAggregator::new(),
			snapshot_adapter,
		})
	}
}

// vim: ts=4

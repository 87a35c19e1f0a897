use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app::App;
use crate::websocket;

pub fn init(state: App) -> Router {
	Router::new()
		.route("/ws", get(websocket::get_ws_sync))
		.route("/api/health", get(async || "OK\n"))
		.layer(CorsLayer::permissive())
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

// vim: ts=4

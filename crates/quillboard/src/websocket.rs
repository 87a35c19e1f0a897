//! WebSocket upgrade handler
//!
//! Routes sync connections to the relay connection handler:
//! - `/ws?token=<jwt>` - document sync, awareness, rooms and presence

use axum::{
	extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
	extract::{Query, State},
	response::Response,
};
use futures::SinkExt;
use serde::Deserialize;

use quillboard_core::auth;
use quillboard_sync::handle_sync_connection;

use crate::prelude::*;

/// Query parameters for the sync endpoint. Browsers cannot set headers on
/// WebSocket upgrades, so the credential travels as a query parameter.
#[derive(Debug, Deserialize, Default)]
pub struct TokenQuery {
	pub token: Option<String>,
}

/// Helper to close WebSocket with error code
async fn close_with_error(mut socket: WebSocket, code: u16, reason: &'static str) {
	let _ = socket
		.send(Message::Close(Some(CloseFrame { code, reason: reason.into() })))
		.await;
	let _ = socket.close().await;
}

/// Create WebSocket close response for unauthenticated requests
fn ws_close_unauthenticated(ws: WebSocketUpgrade) -> Response {
	ws.on_upgrade(|socket| close_with_error(socket, 4401, "Unauthorized - authentication required"))
}

/// WebSocket upgrade handler for the sync endpoint
///
/// Requires a valid token. The upgrade is accepted either way so the close
/// code reaches the client instead of an opaque failed handshake.
pub async fn get_ws_sync(
	ws: WebSocketUpgrade,
	Query(query): Query<TokenQuery>,
	State(app): State<App>,
) -> Response {
	debug!("WebSocket sync request");

	let Some(token) = query.token else {
		warn!("Sync WebSocket rejected - no token");
		return ws_close_unauthenticated(ws);
	};
	let auth_ctx = match auth::verify_token(&app.opts.token_secret, &token) {
		Ok(auth_ctx) => auth_ctx,
		Err(e) => {
			warn!("Sync WebSocket rejected - invalid token: {}", e);
			return ws_close_unauthenticated(ws);
		}
	};

	debug!("Sync WebSocket authenticated: user_id={}", auth_ctx.user_id);
	ws.on_upgrade(move |socket| handle_sync_connection(socket, auth_ctx, app))
}

// vim: ts=4

//! WebSocket Sync Handler — Collaborative Document Relay
//!
//! One authenticated connection multiplexes any number of document editing
//! sessions and generic rooms. Messages are JSON text frames tagged by
//! `event` (see [`WireMessage`]); binary CRDT/awareness payloads travel as
//! numeric byte arrays inside them.
//!
//! Relay-side session contract per document:
//! - on `join`, exactly one `sync` snapshot onboards the connection; live
//!   fragments follow through the document's broadcast channel,
//! - inbound `update` fragments merge into the relay replica and are fanned
//!   out to every other participant (the sender already has its own edit),
//! - awareness deltas are relayed the same way; the client ids each
//!   connection announces are tracked so they can be tombstoned on leave or
//!   disconnect,
//! - the merged state is flushed to the snapshot adapter opportunistically
//!   after every applied update and when the last participant leaves.
//!
//! Every per-document and per-room forward task is held in an explicit
//! handle registry and aborted on leave and on every teardown path, so a
//! closed session can never observe further events.

use axum::extract::ws::{Message, WebSocket};
use futures::sink::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;

use quillboard_core::auth::AuthCtx;
use quillboard_core::rooms::{RoomEvent, RoomMember};
use quillboard_types::protocol::WireMessage;
use quillboard_types::utils::random_id;

use crate::awareness::AwarenessTable;
use crate::codec;
use crate::prelude::*;
use crate::replica::DocReplica;

/// Capacity of the per-document broadcast channel
const DOC_BUFFER: usize = 256;

/// Events fanned out to the participants of one document.
#[derive(Debug, Clone)]
pub enum DocEvent {
	Update { sender: ConnId, update: Vec<u8> },
	Awareness { sender: ConnId, update: Vec<u8> },
}

/// Relay-side shared state for one open document.
pub struct DocShared {
	doc_id: Box<str>,
	replica: Mutex<DocReplica>,
	/// Shared awareness view, kept so entries can be tombstoned for
	/// connections that vanish without saying goodbye.
	awareness: Mutex<AwarenessTable>,
	/// Participant connections and the awareness client ids each announced.
	participants: Mutex<HashMap<ConnId, HashSet<ClientId>>>,
	tx: broadcast::Sender<DocEvent>,
}

impl DocShared {
	fn new(doc_id: &str, replica: DocReplica) -> Self {
		let (tx, _) = broadcast::channel(DOC_BUFFER);
		Self {
			doc_id: doc_id.into(),
			replica: Mutex::new(replica),
			awareness: Mutex::new(AwarenessTable::new(0)),
			participants: Mutex::new(HashMap::new()),
			tx,
		}
	}
}

/// Everything a joining connection needs: the live event stream and the
/// catch-up snapshot.
pub struct JoinedDoc {
	pub rx: broadcast::Receiver<DocEvent>,
	pub snapshot: Vec<u8>,
}

/// Registry of open documents, scoped to one running relay instance.
pub struct DocHub {
	docs: RwLock<HashMap<Box<str>, Arc<DocShared>>>,
}

impl DocHub {
	pub fn new() -> Self {
		Self { docs: RwLock::new(HashMap::new()) }
	}

	/// Attach a connection to a document, creating the relay replica from
	/// the persisted snapshot on first open.
	///
	/// Registration happens under the registry guard: a concurrent
	/// last-participant leave re-checks emptiness under the write lock, so it
	/// can never drop an entry a joiner has already attached to.
	pub async fn join(&self, app: &App, doc_id: &str, conn_id: &ConnId) -> QbResult<JoinedDoc> {
		{
			let docs = self.docs.read().await;
			if let Some(shared) = docs.get(doc_id) {
				return Ok(Self::attach(shared, conn_id).await);
			}
		}

		let replica = DocReplica::new(doc_id);
		if let Some(bytes) = app.snapshot_adapter.load_snapshot(doc_id).await? {
			if let Err(e) = replica.apply_remote(&bytes) {
				warn!("Stored snapshot for {} not applicable: {}", doc_id, e);
			}
		}
		let mut docs = self.docs.write().await;
		let shared = docs
			.entry(doc_id.into())
			.or_insert_with(|| Arc::new(DocShared::new(doc_id, replica)));
		Ok(Self::attach(shared, conn_id).await)
	}

	/// Subscribe, register and snapshot in one step, while the caller still
	/// holds the registry guard. The receiver is subscribed before the
	/// snapshot is encoded, so an update can appear in both — harmless, merge
	/// is idempotent — but never in neither.
	async fn attach(shared: &Arc<DocShared>, conn_id: &ConnId) -> JoinedDoc {
		let rx = shared.tx.subscribe();
		{
			let mut participants = shared.participants.lock().await;
			participants.entry(conn_id.clone()).or_default();
		}
		let snapshot = {
			let replica = shared.replica.lock().await;
			replica.state_snapshot()
		};
		JoinedDoc { rx, snapshot }
	}

	/// Merge an inbound fragment and fan it out. Returns `Ok(false)` for a
	/// document this connection never joined or already left — an expected
	/// teardown race, ignored by the caller.
	pub async fn apply_update(
		&self,
		app: &App,
		doc_id: &str,
		conn_id: &ConnId,
		update: Vec<u8>,
	) -> QbResult<bool> {
		let Some(shared) = self.get(doc_id).await else { return Ok(false) };
		{
			let participants = shared.participants.lock().await;
			if !participants.contains_key(conn_id) {
				return Ok(false);
			}
		}

		{
			// The save stays under the replica lock: flushes reach the
			// adapter in apply order, so the stored snapshot never regresses.
			let replica = shared.replica.lock().await;
			replica.apply_remote(&update)?;
			let snapshot = replica.state_snapshot();
			if let Err(e) = app.snapshot_adapter.save_snapshot(doc_id, &snapshot).await {
				// Convergence is delayed, not broken; the next flush catches up.
				warn!("Failed to persist snapshot for {}: {}", doc_id, e);
			}
		}

		let _ = shared.tx.send(DocEvent::Update { sender: conn_id.clone(), update });
		Ok(true)
	}

	/// Merge an inbound awareness delta into the shared view and fan it out,
	/// recording which client ids the connection owns for later tombstoning.
	pub async fn apply_awareness(
		&self,
		doc_id: &str,
		conn_id: &ConnId,
		update: Vec<u8>,
	) -> QbResult<bool> {
		let Some(shared) = self.get(doc_id).await else { return Ok(false) };
		{
			let participants = shared.participants.lock().await;
			if !participants.contains_key(conn_id) {
				return Ok(false);
			}
		}

		let applied = {
			let mut awareness = shared.awareness.lock().await;
			awareness.apply_remote_delta(&update)?
		};
		{
			let mut participants = shared.participants.lock().await;
			if let Some(clients) = participants.get_mut(conn_id) {
				clients.extend(applied.updated.iter().copied());
				for client_id in &applied.removed {
					clients.remove(client_id);
				}
			}
		}

		let _ = shared.tx.send(DocEvent::Awareness { sender: conn_id.clone(), update });
		Ok(true)
	}

	/// Detach a connection from a document: tombstone its awareness entries
	/// for the remaining participants, and drop the document (after a final
	/// snapshot flush) when nobody is left. Leaving a document the
	/// connection never joined is a no-op.
	pub async fn leave(&self, app: &App, doc_id: &str, conn_id: &ConnId) -> bool {
		let Some(shared) = self.get(doc_id).await else { return false };

		let (clients, now_empty) = {
			let mut participants = shared.participants.lock().await;
			let Some(clients) = participants.remove(conn_id) else { return false };
			(clients, participants.is_empty())
		};

		if !clients.is_empty() {
			let ids: Vec<ClientId> = clients.into_iter().collect();
			let tombstone = {
				let mut awareness = shared.awareness.lock().await;
				awareness.remove_states(&ids)
			};
			if let Some(update) = tombstone {
				let _ = shared.tx.send(DocEvent::Awareness { sender: conn_id.clone(), update });
			}
		}

		if now_empty {
			{
				let replica = shared.replica.lock().await;
				let snapshot = replica.state_snapshot();
				if let Err(e) = app.snapshot_adapter.save_snapshot(doc_id, &snapshot).await {
					warn!("Failed to persist final snapshot for {}: {}", doc_id, e);
				}
			}

			let mut docs = self.docs.write().await;
			if let Some(current) = docs.get(doc_id) {
				if Arc::ptr_eq(current, &shared) && current.participants.lock().await.is_empty() {
					docs.remove(doc_id);
					debug!("Document released: {}", shared.doc_id);
				}
			}
		}
		true
	}

	pub async fn contains(&self, doc_id: &str) -> bool {
		let docs = self.docs.read().await;
		docs.contains_key(doc_id)
	}

	pub async fn participant_count(&self, doc_id: &str) -> usize {
		match self.get(doc_id).await {
			Some(shared) => shared.participants.lock().await.len(),
			None => 0,
		}
	}

	/// Whether the shared awareness view still holds an entry for a client
	/// id. Used to verify teardown completeness.
	pub async fn awareness_contains(&self, doc_id: &str, client_id: ClientId) -> bool {
		match self.get(doc_id).await {
			Some(shared) => shared.awareness.lock().await.contains(client_id),
			None => false,
		}
	}

	async fn get(&self, doc_id: &str) -> Option<Arc<DocShared>> {
		let docs = self.docs.read().await;
		docs.get(doc_id).cloned()
	}
}

impl Default for DocHub {
	fn default() -> Self {
		Self::new()
	}
}

// Global registry of open documents for this relay instance
static DOCS: LazyLock<DocHub> = LazyLock::new(DocHub::new);

type TaskRegistry = Arc<Mutex<HashMap<Box<str>, JoinHandle<()>>>>;

/// Handle an authenticated sync connection for its whole lifetime.
pub async fn handle_sync_connection(ws: WebSocket, auth: AuthCtx, app: App) {
	let conn_id = ConnId::from(random_id().unwrap_or_default());
	info!("Sync connection: {} (conn={})", auth.user_id, conn_id);

	// Register for presence; this pushes the first recomputed snapshot
	app.presence
		.register(&conn_id, &auth.user_id, &auth.name, auth.avatar_url.as_deref())
		.await;

	// All outbound traffic funnels through one channel with a single writer
	let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WireMessage>();

	let (ws_tx, mut ws_rx) = ws.split();
	let ws_tx: Arc<Mutex<SplitSink<WebSocket, Message>>> = Arc::new(Mutex::new(ws_tx));

	// Heartbeat task - sends ping frames to keep the connection alive
	let ws_tx_heartbeat = ws_tx.clone();
	let heartbeat_task = tokio::spawn(async move {
		let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
		loop {
			interval.tick().await;
			let mut tx = ws_tx_heartbeat.lock().await;
			if tx.send(Message::Ping(vec![].into())).await.is_err() {
				debug!("Client disconnected during heartbeat");
				return;
			}
		}
	});

	// Presence task - forwards recomputed snapshots, including the ones this
	// connection triggered (the sender needs the up-to-date view too)
	let presence_outbound = outbound_tx.clone();
	let mut presence_rx = app.presence.subscribe();
	let presence_task = tokio::spawn(async move {
		loop {
			match presence_rx.recv().await {
				Ok(users) => {
					if presence_outbound.send(WireMessage::PresenceUpdate { users }).is_err() {
						return;
					}
				}
				Err(broadcast::error::RecvError::Lagged(_)) => {
					// A skipped snapshot is superseded by the next one
					continue;
				}
				Err(broadcast::error::RecvError::Closed) => return,
			}
		}
	});

	// Handler registries: forward tasks per document and per room, released
	// on leave and on every teardown path
	let doc_tasks: TaskRegistry = Arc::new(Mutex::new(HashMap::new()));
	let room_tasks: TaskRegistry = Arc::new(Mutex::new(HashMap::new()));

	// Outbound forward task - serializes wire messages to the socket
	let ws_tx_forward = ws_tx.clone();
	let forward_task = tokio::spawn(async move {
		while let Some(msg) = outbound_rx.recv().await {
			let Ok(text) = serde_json::to_string(&msg) else { continue };
			let mut tx = ws_tx_forward.lock().await;
			if tx.send(Message::Text(text.into())).await.is_err() {
				debug!("Client disconnected while forwarding");
				return;
			}
		}
	});

	// WebSocket receive task - dispatches inbound events
	let recv_app = app.clone();
	let recv_auth = auth.clone();
	let recv_conn = conn_id.clone();
	let recv_outbound = outbound_tx.clone();
	let recv_doc_tasks = doc_tasks.clone();
	let recv_room_tasks = room_tasks.clone();
	let ws_recv_task = tokio::spawn(async move {
		while let Some(msg) = ws_rx.next().await {
			match msg {
				Ok(ws_msg) => {
					let msg = match parse_wire_message(&ws_msg) {
						Ok(Some(m)) => m,
						Ok(None) => continue, // control frames
						Err(e) => {
							warn!("Failed to parse sync message: {}", e);
							continue;
						}
					};
					handle_client_event(
						&recv_app,
						&recv_auth,
						&recv_conn,
						msg,
						&recv_outbound,
						&recv_doc_tasks,
						&recv_room_tasks,
					)
					.await;
				}
				Err(e) => {
					warn!("Sync connection error: {}", e);
					break;
				}
			}
		}
	});

	// Wait for either side of the pipe to end
	tokio::select! {
		_ = ws_recv_task => {
			debug!("WebSocket receive task ended");
		}
		_ = forward_task => {
			debug!("Forward task ended");
		}
	}

	// Teardown: unregister every handler before releasing the connection, so
	// no event is handled for resources already logically torn down
	heartbeat_task.abort();
	presence_task.abort();

	{
		let mut tasks = doc_tasks.lock().await;
		for (doc_id, handle) in tasks.drain() {
			handle.abort();
			DOCS.leave(&app, &doc_id, &conn_id).await;
		}
	}
	{
		let mut tasks = room_tasks.lock().await;
		for (_room, handle) in tasks.drain() {
			handle.abort();
		}
	}
	let left = app.rooms.disconnect(&conn_id).await;
	if !left.is_empty() {
		debug!("Connection {} left {} room(s) on disconnect", conn_id, left.len());
	}
	app.presence.unregister(&conn_id).await;

	info!("Sync connection closed: {} (conn={})", auth.user_id, conn_id);
}

/// Parse an inbound frame. Control frames yield `None`; binary frames are
/// not part of this protocol.
fn parse_wire_message(msg: &Message) -> Result<Option<WireMessage>, serde_json::Error> {
	match msg {
		Message::Text(text) => Ok(Some(serde_json::from_str::<WireMessage>(text)?)),
		Message::Close(_) | Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => Ok(None),
	}
}

/// Dispatch one inbound client event.
async fn handle_client_event(
	app: &App,
	auth: &AuthCtx,
	conn_id: &ConnId,
	msg: WireMessage,
	outbound: &mpsc::UnboundedSender<WireMessage>,
	doc_tasks: &TaskRegistry,
	room_tasks: &TaskRegistry,
) {
	match msg {
		WireMessage::Join { document_id } => {
			{
				let tasks = doc_tasks.lock().await;
				if tasks.contains_key(&document_id) {
					debug!("Duplicate document join ignored: {}", document_id);
					return;
				}
			}
			match DOCS.join(app, &document_id, conn_id).await {
				Ok(joined) => {
					// one snapshot onboards the session; live traffic follows
					let _ = outbound.send(WireMessage::Sync {
						document_id: document_id.clone(),
						update: codec::encode_update(&joined.snapshot),
					});
					let handle = spawn_doc_forward(
						document_id.clone(),
						conn_id.clone(),
						joined.rx,
						outbound.clone(),
					);
					doc_tasks.lock().await.insert(document_id, handle);
				}
				Err(e) => {
					// the client session stays in Joining until retried
					warn!("Document join failed for {}: {}", document_id, e);
				}
			}
		}

		WireMessage::Leave { document_id } => {
			let handle = doc_tasks.lock().await.remove(&document_id);
			match handle {
				Some(handle) => {
					handle.abort();
					DOCS.leave(app, &document_id, conn_id).await;
				}
				None => debug!("Leave for unjoined document ignored: {}", document_id),
			}
		}

		WireMessage::Update { document_id, update } => {
			let bytes = match codec::decode_update(&update) {
				Ok(bytes) => bytes,
				Err(e) => {
					warn!("Dropped malformed update for {}: {}", document_id, e);
					return;
				}
			};
			match DOCS.apply_update(app, &document_id, conn_id, bytes).await {
				Ok(true) => {}
				Ok(false) => debug!("Update for unjoined document ignored: {}", document_id),
				Err(e) => warn!("Dropped update for {}: {}", document_id, e),
			}
		}

		WireMessage::Awareness { document_id, update } => {
			let bytes = match codec::decode_update(&update) {
				Ok(bytes) => bytes,
				Err(e) => {
					warn!("Dropped malformed awareness delta for {}: {}", document_id, e);
					return;
				}
			};
			match DOCS.apply_awareness(&document_id, conn_id, bytes).await {
				Ok(true) => {}
				Ok(false) => debug!("Awareness for unjoined document ignored: {}", document_id),
				Err(e) => warn!("Dropped awareness delta for {}: {}", document_id, e),
			}
		}

		WireMessage::JoinRoom { room } => {
			let member = RoomMember {
				conn_id: conn_id.clone(),
				user_id: auth.user_id.clone(),
				name: auth.name.clone(),
				avatar_url: auth.avatar_url.clone(),
			};
			match app.rooms.join(member, &room).await {
				Ok(Some(rx)) => {
					let handle =
						spawn_room_forward(room.clone(), conn_id.clone(), rx, outbound.clone());
					room_tasks.lock().await.insert(room, handle);
					app.presence.recompute().await;
				}
				Ok(None) => {} // idempotent re-join, no side effects
				Err(e) => warn!("Room join failed for {}: {}", room, e),
			}
		}

		WireMessage::LeaveRoom { room } => {
			if app.rooms.leave(conn_id, &room).await {
				if let Some(handle) = room_tasks.lock().await.remove(&room) {
					handle.abort();
				}
				app.presence.recompute().await;
			}
		}

		WireMessage::RoomEvent { room, name, data } => {
			if app.rooms.is_member(conn_id, &room).await {
				app.rooms
					.broadcast(&room, RoomEvent { sender: conn_id.clone(), name, data })
					.await;
			} else {
				debug!("Room event from non-member dropped: {} / {}", conn_id, room);
			}
		}

		WireMessage::Page { page } => {
			app.presence.set_page(conn_id, &page).await;
		}

		WireMessage::Ping => {
			let _ = outbound.send(WireMessage::Pong);
		}

		// relay-to-client events arriving inbound are not ours to handle
		WireMessage::Sync { .. } | WireMessage::PresenceUpdate { .. } | WireMessage::Pong => {}
	}
}

/// Forward one document's live events to a connection, skipping its own
/// echoes (the sender's replica already holds its local edits).
fn spawn_doc_forward(
	document_id: Box<str>,
	conn_id: ConnId,
	mut rx: broadcast::Receiver<DocEvent>,
	outbound: mpsc::UnboundedSender<WireMessage>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		loop {
			match rx.recv().await {
				Ok(event) => {
					let msg = match event {
						DocEvent::Update { sender, update } => {
							if sender == conn_id {
								continue;
							}
							WireMessage::Update {
								document_id: document_id.clone(),
								update: codec::encode_update(&update),
							}
						}
						DocEvent::Awareness { sender, update } => {
							if sender == conn_id {
								continue;
							}
							WireMessage::Awareness {
								document_id: document_id.clone(),
								update: codec::encode_update(&update),
							}
						}
					};
					if outbound.send(msg).is_err() {
						return;
					}
				}
				Err(broadcast::error::RecvError::Lagged(n)) => {
					warn!("Document stream lagged, skipped {} events: {}", n, document_id);
				}
				Err(broadcast::error::RecvError::Closed) => return,
			}
		}
	})
}

/// Forward one room's domain events to a connection, excluding the sender's
/// own action echo.
fn spawn_room_forward(
	room: Box<str>,
	conn_id: ConnId,
	mut rx: broadcast::Receiver<RoomEvent>,
	outbound: mpsc::UnboundedSender<WireMessage>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		loop {
			match rx.recv().await {
				Ok(event) => {
					if event.sender == conn_id {
						continue;
					}
					let msg = WireMessage::RoomEvent {
						room: room.clone(),
						name: event.name,
						data: event.data,
					};
					if outbound.send(msg).is_err() {
						return;
					}
				}
				Err(broadcast::error::RecvError::Lagged(n)) => {
					warn!("Room stream lagged, skipped {} events: {}", n, room);
				}
				Err(broadcast::error::RecvError::Closed) => return,
			}
		}
	})
}

// vim: ts=4

//! Real-time collaborative synchronization for Quillboard.
//!
//! Per-document CRDT merge engine (Yjs via `yrs`), an awareness protocol on
//! the same transport, and the relay-side connection handler that
//! multiplexes any number of document sessions and rooms over one WebSocket.
//!
//! The merge contract this crate preserves exactly: applying the same set of
//! update fragments in any order and with any duplication yields
//! bit-identical document state. No total order is enforced by the
//! transport.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod awareness;
pub mod codec;
mod prelude;
pub mod replica;
pub mod session;
pub mod websocket;

pub use websocket::handle_sync_connection;

// vim: ts=4

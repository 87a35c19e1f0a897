//! Quillboard is a real-time collaboration relay.
//!
//! # Features
//!
//! - Collaborative document editing
//!     - CRDT merge semantics (convergent under reordering and duplication)
//!     - one WebSocket multiplexes any number of document sessions
//!     - awareness (cursors, names, colors) on the same transport
//! - Rooms
//!     - generic domain event fan-out with sender exclusion
//! - Presence
//!     - who is online, on which page, deduplicated per user
//! - Snapshot persistence through a pluggable adapter

// Re-export shared types and adapter traits from quillboard-types
pub use quillboard_types::error;
pub use quillboard_types::protocol;
pub use quillboard_types::snapshot_adapter;
pub use quillboard_types::types;
pub use quillboard_types::utils;

// Feature crate re-exports
pub use quillboard_core::auth;
pub use quillboard_core::presence;
pub use quillboard_core::rooms;
pub use quillboard_sync as sync;

// Local modules
pub mod app;
pub mod prelude;
pub mod routes;
pub mod websocket;

pub use crate::app::AppBuilder;

// vim: ts=4

//! Shared types, wire protocol, and adapter traits for the Quillboard
//! collaboration relay.
//!
//! This crate contains the foundational types shared between the relay
//! crates and adapter implementations. Extracting these into a separate
//! crate allows adapters to compile in parallel with the feature crates.

pub mod error;
pub mod prelude;
pub mod protocol;
pub mod snapshot_adapter;
pub mod types;
pub mod utils;

// vim: ts=4

//! Core infrastructure for the Quillboard relay.
//!
//! Holds the process-wide state scoped to one running relay instance: the
//! room multiplexer and presence aggregator (lifecycle tied to process
//! start/shutdown), plus transport authentication. In a multi-instance
//! deployment these would need an external broadcast fabric to unify
//! membership across instances — out of scope, a single relay is assumed.

pub mod app;
pub mod auth;
pub mod presence;
pub mod prelude;
pub mod rooms;

pub use app::{App, AppOpts, AppState};

// vim: ts=4

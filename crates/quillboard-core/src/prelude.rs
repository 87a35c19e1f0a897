pub use crate::app::App;
pub use quillboard_types::error::{Error, QbResult};
pub use quillboard_types::types::{ClientId, ConnId};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4

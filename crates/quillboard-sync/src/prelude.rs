pub use quillboard_core::app::App;
pub use quillboard_types::error::{Error, QbResult};
pub use quillboard_types::types::{ClientId, ConnId};

pub use tracing::{debug, error, info, warn};

// vim: ts=4

pub use crate::error::{Error, QbResult};
pub use crate::types::{ClientId, ConnId};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4

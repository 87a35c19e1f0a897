//! Update codec
//!
//! Serializes opaque CRDT update fragments and awareness deltas to and from
//! the transport representation: a JSON array of byte values. Lossless and
//! order-preserving for a single fragment; no batching or compression.
//!
//! Out-of-range elements make the whole fragment `MalformedUpdate`; the
//! caller must drop it and must not apply it to a replica. Non-integer
//! elements never reach this module — they already fail JSON parsing of the
//! enclosing wire message.

use crate::prelude::*;

/// Encode raw update bytes into the transport array.
pub fn encode_update(update: &[u8]) -> Vec<i64> {
	update.iter().map(|b| i64::from(*b)).collect()
}

/// Decode a transport array back into raw update bytes.
pub fn decode_update(transport: &[i64]) -> QbResult<Vec<u8>> {
	transport.iter().map(|v| u8::try_from(*v).map_err(|_| Error::MalformedUpdate)).collect()
}


// vim: ts=4

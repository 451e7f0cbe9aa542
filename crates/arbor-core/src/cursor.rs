//! Opaque keyset cursors for stable pagination

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

#[derive(Serialize, Deserialize)]
struct CursorPayload {
    s: String,
    i: String,
}

/// Encode a `(sort_value, id)` pair into an opaque URL-safe cursor.
pub fn encode_cursor(sort_value: &str, id_value: &str) -> String {
    let payload = CursorPayload {
        s: sort_value.to_string(),
        i: id_value.to_string(),
    };
    // A two-field struct with string values cannot fail to serialize.
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    URL_SAFE.encode(json)
}

/// Decode a cursor back into `(sort_value, id)`.
pub fn decode_cursor(cursor: &str) -> Result<(String, String)> {
    let malformed = || GraphError::InvalidInput(format!("malformed cursor: {cursor:?}"));
    let bytes = URL_SAFE.decode(cursor).map_err(|_| malformed())?;
    let payload: CursorPayload = serde_json::from_slice(&bytes).map_err(|_| malformed())?;
    Ok((payload.s, payload.i))
}

//! Read-only guard for queries from untrusted callers

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{GraphError, Result};

static WRITE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(CREATE|SET|DELETE|DETACH|MERGE|REMOVE|DROP|ALTER)\b")
        .expect("write-keyword pattern is valid")
});

/// Reject any query containing a write-classified keyword as a whole word,
/// case-insensitively. Returns the query untouched when it is read-only.
pub fn ensure_read_only(query: &str) -> Result<&str> {
    if WRITE_PATTERN.is_match(query) {
        return Err(GraphError::InvalidInput(
            "write operations are not allowed; this surface is read-only".to_string(),
        ));
    }
    Ok(query)
}

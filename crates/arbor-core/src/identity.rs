//! Canonical node identities: span keys and recursive shape hashes

use sha2::{Digest, Sha256};

/// Deterministic identity of a node inside one file.
///
/// The colon never appears in a UUID, a node type, or a decimal number, so
/// the concatenation is unambiguous.
pub fn span_key(file_uuid: &str, node_type: &str, start_byte: usize, end_byte: usize) -> String {
    format!("{file_uuid}:{node_type}:{start_byte}:{end_byte}")
}

/// Content hash of a subtree: node type, raw source slice, and the ordered
/// shape hashes of the children.
///
/// The framing separators (`T|`, `|S|`, `|C|`) keep differently-structured
/// inputs from colliding: a type ending in `|S` cannot be confused with the
/// slice, and child digests are fixed-width hex.
pub fn shape_hash(node_type: &str, source_slice: &[u8], child_hashes: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"T|");
    hasher.update(node_type.as_bytes());
    hasher.update(b"|S|");
    hasher.update(source_slice);
    for child in child_hashes {
        hasher.update(b"|C|");
        hasher.update(child.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// SHA-256 of a file's content, hex-encoded. Dedup key half of FileRecord.
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

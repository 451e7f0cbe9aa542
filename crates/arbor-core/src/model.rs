//! Core data structures for the AST graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a vertex inside the property graph backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct VertexId(pub i64);

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A row/column position inside a source file, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

/// One node of a parsed concrete syntax tree.
///
/// Every language frontend yields this uniform shape; nothing downstream
/// ever specializes per language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseNode {
    /// The grammar's node type, e.g. `module` or `expression_statement`.
    pub kind: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_point: Point,
    pub end_point: Point,
    /// Ordered children, in source order. Empty for leaves.
    pub children: Vec<ParseNode>,
}

/// Properties of one AstNode vertex, as produced by the tree collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProps {
    pub file_uuid: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
    pub span_key: String,
    pub shape_hash: String,
}

/// A row in the relational `files` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    pub full_path: String,
    pub suffix: String,
    pub content: String,
    pub content_hash: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// MERGE key of a FileVersion vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileVersionKey {
    pub commit_id: String,
    pub file_uuid: Uuid,
    pub path: String,
}

/// Metadata refreshed on every ingest of a FileVersion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersionMeta {
    pub language: String,
    pub timestamp: String,
    pub author: String,
    pub branch: String,
}

/// A PARENT_OF edge to be written, in backend vertex ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentEdge {
    pub parent: VertexId,
    pub child: VertexId,
    pub child_index: usize,
}

/// One OCCURS_IN edge payload: a node's byte span inside a file version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub node: VertexId,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// Summary row for file listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRow {
    pub id: Uuid,
    pub full_path: String,
    pub suffix: String,
    pub content_hash: String,
}

/// Summary row for node listings, ordered by (start_byte, span_key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRow {
    pub span_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// One ordered child of an AstNode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRow {
    pub span_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub child_index: usize,
}

/// Full property row of one AstNode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDetail {
    pub span_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub shape_hash: String,
    pub file_uuid: String,
}

/// Entity and edge counts across the whole graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GraphStatistics {
    pub files: u64,
    pub ast_nodes: u64,
    pub parent_edges: u64,
    pub occurrences: u64,
}

/// A subtree shape occurring in more than one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedShape {
    pub shape_hash: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub file_count: u64,
}

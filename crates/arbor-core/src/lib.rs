//! Arbor Core — AST graph model, ingest pipeline, and storage ports

pub mod collect;
pub mod config;
pub mod cursor;
pub mod error;
pub mod git;
pub mod guard;
pub mod identity;
pub mod ingest;
pub mod languages;
pub mod memory;
pub mod model;
pub mod port;
pub mod query;

#[cfg(test)]
pub mod tests;

pub use collect::{CollectedTree, collect_tree};
pub use config::Config;
pub use cursor::{decode_cursor, encode_cursor};
pub use error::{GraphError, Result};
pub use git::{CommitInfo, GitCli, VersionControl};
pub use guard::ensure_read_only;
pub use identity::{shape_hash, span_key};
pub use ingest::{IngestEngine, IngestOutcome, IngestRequest, TreeParser};
pub use languages::Language;
pub use memory::MemoryBackend;
pub use model::{
    ChildRow, FileRecord, FileRow, FileVersionKey, FileVersionMeta, GraphStatistics, NodeDetail,
    NodeProps, NodeRow, Occurrence, ParentEdge, ParseNode, Point, SharedShape, VertexId,
};
pub use port::{GraphStore, GraphTransaction};

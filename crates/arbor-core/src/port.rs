//! Storage contracts consumed by the ingest orchestrator and the query layer

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    ChildRow, FileRow, FileVersionKey, FileVersionMeta, GraphStatistics, NodeDetail, NodeProps,
    NodeRow, Occurrence, ParentEdge, SharedShape, VertexId,
};

/// Abstract graph storage backend.
///
/// Two implementations exist: the relational+property-graph backend (external
/// to this workspace) and [`crate::memory::MemoryBackend`] for testing. The
/// orchestrator holds this as a trait object and suspends at every call.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Idempotent bootstrap: extension, graph, and guard table. Safe to call
    /// concurrently.
    async fn ensure_ready(&self) -> Result<()>;

    /// Persist a FileRecord for the file at `path`, deduplicated on
    /// `(full_path, content_hash)`. Returns the existing UUID on a dedup hit.
    async fn persist_file(&self, path: &Path) -> Result<Uuid>;

    /// Open the transaction that carries all writes of a single ingest.
    /// Dropping the transaction without committing rolls everything back.
    async fn begin(&self) -> Result<Box<dyn GraphTransaction>>;

    /// Read-only query passthrough for trusted callers. The in-memory
    /// reference backend does not interpret query text and returns no rows.
    async fn run_read_query(&self, query: &str, columns: usize) -> Result<Vec<Vec<String>>>;

    // ── Read projections ────────────────────────────────────

    async fn file_by_id(&self, id: Uuid) -> Result<Option<FileRow>>;

    /// Files ordered by `(full_path, id)`. `after` and `before` are exclusive
    /// keyset bounds; with `before`, the *last* `limit` preceding rows are
    /// returned, still in ascending order.
    async fn list_files_page(
        &self,
        limit: usize,
        after: Option<&(String, String)>,
        before: Option<&(String, String)>,
    ) -> Result<Vec<FileRow>>;

    /// Distinct AstNode types, sorted, optionally restricted to nodes
    /// occurring in the FileVersion at `file_path`.
    async fn node_types(&self, file_path: Option<&str>, limit: usize) -> Result<Vec<String>>;

    /// AstNodes of one type ordered by `(start_byte, span_key)`, with the
    /// same keyset-bound semantics as [`GraphStore::list_files_page`].
    async fn nodes_by_type(
        &self,
        node_type: &str,
        file_path: Option<&str>,
        limit: usize,
        after: Option<&(usize, String)>,
        before: Option<&(usize, String)>,
    ) -> Result<Vec<NodeRow>>;

    /// Children of the node at `span_key`, ordered by child_index. Empty when
    /// the span key is unknown.
    async fn children_of(&self, span_key: &str, limit: usize) -> Result<Vec<ChildRow>>;

    async fn node_detail(&self, span_key: &str) -> Result<Option<NodeDetail>>;

    async fn statistics(&self) -> Result<GraphStatistics>;

    /// FileVersion count per language, descending.
    async fn language_distribution(&self) -> Result<Vec<(String, u64)>>;

    /// AstNode count per type, descending.
    async fn node_type_counts(&self, limit: usize) -> Result<Vec<(String, u64)>>;

    /// Distinct AstNode count per file path, descending.
    async fn file_node_counts(&self, limit: usize) -> Result<Vec<(String, u64)>>;

    /// Shapes whose vertices occur in more than one distinct file.
    async fn shared_shapes(&self, limit: usize) -> Result<Vec<SharedShape>>;

    /// AstNodes occurring in the FileVersion at `file_path` that have no
    /// PARENT_OF predecessor, ordered by start_byte.
    async fn file_root_nodes(
        &self,
        file_path: &str,
        node_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<NodeRow>>;
}

/// Write half of the port: one ingest, one transaction, all-or-nothing.
///
/// The orchestrator chunks bulk inputs before calling; implementations may
/// reorder freely inside one call but must respect call boundaries (vertices
/// exist before edges referencing them).
#[async_trait]
pub trait GraphTransaction: Send {
    /// MERGE the FileVersion vertex on `(commit_id, file_uuid, path)` and
    /// refresh its metadata.
    async fn upsert_file_version(
        &mut self,
        key: &FileVersionKey,
        meta: &FileVersionMeta,
    ) -> Result<VertexId>;

    /// MERGE a NEXT_VERSION edge from the FileVersion matched on
    /// `(prev_commit_id, path)` to `current`. No-op when the previous commit
    /// has no FileVersion.
    async fn link_previous_version(
        &mut self,
        prev_commit_id: &str,
        current: VertexId,
        path: &str,
    ) -> Result<()>;

    /// Resolve span keys to existing vertex ids. Misses are omitted.
    async fn lookup_nodes_by_span(
        &mut self,
        span_keys: &[String],
    ) -> Result<HashMap<String, VertexId>>;

    /// Resolve shape hashes to existing vertex ids. Misses are omitted.
    async fn lookup_nodes_by_shape(
        &mut self,
        shape_hashes: &[String],
    ) -> Result<HashMap<String, VertexId>>;

    /// Create one AstNode vertex per property struct, returning ids in the
    /// same order.
    async fn create_ast_nodes(&mut self, nodes: &[NodeProps]) -> Result<Vec<VertexId>>;

    /// Upsert into the ordering guard table. A conflict on `(parent, child)`
    /// is silently ignored; a conflict on `(parent, child_index)` naming a
    /// different child is fatal. When a `(parent, child)` row is ignored, the
    /// PARENT_OF mirror may still move that edge's child_index; that
    /// divergence is inherited from the reference backend.
    async fn edge_guard_insert(&mut self, edges: &[ParentEdge]) -> Result<()>;

    /// MERGE PARENT_OF edges on `(parent, child)`, setting child_index.
    async fn upsert_parent_edges(&mut self, edges: &[ParentEdge]) -> Result<()>;

    /// MERGE OCCURS_IN edges from each node to `version` with the commit and
    /// file context.
    async fn upsert_occurrences(
        &mut self,
        version: VertexId,
        commit_id: &str,
        file_uuid: Uuid,
        occurrences: &[Occurrence],
    ) -> Result<()>;

    /// Commit all writes. Consumes the transaction.
    async fn commit(self: Box<Self>) -> Result<()>;
}

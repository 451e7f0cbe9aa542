//! In-memory reference backend over a petgraph stable graph
//!
//! Satisfies the same contracts as the relational+property-graph backend and
//! backs the test suite. Vertex ids are the stable petgraph indices; identity
//! lookups go through span/shape/version hash indexes kept next to the graph.
//! Transactions take a whole-state snapshot at begin and restore it on drop
//! unless committed, which gives the all-or-nothing semantics the ingest
//! pipeline requires.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{GraphError, Result};
use crate::identity::content_hash;
use crate::model::{
    ChildRow, FileRecord, FileRow, FileVersionKey, FileVersionMeta, GraphStatistics, NodeDetail,
    NodeProps, NodeRow, Occurrence, ParentEdge, SharedShape, VertexId,
};
use crate::port::{GraphStore, GraphTransaction};

#[derive(Debug, Clone)]
enum Vertex {
    Ast(NodeProps),
    Version {
        key: FileVersionKey,
        meta: FileVersionMeta,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Edge {
    ParentOf {
        child_index: usize,
    },
    OccursIn {
        commit_id: String,
        file_uuid: Uuid,
        start_byte: usize,
        end_byte: usize,
    },
    NextVersion,
}

#[derive(Debug, Clone, Default)]
struct GraphState {
    files: HashMap<Uuid, FileRecord>,
    files_by_path_hash: HashMap<(String, String), Uuid>,
    graph: StableDiGraph<Vertex, Edge>,
    span_index: HashMap<String, VertexId>,
    shape_index: HashMap<String, VertexId>,
    version_index: HashMap<FileVersionKey, VertexId>,
    /// Guard table mirror: PK (parent, child), UNIQUE (parent, child_index).
    guard: BTreeMap<(i64, i64), usize>,
    guard_by_index: HashMap<(i64, usize), i64>,
}

fn node_idx(v: VertexId) -> NodeIndex {
    NodeIndex::new(v.0 as usize)
}

fn vertex_id(i: NodeIndex) -> VertexId {
    VertexId(i.index() as i64)
}

impl GraphState {
    fn ast(&self, idx: NodeIndex) -> Option<&NodeProps> {
        match self.graph.node_weight(idx) {
            Some(Vertex::Ast(props)) => Some(props),
            _ => None,
        }
    }

    /// FileVersion vertices grouped with their path.
    fn versions(&self) -> impl Iterator<Item = (NodeIndex, &FileVersionKey)> {
        self.graph.node_indices().filter_map(|idx| {
            match self.graph.node_weight(idx) {
                Some(Vertex::Version { key, .. }) => Some((idx, key)),
                _ => None,
            }
        })
    }

    /// Indices of all AstNodes occurring in any FileVersion at `path`.
    fn nodes_in_file(&self, path: &str) -> HashSet<NodeIndex> {
        let mut nodes = HashSet::new();
        for (version, key) in self.versions() {
            if key.path != path {
                continue;
            }
            for edge in self.graph.edges_directed(version, Direction::Incoming) {
                if matches!(edge.weight(), Edge::OccursIn { .. }) {
                    nodes.insert(edge.source());
                }
            }
        }
        nodes
    }

    fn node_rows_by_type(&self, node_type: &str, file_path: Option<&str>) -> Vec<NodeRow> {
        let scope = file_path.map(|p| self.nodes_in_file(p));
        let mut rows: Vec<NodeRow> = self
            .graph
            .node_indices()
            .filter(|idx| scope.as_ref().map_or(true, |s| s.contains(idx)))
            .filter_map(|idx| self.ast(idx))
            .filter(|props| props.kind == node_type)
            .map(|props| NodeRow {
                span_key: props.span_key.clone(),
                kind: props.kind.clone(),
                start_byte: props.start_byte,
                end_byte: props.end_byte,
            })
            .collect();
        rows.sort_by(|a, b| {
            (a.start_byte, &a.span_key).cmp(&(b.start_byte, &b.span_key))
        });
        rows
    }
}

/// In-memory [`GraphStore`] implementation.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<GraphState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for MemoryBackend {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn persist_file(&self, path: &Path) -> Result<Uuid> {
        let resolved = path.canonicalize()?;
        let full_path = resolved.to_string_lossy().to_string();
        let name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let suffix = resolved
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let bytes = std::fs::read(&resolved)?;
        let content = String::from_utf8_lossy(&bytes).to_string();
        let hash = content_hash(content.as_bytes());

        let mut state = self.state.lock().await;
        if let Some(&existing) = state.files_by_path_hash.get(&(full_path.clone(), hash.clone())) {
            return Ok(existing);
        }

        let meta = std::fs::metadata(&resolved)?;
        let modified: DateTime<Utc> = meta.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());
        let created: DateTime<Utc> = meta.created().map(DateTime::from).unwrap_or(modified);

        let id = Uuid::new_v4();
        state.files.insert(
            id,
            FileRecord {
                id,
                name,
                full_path: full_path.clone(),
                suffix,
                content,
                content_hash: hash.clone(),
                created,
                last_modified: modified,
            },
        );
        state.files_by_path_hash.insert((full_path, hash), id);
        Ok(id)
    }

    async fn begin(&self) -> Result<Box<dyn GraphTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = (*guard).clone();
        Ok(Box::new(MemoryTransaction {
            state: guard,
            snapshot: Some(snapshot),
            committed: false,
        }))
    }

    async fn run_read_query(&self, _query: &str, _columns: usize) -> Result<Vec<Vec<String>>> {
        // The reference backend stores structured state, not query text.
        Ok(Vec::new())
    }

    async fn file_by_id(&self, id: Uuid) -> Result<Option<FileRow>> {
        let state = self.state.lock().await;
        Ok(state.files.get(&id).map(|r| FileRow {
            id: r.id,
            full_path: r.full_path.clone(),
            suffix: r.suffix.clone(),
            content_hash: r.content_hash.clone(),
        }))
    }

    async fn list_files_page(
        &self,
        limit: usize,
        after: Option<&(String, String)>,
        before: Option<&(String, String)>,
    ) -> Result<Vec<FileRow>> {
        let state = self.state.lock().await;
        let mut rows: Vec<FileRow> = state
            .files
            .values()
            .map(|r| FileRow {
                id: r.id,
                full_path: r.full_path.clone(),
                suffix: r.suffix.clone(),
                content_hash: r.content_hash.clone(),
            })
            .collect();
        rows.sort_by(|a, b| {
            (&a.full_path, a.id.to_string()).cmp(&(&b.full_path, b.id.to_string()))
        });

        if let Some((path, id)) = after {
            rows.retain(|r| {
                let rid = r.id.to_string();
                (r.full_path.as_str(), rid.as_str()) > (path.as_str(), id.as_str())
            });
            rows.truncate(limit);
        } else if let Some((path, id)) = before {
            rows.retain(|r| {
                let rid = r.id.to_string();
                (r.full_path.as_str(), rid.as_str()) < (path.as_str(), id.as_str())
            });
            if rows.len() > limit {
                rows.drain(..rows.len() - limit);
            }
        } else {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn node_types(&self, file_path: Option<&str>, limit: usize) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        let scope = file_path.map(|p| state.nodes_in_file(p));
        let types: BTreeSet<String> = state
            .graph
            .node_indices()
            .filter(|idx| scope.as_ref().map_or(true, |s| s.contains(idx)))
            .filter_map(|idx| state.ast(idx))
            .map(|props| props.kind.clone())
            .collect();
        Ok(types.into_iter().take(limit).collect())
    }

    async fn nodes_by_type(
        &self,
        node_type: &str,
        file_path: Option<&str>,
        limit: usize,
        after: Option<&(usize, String)>,
        before: Option<&(usize, String)>,
    ) -> Result<Vec<NodeRow>> {
        let state = self.state.lock().await;
        let mut rows = state.node_rows_by_type(node_type, file_path);

        if let Some((start, span)) = after {
            rows.retain(|r| (r.start_byte, r.span_key.as_str()) > (*start, span.as_str()));
            rows.truncate(limit);
        } else if let Some((start, span)) = before {
            rows.retain(|r| (r.start_byte, r.span_key.as_str()) < (*start, span.as_str()));
            if rows.len() > limit {
                rows.drain(..rows.len() - limit);
            }
        } else {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn children_of(&self, span_key: &str, limit: usize) -> Result<Vec<ChildRow>> {
        let state = self.state.lock().await;
        let Some(&parent) = state.span_index.get(span_key) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<ChildRow> = state
            .graph
            .edges_directed(node_idx(parent), Direction::Outgoing)
            .filter_map(|edge| match edge.weight() {
                Edge::ParentOf { child_index } => state.ast(edge.target()).map(|props| ChildRow {
                    span_key: props.span_key.clone(),
                    kind: props.kind.clone(),
                    child_index: *child_index,
                }),
                _ => None,
            })
            .collect();
        rows.sort_by_key(|r| r.child_index);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn node_detail(&self, span_key: &str) -> Result<Option<NodeDetail>> {
        let state = self.state.lock().await;
        Ok(state
            .span_index
            .get(span_key)
            .and_then(|&v| state.ast(node_idx(v)))
            .map(|props| NodeDetail {
                span_key: props.span_key.clone(),
                kind: props.kind.clone(),
                start_row: props.start_row,
                start_col: props.start_col,
                end_row: props.end_row,
                end_col: props.end_col,
                start_byte: props.start_byte,
                end_byte: props.end_byte,
                shape_hash: props.shape_hash.clone(),
                file_uuid: props.file_uuid.clone(),
            }))
    }

    async fn statistics(&self) -> Result<GraphStatistics> {
        let state = self.state.lock().await;
        let mut stats = GraphStatistics {
            files: state.files.len() as u64,
            ..Default::default()
        };
        for idx in state.graph.node_indices() {
            if state.ast(idx).is_some() {
                stats.ast_nodes += 1;
            }
        }
        for edge in state.graph.edge_references() {
            match edge.weight() {
                Edge::ParentOf { .. } => stats.parent_edges += 1,
                Edge::OccursIn { .. } => stats.occurrences += 1,
                Edge::NextVersion => {}
            }
        }
        Ok(stats)
    }

    async fn language_distribution(&self) -> Result<Vec<(String, u64)>> {
        let state = self.state.lock().await;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for idx in state.graph.node_indices() {
            if let Some(Vertex::Version { meta, .. }) = state.graph.node_weight(idx) {
                *counts.entry(meta.language.clone()).or_default() += 1;
            }
        }
        let mut rows: Vec<(String, u64)> = counts.into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(rows)
    }

    async fn node_type_counts(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        let state = self.state.lock().await;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for idx in state.graph.node_indices() {
            if let Some(props) = state.ast(idx) {
                *counts.entry(props.kind.clone()).or_default() += 1;
            }
        }
        let mut rows: Vec<(String, u64)> = counts.into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn file_node_counts(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        let state = self.state.lock().await;
        let mut by_path: HashMap<String, HashSet<NodeIndex>> = HashMap::new();
        for (version, key) in state.versions() {
            let nodes = by_path.entry(key.path.clone()).or_default();
            for edge in state.graph.edges_directed(version, Direction::Incoming) {
                if matches!(edge.weight(), Edge::OccursIn { .. }) {
                    nodes.insert(edge.source());
                }
            }
        }
        let mut rows: Vec<(String, u64)> = by_path
            .into_iter()
            .map(|(path, nodes)| (path, nodes.len() as u64))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn shared_shapes(&self, limit: usize) -> Result<Vec<SharedShape>> {
        let state = self.state.lock().await;
        let mut by_shape: HashMap<String, (String, HashSet<Uuid>)> = HashMap::new();
        for edge in state.graph.edge_references() {
            let Edge::OccursIn { file_uuid, .. } = edge.weight() else {
                continue;
            };
            if let Some(props) = state.ast(edge.source()) {
                let entry = by_shape
                    .entry(props.shape_hash.clone())
                    .or_insert_with(|| (props.kind.clone(), HashSet::new()));
                entry.1.insert(*file_uuid);
            }
        }
        let mut rows: Vec<SharedShape> = by_shape
            .into_iter()
            .filter(|(_, (_, files))| files.len() > 1)
            .map(|(shape_hash, (kind, files))| SharedShape {
                shape_hash,
                kind,
                file_count: files.len() as u64,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.file_count
                .cmp(&a.file_count)
                .then_with(|| a.shape_hash.cmp(&b.shape_hash))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn file_root_nodes(
        &self,
        file_path: &str,
        node_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<NodeRow>> {
        let state = self.state.lock().await;
        let mut rows: Vec<NodeRow> = state
            .nodes_in_file(file_path)
            .into_iter()
            .filter(|&idx| {
                !state
                    .graph
                    .edges_directed(idx, Direction::Incoming)
                    .any(|e| matches!(e.weight(), Edge::ParentOf { .. }))
            })
            .filter_map(|idx| state.ast(idx))
            .filter(|props| node_type.map_or(true, |t| props.kind == t))
            .map(|props| NodeRow {
                span_key: props.span_key.clone(),
                kind: props.kind.clone(),
                start_byte: props.start_byte,
                end_byte: props.end_byte,
            })
            .collect();
        rows.sort_by(|a, b| {
            (a.start_byte, &a.span_key).cmp(&(b.start_byte, &b.span_key))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

struct MemoryTransaction {
    state: OwnedMutexGuard<GraphState>,
    snapshot: Option<GraphState>,
    committed: bool,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.committed {
            if let Some(snapshot) = self.snapshot.take() {
                *self.state = snapshot;
            }
        }
    }
}

#[async_trait]
impl GraphTransaction for MemoryTransaction {
    async fn upsert_file_version(
        &mut self,
        key: &FileVersionKey,
        meta: &FileVersionMeta,
    ) -> Result<VertexId> {
        if let Some(&existing) = self.state.version_index.get(key) {
            if let Some(Vertex::Version { meta: stored, .. }) =
                self.state.graph.node_weight_mut(node_idx(existing))
            {
                *stored = meta.clone();
            }
            return Ok(existing);
        }
        let idx = self.state.graph.add_node(Vertex::Version {
            key: key.clone(),
            meta: meta.clone(),
        });
        let id = vertex_id(idx);
        self.state.version_index.insert(key.clone(), id);
        Ok(id)
    }

    async fn link_previous_version(
        &mut self,
        prev_commit_id: &str,
        current: VertexId,
        path: &str,
    ) -> Result<()> {
        let prev = self
            .state
            .version_index
            .iter()
            .find(|(key, _)| key.commit_id == prev_commit_id && key.path == path)
            .map(|(_, &v)| v);
        let Some(prev) = prev else {
            return Ok(());
        };
        let (a, b) = (node_idx(prev), node_idx(current));
        let exists = self
            .state
            .graph
            .edges_connecting(a, b)
            .any(|e| matches!(e.weight(), Edge::NextVersion));
        if !exists {
            self.state.graph.add_edge(a, b, Edge::NextVersion);
        }
        Ok(())
    }

    async fn lookup_nodes_by_span(
        &mut self,
        span_keys: &[String],
    ) -> Result<HashMap<String, VertexId>> {
        Ok(span_keys
            .iter()
            .filter_map(|key| self.state.span_index.get(key).map(|&v| (key.clone(), v)))
            .collect())
    }

    async fn lookup_nodes_by_shape(
        &mut self,
        shape_hashes: &[String],
    ) -> Result<HashMap<String, VertexId>> {
        Ok(shape_hashes
            .iter()
            .filter_map(|hash| self.state.shape_index.get(hash).map(|&v| (hash.clone(), v)))
            .collect())
    }

    async fn create_ast_nodes(&mut self, nodes: &[NodeProps]) -> Result<Vec<VertexId>> {
        let mut ids = Vec::with_capacity(nodes.len());
        for props in nodes {
            if let Some(&existing) = self.state.span_index.get(&props.span_key) {
                ids.push(existing);
                continue;
            }
            let idx = self.state.graph.add_node(Vertex::Ast(props.clone()));
            let id = vertex_id(idx);
            self.state.span_index.insert(props.span_key.clone(), id);
            self.state
                .shape_index
                .entry(props.shape_hash.clone())
                .or_insert(id);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn edge_guard_insert(&mut self, edges: &[ParentEdge]) -> Result<()> {
        for edge in edges {
            let pair = (edge.parent.0, edge.child.0);
            if self.state.guard.contains_key(&pair) {
                continue;
            }
            let slot = (edge.parent.0, edge.child_index);
            if let Some(&other) = self.state.guard_by_index.get(&slot) {
                if other != edge.child.0 {
                    return Err(GraphError::OrderingConflict {
                        parent: edge.parent.0,
                        child_index: edge.child_index,
                    });
                }
                continue;
            }
            self.state.guard.insert(pair, edge.child_index);
            self.state.guard_by_index.insert(slot, edge.child.0);
        }
        Ok(())
    }

    async fn upsert_parent_edges(&mut self, edges: &[ParentEdge]) -> Result<()> {
        for edge in edges {
            let (a, b) = (node_idx(edge.parent), node_idx(edge.child));
            let existing = self
                .state
                .graph
                .edges_connecting(a, b)
                .find(|e| matches!(e.weight(), Edge::ParentOf { .. }))
                .map(|e| e.id());
            match existing {
                Some(id) => {
                    if let Some(Edge::ParentOf { child_index }) =
                        self.state.graph.edge_weight_mut(id)
                    {
                        *child_index = edge.child_index;
                    }
                }
                None => {
                    self.state.graph.add_edge(
                        a,
                        b,
                        Edge::ParentOf {
                            child_index: edge.child_index,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    async fn upsert_occurrences(
        &mut self,
        version: VertexId,
        commit_id: &str,
        file_uuid: Uuid,
        occurrences: &[Occurrence],
    ) -> Result<()> {
        for occ in occurrences {
            let weight = Edge::OccursIn {
                commit_id: commit_id.to_string(),
                file_uuid,
                start_byte: occ.start_byte,
                end_byte: occ.end_byte,
            };
            let (a, b) = (node_idx(occ.node), node_idx(version));
            let exists = self
                .state
                .graph
                .edges_connecting(a, b)
                .any(|e| *e.weight() == weight);
            if !exists {
                self.state.graph.add_edge(a, b, weight);
            }
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.committed = true;
        Ok(())
    }
}

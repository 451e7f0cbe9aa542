//! Ingest orchestrator: one source file in, one transactional graph write out

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use uuid::Uuid;

use crate::collect::{CollectedTree, collect_tree};
use crate::error::{GraphError, Result};
use crate::git::VersionControl;
use crate::languages::Language;
use crate::model::{FileVersionKey, FileVersionMeta, Occurrence, ParentEdge, ParseNode, VertexId};
use crate::port::{GraphStore, GraphTransaction};

/// Parser frontend port. Total over well-formed UTF-8: error nodes come back
/// as ordinary tree nodes. Synchronous CPU work, never a suspension point.
pub trait TreeParser: Send + Sync {
    fn parse(&self, language: Language, source: &[u8]) -> Result<ParseNode>;
}

/// Items per bulk storage call.
const WRITE_BATCH: usize = 200;

/// Fallback stamp for files outside any repository.
const LOCAL: &str = "local";

/// What to ingest: a file path, or an inline code buffer plus its language.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub path: Option<PathBuf>,
    pub code: Option<String>,
    pub language: Option<String>,
}

impl IngestRequest {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        IngestRequest {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_code(code: impl Into<String>, language: impl Into<String>) -> Self {
        IngestRequest {
            code: Some(code.into()),
            language: Some(language.into()),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub file_uuid: Uuid,
    pub language: Language,
}

/// Drives the pipeline: persist file → parse → collect → resolve → write.
pub struct IngestEngine {
    store: Arc<dyn GraphStore>,
    parser: Arc<dyn TreeParser>,
    vcs: Arc<dyn VersionControl>,
    shape_fallback: bool,
    graph_ensured: AtomicBool,
}

impl IngestEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        parser: Arc<dyn TreeParser>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        IngestEngine {
            store,
            parser,
            vcs,
            shape_fallback: true,
            graph_ensured: AtomicBool::new(false),
        }
    }

    /// Disable the structural (shape-hash) identity fallback. On by default.
    pub fn without_shape_fallback(mut self) -> Self {
        self.shape_fallback = false;
        self
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Ingest one file or inline snippet. Returns the FileRecord UUID and the
    /// resolved language.
    ///
    /// All graph writes happen inside a single transaction; on any failure
    /// the transaction rolls back and only the deduplicated FileRecord insert
    /// survives. A temp file created for inline code is removed on every exit
    /// path.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        let detection_path = if request.code.is_none() {
            request.path.as_deref()
        } else {
            None
        };
        let language = Language::resolve(request.language.as_deref(), detection_path)?;

        // The temp file lives until this binding drops, success or failure.
        let mut temp_file = None;
        let path = match request.code {
            Some(code) => {
                let mut temp = tempfile::Builder::new()
                    .prefix("arbor-")
                    .suffix(language.default_extension())
                    .tempfile()?;
                temp.write_all(code.as_bytes())?;
                temp.flush()?;
                let path = temp.path().to_path_buf();
                temp_file = Some(temp);
                path
            }
            None => request.path.ok_or_else(|| {
                GraphError::InvalidInput("either a path or inline code is required".to_string())
            })?,
        };
        let path = path.canonicalize()?;
        let path_str = path.to_string_lossy().to_string();

        if !self.graph_ensured.swap(true, Ordering::SeqCst) {
            self.store.ensure_ready().await?;
        }

        let file_uuid = self.store.persist_file(&path).await?;
        tracing::debug!(file = %path_str, %file_uuid, "file record persisted");

        let source = std::fs::read(&path)?;
        let root = self.parser.parse(language, &source)?;
        let collected = collect_tree(&root, &file_uuid.to_string(), &source);
        tracing::debug!(
            nodes = collected.nodes.len(),
            edges = collected.edges.len(),
            "tree collected"
        );

        let (stamp, prev_commit) = self.version_stamp(&path);
        let key = FileVersionKey {
            commit_id: stamp.commit_id.clone(),
            file_uuid,
            path: path_str.clone(),
        };
        let meta = FileVersionMeta {
            language: language.as_str().to_string(),
            timestamp: stamp.timestamp,
            author: stamp.author,
            branch: stamp.branch,
        };

        let mut tx = self.store.begin().await?;
        let version = tx.upsert_file_version(&key, &meta).await?;
        if let Some(prev) = prev_commit {
            tx.link_previous_version(&prev, version, &path_str).await?;
        }

        let ids = self.resolve_identities(tx.as_mut(), &collected).await?;
        self.wire_edges(tx.as_mut(), &collected, &ids).await?;
        self.wire_occurrences(tx.as_mut(), &collected, &ids, version, &key.commit_id, file_uuid)
            .await?;
        tx.commit().await?;

        drop(temp_file);
        tracing::info!(%file_uuid, %language, file = %path_str, "ingest complete");
        Ok(IngestOutcome { file_uuid, language })
    }

    /// Commit metadata for the file, plus the previous commit touching the
    /// same path. Outside a repository everything degrades to `local`.
    fn version_stamp(&self, path: &std::path::Path) -> (VersionStamp, Option<String>) {
        match self.vcs.commit_info(path) {
            Some(info) => {
                let prev = self.vcs.previous_commit(path, &info.commit_id);
                (
                    VersionStamp {
                        commit_id: info.commit_id,
                        author: info.author,
                        timestamp: info.timestamp,
                        branch: info.branch,
                    },
                    prev,
                )
            }
            None => (
                VersionStamp {
                    commit_id: LOCAL.to_string(),
                    author: LOCAL.to_string(),
                    timestamp: Utc::now().to_rfc3339(),
                    branch: LOCAL.to_string(),
                },
                None,
            ),
        }
    }

    /// Map every collected node to a graph vertex id: span match first, then
    /// shape match against the already-persisted graph, then creation.
    async fn resolve_identities(
        &self,
        tx: &mut dyn GraphTransaction,
        collected: &CollectedTree,
    ) -> Result<Vec<VertexId>> {
        let nodes = &collected.nodes;
        let mut resolved: Vec<Option<VertexId>> = vec![None; nodes.len()];

        let mut span_keys = Vec::new();
        let mut seen = HashSet::new();
        for props in nodes {
            if seen.insert(props.span_key.as_str()) {
                span_keys.push(props.span_key.clone());
            }
        }
        let mut by_span = HashMap::new();
        for chunk in span_keys.chunks(WRITE_BATCH) {
            by_span.extend(tx.lookup_nodes_by_span(chunk).await?);
        }
        for (slot, props) in resolved.iter_mut().zip(nodes) {
            *slot = by_span.get(&props.span_key).copied();
        }

        if self.shape_fallback {
            let mut shapes = Vec::new();
            let mut seen = HashSet::new();
            for (slot, props) in resolved.iter().zip(nodes) {
                if slot.is_none() && seen.insert(props.shape_hash.as_str()) {
                    shapes.push(props.shape_hash.clone());
                }
            }
            let mut by_shape = HashMap::new();
            for chunk in shapes.chunks(WRITE_BATCH) {
                by_shape.extend(tx.lookup_nodes_by_shape(chunk).await?);
            }
            for (slot, props) in resolved.iter_mut().zip(nodes) {
                if slot.is_none() {
                    *slot = by_shape.get(&props.shape_hash).copied();
                }
            }
        }

        // Whatever is still unresolved gets created, deduplicated by span key
        // within this run so a repeated key maps to one vertex.
        enum Slot {
            Existing(VertexId),
            Created(usize),
        }
        let mut pending: HashMap<&str, usize> = HashMap::new();
        let mut to_create = Vec::new();
        let mut slots = Vec::with_capacity(nodes.len());
        for (slot, props) in resolved.iter().zip(nodes) {
            match slot {
                Some(id) => slots.push(Slot::Existing(*id)),
                None => match pending.get(props.span_key.as_str()) {
                    Some(&pos) => slots.push(Slot::Created(pos)),
                    None => {
                        pending.insert(props.span_key.as_str(), to_create.len());
                        slots.push(Slot::Created(to_create.len()));
                        to_create.push(props.clone());
                    }
                },
            }
        }
        let mut created = Vec::with_capacity(to_create.len());
        for chunk in to_create.chunks(WRITE_BATCH) {
            created.extend(tx.create_ast_nodes(chunk).await?);
        }
        tracing::debug!(
            known = nodes.len() - to_create.len(),
            created = to_create.len(),
            "identities resolved"
        );

        Ok(slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Existing(id) => id,
                Slot::Created(pos) => created[pos],
            })
            .collect())
    }

    async fn wire_edges(
        &self,
        tx: &mut dyn GraphTransaction,
        collected: &CollectedTree,
        ids: &[VertexId],
    ) -> Result<()> {
        let edges: Vec<ParentEdge> = collected
            .edges
            .iter()
            .map(|e| ParentEdge {
                parent: ids[e.parent],
                child: ids[e.child],
                child_index: e.child_order,
            })
            .collect();
        for chunk in edges.chunks(WRITE_BATCH) {
            tx.edge_guard_insert(chunk).await?;
            tx.upsert_parent_edges(chunk).await?;
        }
        Ok(())
    }

    async fn wire_occurrences(
        &self,
        tx: &mut dyn GraphTransaction,
        collected: &CollectedTree,
        ids: &[VertexId],
        version: VertexId,
        commit_id: &str,
        file_uuid: Uuid,
    ) -> Result<()> {
        let occurrences: Vec<Occurrence> = collected
            .occurrences
            .iter()
            .map(|o| Occurrence {
                node: ids[o.node],
                start_byte: o.start_byte,
                end_byte: o.end_byte,
            })
            .collect();
        for chunk in occurrences.chunks(WRITE_BATCH) {
            tx.upsert_occurrences(version, commit_id, file_uuid, chunk)
                .await?;
        }
        Ok(())
    }
}

struct VersionStamp {
    commit_id: String,
    author: String,
    timestamp: String,
    branch: String,
}

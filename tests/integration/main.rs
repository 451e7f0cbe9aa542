//! Integration tests for Arbor
//!
//! End-to-end scenarios over the real tree-sitter parser pool and the
//! in-memory reference backend.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arbor_core::{
    GitCli, GraphError, GraphStore, IngestEngine, IngestRequest, Language, MemoryBackend, query,
    span_key,
};
use arbor_parsers::SyntaxParser;

fn build_engine(store: Arc<dyn GraphStore>) -> IngestEngine {
    IngestEngine::new(store, Arc::new(SyntaxParser::default()), Arc::new(GitCli))
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

/// Scenario: a five-byte python assignment produces the expected graph.
#[tokio::test]
async fn simple_assignment_builds_expected_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "t.py", "x = 1");
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
    let engine = build_engine(store.clone());

    let outcome = engine.ingest(IngestRequest::from_path(&path)).await.unwrap();
    assert_eq!(outcome.language, Language::Python);

    let stats = query::statistics(store.as_ref()).await.unwrap();
    assert_eq!(stats.files, 1);
    assert!(stats.ast_nodes > 0);
    // Every node carries exactly one occurrence in its file version.
    assert_eq!(stats.occurrences, stats.ast_nodes);

    let langs = query::language_distribution(store.as_ref()).await.unwrap();
    assert_eq!(langs, vec![("python".to_string(), 1)]);

    let types = query::node_types(store.as_ref(), None, 50).await.unwrap();
    for expected in ["module", "expression_statement", "assignment", "identifier", "integer"] {
        assert!(types.contains(&expected.to_string()), "missing {expected}");
    }

    // The root module spans the whole five bytes.
    let uuid = outcome.file_uuid.to_string();
    let root_key = span_key(&uuid, "module", 0, 5);
    let detail = query::node_detail(store.as_ref(), &root_key).await.unwrap();
    assert_eq!(detail.kind, "module");

    // Walking down: module -> expression_statement -> assignment, each level
    // with contiguous child indices starting at 0.
    let mut current = root_key;
    for expected in ["expression_statement", "assignment"] {
        let children = query::children(store.as_ref(), &current, 50).await.unwrap();
        assert!(!children.is_empty());
        for (i, child) in children.iter().enumerate() {
            assert_eq!(child.child_index, i);
        }
        let next = children.iter().find(|c| c.kind == expected).unwrap();
        current = next.span_key.clone();
    }

    // The assignment's operands are in the graph at their exact spans.
    let identifier = span_key(&uuid, "identifier", 0, 1);
    assert!(query::node_detail(store.as_ref(), &identifier).await.is_ok());
    let integer = span_key(&uuid, "integer", 4, 5);
    assert!(query::node_detail(store.as_ref(), &integer).await.is_ok());
}

/// Scenario: ingesting the same file twice changes nothing.
#[tokio::test]
async fn reingest_is_a_dedup_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "t.py", "x = 1");
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
    let engine = build_engine(store.clone());

    let first = engine.ingest(IngestRequest::from_path(&path)).await.unwrap();
    let stats = query::statistics(store.as_ref()).await.unwrap();

    let second = engine.ingest(IngestRequest::from_path(&path)).await.unwrap();
    assert_eq!(first.file_uuid, second.file_uuid);
    assert_eq!(query::statistics(store.as_ref()).await.unwrap(), stats);
}

/// Scenario: structurally identical functions in two files share subtrees.
#[tokio::test]
async fn identical_sources_share_shapes_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = "def f():\n    pass\n";
    let a = write_file(dir.path(), "a.py", source);
    let b = write_file(dir.path(), "b.py", source);
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
    let engine = build_engine(store.clone());

    let out_a = engine.ingest(IngestRequest::from_path(&a)).await.unwrap();
    let out_b = engine.ingest(IngestRequest::from_path(&b)).await.unwrap();
    assert_ne!(out_a.file_uuid, out_b.file_uuid);

    // Two FileVersions, but the shape-shared nodes were not re-created.
    let langs = query::language_distribution(store.as_ref()).await.unwrap();
    assert_eq!(langs, vec![("python".to_string(), 2)]);

    let shared = query::shared_shapes(store.as_ref(), 50).await.unwrap();
    assert!(!shared.is_empty());
    assert!(shared.iter().any(|s| s.kind == "pass_statement"));
    assert!(shared.iter().all(|s| s.file_count == 2));
}

/// Scenario: a tuple assignment keeps its children in source order.
#[tokio::test]
async fn tuple_assignment_children_are_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "t.py", "a, b, c = 1, 2, 3");
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
    let engine = build_engine(store.clone());
    let outcome = engine.ingest(IngestRequest::from_path(&path)).await.unwrap();
    let uuid = outcome.file_uuid.to_string();

    // The left-hand pattern list spans `a, b, c`.
    let pattern_key = span_key(&uuid, "pattern_list", 0, 7);
    let children = query::children(store.as_ref(), &pattern_key, 50).await.unwrap();
    assert!(!children.is_empty());

    // Child indices are contiguous from zero.
    for (i, child) in children.iter().enumerate() {
        assert_eq!(child.child_index, i);
    }

    // The identifiers appear in source order a, b, c.
    let identifier_keys: Vec<&str> = children
        .iter()
        .filter(|c| c.kind == "identifier")
        .map(|c| c.span_key.as_str())
        .collect();
    assert_eq!(
        identifier_keys,
        vec![
            span_key(&uuid, "identifier", 0, 1).as_str(),
            span_key(&uuid, "identifier", 3, 4).as_str(),
            span_key(&uuid, "identifier", 6, 7).as_str(),
        ]
    );
}

/// Scenario: keyset pagination walks forward and backward over three files.
#[tokio::test]
async fn keyset_pagination_over_three_files() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
    let engine = build_engine(store.clone());
    for name in ["a.py", "b.py", "c.py"] {
        let path = write_file(dir.path(), name, "x = 1\n");
        engine.ingest(IngestRequest::from_path(&path)).await.unwrap();
    }

    let page1 = query::list_files(store.as_ref(), 2, None, None).await.unwrap();
    assert_eq!(page1.items.len(), 2);
    assert!(page1.items[0].full_path.ends_with("a.py"));
    assert!(page1.items[1].full_path.ends_with("b.py"));
    assert!(page1.prev.is_none());

    let page2 = query::list_files(store.as_ref(), 2, page1.next.as_deref(), None)
        .await
        .unwrap();
    assert_eq!(page2.items.len(), 1);
    assert!(page2.items[0].full_path.ends_with("c.py"));
    assert!(page2.next.is_none());

    let back = query::list_files(store.as_ref(), 2, None, page2.prev.as_deref())
        .await
        .unwrap();
    assert_eq!(back.items.len(), 2);
    assert!(back.items[0].full_path.ends_with("a.py"));
    assert!(back.items[1].full_path.ends_with("b.py"));
}

/// Scenario: the raw query surface is read-only.
#[tokio::test]
async fn readonly_guard_filters_write_queries() {
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());

    assert!(
        query::run_query_readonly(store.as_ref(), "MATCH (n) RETURN n LIMIT 1", 1)
            .await
            .is_ok()
    );
    assert!(
        query::run_query_readonly(store.as_ref(), "MATCH (n) RETURN n", 1)
            .await
            .is_ok()
    );
    match query::run_query_readonly(store.as_ref(), "MATCH (n) DELETE n", 1).await {
        Err(GraphError::InvalidInput(_)) => {}
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

/// Boundary: a zero-byte file ingests into a single childless root.
#[tokio::test]
async fn empty_file_ingests_to_childless_root() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "empty.py", "");
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
    let engine = build_engine(store.clone());
    let outcome = engine.ingest(IngestRequest::from_path(&path)).await.unwrap();

    let root_key = span_key(&outcome.file_uuid.to_string(), "module", 0, 0);
    let detail = query::node_detail(store.as_ref(), &root_key).await.unwrap();
    assert_eq!(detail.start_byte, 0);
    assert_eq!(detail.end_byte, 0);

    let children = query::children(store.as_ref(), &root_key, 50).await.unwrap();
    assert!(children.is_empty());
}

/// Boundary: unicode source survives hashing and re-ingest byte-exactly.
#[tokio::test]
async fn unicode_source_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "t.py", "s = \"héllo wörld\"\n");
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
    let engine = build_engine(store.clone());

    engine.ingest(IngestRequest::from_path(&path)).await.unwrap();
    let stats = query::statistics(store.as_ref()).await.unwrap();
    engine.ingest(IngestRequest::from_path(&path)).await.unwrap();
    assert_eq!(query::statistics(store.as_ref()).await.unwrap(), stats);
}

/// Inline snippets materialize with the right extension and clean up.
#[tokio::test]
async fn inline_code_ingest_reports_language() {
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
    let engine = build_engine(store.clone());
    let outcome = engine
        .ingest(IngestRequest::from_code("fn main() {}\n", "rs"))
        .await
        .unwrap();
    assert_eq!(outcome.language, Language::Rust);

    let row = store.file_by_id(outcome.file_uuid).await.unwrap().unwrap();
    assert_eq!(row.suffix, ".rs");
    assert!(!Path::new(&row.full_path).exists());

    let types = query::node_types(store.as_ref(), None, 50).await.unwrap();
    assert!(types.contains(&"function_item".to_string()));
}

/// Root nodes of a file are exactly the nodes without parents.
#[tokio::test]
async fn file_root_nodes_returns_the_module() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "t.py", "x = 1\ny = 2\n");
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
    let engine = build_engine(store.clone());
    engine.ingest(IngestRequest::from_path(&path)).await.unwrap();

    let full_path = path.canonicalize().unwrap().to_string_lossy().to_string();
    let roots = query::file_root_nodes(store.as_ref(), &full_path, None, 50)
        .await
        .unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].kind, "module");
}

//! Read-only projections over the graph port

use serde::Serialize;

use crate::cursor::{decode_cursor, encode_cursor};
use crate::error::{GraphError, Result};
use crate::guard::ensure_read_only;
use crate::model::{
    ChildRow, FileRow, GraphStatistics, NodeDetail, NodeRow, SharedShape,
};
use crate::port::GraphStore;

/// Limits are clamped to this range on every projection.
const MAX_LIMIT: usize = 1000;

/// One page of a keyset-paginated listing with opaque directional cursors.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
    pub prev: Option<String>,
}

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIMIT)
}

/// Shared post-processing: fetch `size + 1` rows, then derive the page and
/// the directional flags from the overflow row.
fn paginate<T>(
    rows: Vec<T>,
    size: usize,
    backward: bool,
    has_after: bool,
    cursor_of: impl Fn(&T) -> String,
) -> Page<T> {
    let overflow = rows.len() > size;
    let (items, has_next, has_prev) = if backward {
        let skip = rows.len().saturating_sub(size);
        let items: Vec<T> = rows.into_iter().skip(skip).collect();
        let has_next = !items.is_empty();
        (items, has_next, overflow)
    } else {
        let items: Vec<T> = rows.into_iter().take(size).collect();
        let has_prev = has_after && !items.is_empty();
        (items, overflow, has_prev)
    };
    Page {
        next: has_next.then(|| items.last().map(&cursor_of)).flatten(),
        prev: has_prev.then(|| items.first().map(&cursor_of)).flatten(),
        items,
    }
}

/// Files ordered by `(full_path, id)` with bidirectional keyset cursors.
pub async fn list_files(
    store: &dyn GraphStore,
    limit: usize,
    after: Option<&str>,
    before: Option<&str>,
) -> Result<Page<FileRow>> {
    let size = clamp_limit(limit);
    let after_key = after.map(decode_cursor).transpose()?;
    let before_key = if after_key.is_none() {
        before.map(decode_cursor).transpose()?
    } else {
        None
    };

    let rows = store
        .list_files_page(size + 1, after_key.as_ref(), before_key.as_ref())
        .await?;
    Ok(paginate(rows, size, before_key.is_some(), after_key.is_some(), |r| {
        encode_cursor(&r.full_path, &r.id.to_string())
    }))
}

/// Distinct AstNode types, optionally restricted to one file path.
pub async fn node_types(
    store: &dyn GraphStore,
    file_path: Option<&str>,
    limit: usize,
) -> Result<Vec<String>> {
    store.node_types(file_path, clamp_limit(limit)).await
}

fn decode_node_cursor(cursor: &str) -> Result<(usize, String)> {
    let (sort, id) = decode_cursor(cursor)?;
    let start_byte = sort
        .parse::<usize>()
        .map_err(|_| GraphError::InvalidInput(format!("malformed cursor: {cursor:?}")))?;
    Ok((start_byte, id))
}

/// AstNodes of one type, ordered by `(start_byte, span_key)` for stable
/// pagination.
pub async fn nodes_by_type(
    store: &dyn GraphStore,
    node_type: &str,
    file_path: Option<&str>,
    limit: usize,
    after: Option<&str>,
    before: Option<&str>,
) -> Result<Page<NodeRow>> {
    let size = clamp_limit(limit);
    let after_key = after.map(decode_node_cursor).transpose()?;
    let before_key = if after_key.is_none() {
        before.map(decode_node_cursor).transpose()?
    } else {
        None
    };

    let rows = store
        .nodes_by_type(
            node_type,
            file_path,
            size + 1,
            after_key.as_ref(),
            before_key.as_ref(),
        )
        .await?;
    Ok(paginate(rows, size, before_key.is_some(), after_key.is_some(), |r| {
        encode_cursor(&r.start_byte.to_string(), &r.span_key)
    }))
}

/// Ordered children of the node at `span_key`.
pub async fn children(
    store: &dyn GraphStore,
    span_key: &str,
    limit: usize,
) -> Result<Vec<ChildRow>> {
    store.children_of(span_key, clamp_limit(limit)).await
}

/// Full property row of one AstNode.
pub async fn node_detail(store: &dyn GraphStore, span_key: &str) -> Result<NodeDetail> {
    store
        .node_detail(span_key)
        .await?
        .ok_or_else(|| GraphError::NotFound(format!("AstNode {span_key}")))
}

pub async fn statistics(store: &dyn GraphStore) -> Result<GraphStatistics> {
    store.statistics().await
}

pub async fn language_distribution(store: &dyn GraphStore) -> Result<Vec<(String, u64)>> {
    store.language_distribution().await
}

pub async fn node_type_counts(store: &dyn GraphStore, limit: usize) -> Result<Vec<(String, u64)>> {
    store.node_type_counts(clamp_limit(limit)).await
}

pub async fn file_node_counts(store: &dyn GraphStore, limit: usize) -> Result<Vec<(String, u64)>> {
    store.file_node_counts(clamp_limit(limit)).await
}

pub async fn shared_shapes(store: &dyn GraphStore, limit: usize) -> Result<Vec<SharedShape>> {
    store.shared_shapes(clamp_limit(limit)).await
}

/// AstNodes occurring in the file that have no PARENT_OF predecessor.
pub async fn file_root_nodes(
    store: &dyn GraphStore,
    file_path: &str,
    node_type: Option<&str>,
    limit: usize,
) -> Result<Vec<NodeRow>> {
    store
        .file_root_nodes(file_path, node_type, clamp_limit(limit))
        .await
}

/// Run an opaque query after the write-keyword guard. This is the only query
/// surface reachable by untrusted callers.
pub async fn run_query_readonly(
    store: &dyn GraphStore,
    query: &str,
    columns: usize,
) -> Result<Vec<Vec<String>>> {
    let query = ensure_read_only(query)?;
    store.run_read_query(query, columns).await
}

//! REST API handlers for the Arbor server

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use arbor_core::{GraphError, IngestRequest, query};

use crate::ServerState;

/// Error envelope: every failure becomes `{ "error": ... }` with the status
/// implied by the error kind.
pub struct ApiError(GraphError);

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GraphError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GraphError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self.0);
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub after: Option<String>,
    pub before: Option<String>,
}

pub async fn list_files(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<PageParams>,
) -> ApiResult<query::Page<arbor_core::FileRow>> {
    let store = state.engine.store().as_ref();
    let page = query::list_files(
        store,
        params.limit,
        params.after.as_deref(),
        params.before.as_deref(),
    )
    .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub path: Option<String>,
    pub code: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub file_uuid: Uuid,
    pub language: String,
}

pub async fn post_ingest(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<IngestBody>,
) -> ApiResult<IngestResponse> {
    let request = IngestRequest {
        path: body.path.map(Into::into),
        code: body.code,
        language: body.language,
    };
    let outcome = state.engine.ingest(request).await?;
    Ok(Json(IngestResponse {
        file_uuid: outcome.file_uuid,
        language: outcome.language.as_str().to_string(),
    }))
}

pub async fn get_file(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<arbor_core::FileRow> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| GraphError::InvalidInput(format!("malformed file id: {id:?}")))?;
    let store = state.engine.store().as_ref();
    let row = store
        .file_by_id(id)
        .await?
        .ok_or_else(|| GraphError::NotFound(format!("file {id}")))?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct NodeTypeParams {
    pub file: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn get_node_types(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<NodeTypeParams>,
) -> ApiResult<Vec<String>> {
    let store = state.engine.store().as_ref();
    let types = query::node_types(store, params.file.as_deref(), params.limit).await?;
    Ok(Json(types))
}

#[derive(Debug, Deserialize)]
pub struct NodesParams {
    #[serde(rename = "type")]
    pub node_type: String,
    pub file: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub after: Option<String>,
    pub before: Option<String>,
}

pub async fn get_nodes(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<NodesParams>,
) -> ApiResult<query::Page<arbor_core::NodeRow>> {
    let store = state.engine.store().as_ref();
    let page = query::nodes_by_type(
        store,
        &params.node_type,
        params.file.as_deref(),
        params.limit,
        params.after.as_deref(),
        params.before.as_deref(),
    )
    .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct SpanKeyParams {
    pub span_key: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn get_node_detail(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<SpanKeyParams>,
) -> ApiResult<arbor_core::NodeDetail> {
    let store = state.engine.store().as_ref();
    let detail = query::node_detail(store, &params.span_key).await?;
    Ok(Json(detail))
}

pub async fn get_children(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<SpanKeyParams>,
) -> ApiResult<Vec<arbor_core::ChildRow>> {
    let store = state.engine.store().as_ref();
    let rows = query::children(store, &params.span_key, params.limit).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct RootNodesParams {
    pub file: String,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn get_file_root_nodes(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<RootNodesParams>,
) -> ApiResult<Vec<arbor_core::NodeRow>> {
    let store = state.engine.store().as_ref();
    let rows = query::file_root_nodes(
        store,
        &params.file,
        params.node_type.as_deref(),
        params.limit,
    )
    .await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize)]
pub struct CountRow {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub counts: arbor_core::GraphStatistics,
    pub languages: Vec<CountRow>,
    pub node_types: Vec<CountRow>,
}

pub async fn get_statistics(
    State(state): State<Arc<ServerState>>,
) -> ApiResult<StatisticsResponse> {
    let store = state.engine.store().as_ref();
    let counts = query::statistics(store).await?;
    let languages = query::language_distribution(store).await?;
    let node_types = query::node_type_counts(store, default_limit()).await?;
    let to_rows = |rows: Vec<(String, u64)>| {
        rows.into_iter()
            .map(|(name, count)| CountRow { name, count })
            .collect()
    };
    Ok(Json(StatisticsResponse {
        counts,
        languages: to_rows(languages),
        node_types: to_rows(node_types),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CypherBody {
    pub query: String,
    pub columns: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CypherResponse {
    pub rows: Vec<Vec<String>>,
}

/// Execute a **read-only** query. Write operations are rejected.
pub async fn post_cypher(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<CypherBody>,
) -> ApiResult<CypherResponse> {
    let store = state.engine.store().as_ref();
    let rows = query::run_query_readonly(store, &body.query, body.columns.unwrap_or(1)).await?;
    Ok(Json(CypherResponse { rows }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_check_reports_ok() {
        let _response = health_check().await;
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        let bad = ApiError(GraphError::InvalidInput("x".to_string())).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let missing = ApiError(GraphError::NotFound("x".to_string())).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let broken = ApiError(GraphError::Backend("x".to_string())).into_response();
        assert_eq!(broken.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

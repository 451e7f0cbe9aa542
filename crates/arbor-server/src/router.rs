//! Axum router setup for the Arbor API server

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::{
    ServerState,
    handlers::{
        get_children, get_file, get_file_root_nodes, get_node_detail, get_node_types, get_nodes,
        get_statistics, health_check, list_files, post_cypher, post_ingest,
    },
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/files", get(list_files).post(post_ingest))
        .route("/api/files/:id", get(get_file))
        .route("/api/node-types", get(get_node_types))
        .route("/api/nodes", get(get_nodes))
        .route("/api/nodes/detail", get(get_node_detail))
        .route("/api/children", get(get_children))
        .route("/api/root-nodes", get(get_file_root_nodes))
        .route("/api/statistics", get(get_statistics))
        .route("/api/query/cypher", post(post_cypher))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{GitCli, GraphStore, IngestEngine, MemoryBackend};
    use arbor_parsers::SyntaxParser;

    #[test]
    fn router_builds_with_fresh_state() {
        let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
        let engine = Arc::new(IngestEngine::new(
            store,
            Arc::new(SyntaxParser::default()),
            Arc::new(GitCli),
        ));
        let state = Arc::new(ServerState::new(engine));
        let _router = create_router(state);
    }
}

//! JSON API server over the ingest engine and query projections

pub mod handlers;
pub mod router;

use std::sync::Arc;

use arbor_core::IngestEngine;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 7843,
        }
    }
}

/// Shared state handed to every handler.
pub struct ServerState {
    pub engine: Arc<IngestEngine>,
}

impl ServerState {
    pub fn new(engine: Arc<IngestEngine>) -> Self {
        ServerState { engine }
    }
}

/// The Arbor API server.
pub struct ArborServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl ArborServer {
    pub fn new(engine: Arc<IngestEngine>, config: ServerConfig) -> Self {
        ArborServer {
            state: Arc::new(ServerState::new(engine)),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(self) -> anyhow::Result<()> {
        let app = router::create_router(self.state);
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("API server listening on http://{}", addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

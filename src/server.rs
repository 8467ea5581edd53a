//! HTTP server lifecycle.
//!
//! Opens the database, builds the engine and router, and serves on a
//! background task until cancelled. Shutdown is graceful: in-flight requests
//! finish before the task exits.

use crate::api::{router, AppState};
use crate::config::Config;
use crate::db;
use crate::error::AppError;
use crate::services::{AssignmentEngine, SharedRng};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running server.
pub struct ServerHandle {
    cancel_token: CancellationToken,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener actually bound, useful when the port was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Ask the server to stop accepting connections.
    pub fn shutdown(&self) {
        log::info!("[server] Stopping server on {}", self.local_addr);
        self.cancel_token.cancel();
    }

    /// Wait for the server task to finish.
    pub async fn wait(self) -> Result<(), AppError> {
        self.task
            .await
            .map_err(|e| AppError::internal(format!("server task failed: {}", e)))
    }
}

/// Build the engine for `config`, seeding the random source if asked to.
pub fn build_engine(pool: db::pool::DbPool, config: &Config) -> AssignmentEngine {
    let rng = match config.rng_seed {
        Some(seed) => {
            log::info!("[server] Using seeded reviewer draws (seed {})", seed);
            SharedRng::seeded(seed)
        }
        None => SharedRng::from_entropy(),
    };
    AssignmentEngine::with_rng(pool, Arc::new(rng))
}

/// Open the database and start serving on `config.bind_addr()`.
pub async fn start_server(config: &Config) -> Result<ServerHandle, AppError> {
    let pool =
        db::initialize_with_max_connections(&config.database_path, config.db_max_connections)
            .await?;
    let engine = build_engine(pool, config);
    let app = router(AppState { engine });

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", bind_addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| AppError::internal(format!("Failed to read bound address: {}", e)))?;

    log::info!("[server] Listening on http://{}", local_addr);

    let cancel_token = CancellationToken::new();
    let cancel_clone = cancel_token.clone();

    let task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            cancel_clone.cancelled().await;
        });

        if let Err(e) = server.await {
            log::error!("[server] Server error: {}", e);
        }

        log::info!("[server] Server stopped");
    });

    Ok(ServerHandle {
        cancel_token,
        local_addr,
        task,
    })
}

/// Serve until Ctrl-C, then shut down gracefully.
pub async fn run(config: Config) -> Result<(), AppError> {
    let handle = start_server(&config).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[server] Failed to listen for shutdown signal: {}", e);
    }

    handle.shutdown();
    handle.wait().await
}

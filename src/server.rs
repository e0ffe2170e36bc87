//! HTTP trigger listener
//!
//! Receives webhook triggers, rejects malformed payloads with a client error
//! before the core is touched, and maps the engine's result to a status code.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::request::SyncPayload;
use crate::sync::{SyncEngine, SyncResult};

/// Build the router with `/health` and `/sync`
pub fn router(engine: Arc<SyncEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sync", post(trigger_sync))
        .with_state(engine)
}

/// Bind `listen` and serve until Ctrl-C or SIGTERM
pub async fn serve(engine: Arc<SyncEngine>, listen: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind listener on {}", listen))?;

    info!(listen_addr = listen, "Starting Windmill Git Sync server");

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server exited unexpectedly")
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn trigger_sync(
    State(engine): State<Arc<SyncEngine>>,
    payload: Result<Json<SyncPayload>, JsonRejection>,
) -> (StatusCode, Json<SyncResult>) {
    info!("Sync triggered via webhook");

    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected sync trigger: {}", rejection.body_text());
            let result = SyncResult::failed(format!(
                "Invalid request payload: {}",
                rejection.body_text()
            ));
            return (StatusCode::BAD_REQUEST, Json(result));
        }
    };

    let request = match engine.prepare(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected sync trigger: {}", e);
            return (StatusCode::BAD_REQUEST, Json(SyncResult::failed(e.to_string())));
        }
    };

    // Detached so a dropped connection cannot abort a run halfway through
    let task = tokio::spawn(async move { engine.execute(&request).await });
    let result = match task.await {
        Ok(result) => result,
        Err(e) => {
            error!("Sync task did not complete: {}", e);
            SyncResult::failed("Sync failed with an internal error")
        }
    };

    if result.success {
        info!("Sync completed successfully: {}", result.message);
        (StatusCode::OK, Json(result))
    } else {
        error!("Sync failed: {}", result.message);
        (StatusCode::INTERNAL_SERVER_ERROR, Json(result))
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT, Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server");
}

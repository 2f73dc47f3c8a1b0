//! Loopback HTTP server that hands out the service account key.
//!
//! Provides:
//! - `GET /credentials.json`: the key file, as an attachment
//! - `GET /health`: liveness probe

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::artifacts::SERVED_FILE_NAME;
use crate::ui;

/// Probe attempts before giving up on the server.
const PROBE_ATTEMPTS: u32 = 20;
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Server state shared across handlers.
pub struct KeyServerState {
    /// Key file served on every request. Read fresh each time.
    pub key_path: PathBuf,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build the HTTP router.
pub fn build_router(state: Arc<KeyServerState>) -> Router {
    Router::new()
        .route(&format!("/{SERVED_FILE_NAME}"), get(credentials_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn credentials_handler(State(state): State<Arc<KeyServerState>>) -> Response {
    match tokio::fs::read(&state.key_path).await {
        Ok(bytes) => {
            info!(path = %state.key_path.display(), "Key downloaded");
            (
                [
                    (header::CONTENT_TYPE, "application/json".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{SERVED_FILE_NAME}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %state.key_path.display(), "Key file missing");
            (StatusCode::NOT_FOUND, "key file not found").into_response()
        }
        Err(e) => {
            warn!(path = %state.key_path.display(), error = %e, "Key file unreadable");
            (StatusCode::INTERNAL_SERVER_ERROR, "key file unreadable").into_response()
        }
    }
}

/// Wait until `/health` answers on `addr`.
///
/// # Errors
///
/// Returns an error if the server does not answer within the probe budget.
pub async fn probe(addr: SocketAddr) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .context("Failed to build HTTP client")?;
    let url = format!("http://{addr}/health");

    for attempt in 1..=PROBE_ATTEMPTS {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => debug!(attempt, status = %resp.status(), "Probe not ready"),
            Err(e) => debug!(attempt, error = %e, "Probe failed"),
        }
        tokio::time::sleep(PROBE_INTERVAL).await;
    }
    bail!("key server on {addr} did not respond to {url}")
}

/// Serve `key_path` on `127.0.0.1:port` until `shutdown` resolves.
///
/// Port 0 picks a free port. The download URL is printed once the liveness
/// probe succeeds.
///
/// # Errors
///
/// Returns an error if the key file is missing, the port cannot be bound, or
/// the server fails.
pub async fn serve_key<F>(key_path: PathBuf, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if !key_path.is_file() {
        bail!(
            "Key file {} not found; run `pdf-provision provision` first",
            key_path.display()
        );
    }

    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .await
        .with_context(|| format!("Failed to bind 127.0.0.1:{port}"))?;
    let addr = listener.local_addr()?;
    info!(%addr, key = %key_path.display(), "Key server listening");

    let app = build_router(Arc::new(KeyServerState { key_path }));
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    });

    if let Err(e) = probe(addr).await {
        server.abort();
        return Err(e);
    }

    ui::print_success(&format!(
        "Serving key at http://{addr}/{SERVED_FILE_NAME}"
    ));
    ui::print_info("Forward the port (SSH tunnel or web preview) and download it; Ctrl-C stops the server");

    server
        .await
        .context("Key server task failed")?
        .context("Key server error")?;
    info!("Key server stopped");
    Ok(())
}

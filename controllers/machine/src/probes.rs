//! Health probe endpoints.
//!
//! `/healthz` answers as long as the process serves HTTP. `/readyz` answers
//! once the watchers have been started.

use axum::{Router, extract::State, http::StatusCode, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tracing::info;

/// Readiness flag shared between the controller and the probe server
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn set_ready(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Probe routes
pub fn routes(readiness: Readiness) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(readiness)
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn readyz(State(readiness): State<Readiness>) -> (StatusCode, &'static str) {
    if readiness.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// Serve the probes on `addr` until the process exits
pub async fn serve(addr: SocketAddr, readiness: Readiness) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Health probes listening on {}", addr);
    axum::serve(listener, routes(readiness)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn status(app: Router, path: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_healthz_always_ok() {
        assert_eq!(status(routes(Readiness::default()), "/healthz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_follows_readiness() {
        let readiness = Readiness::default();
        assert_eq!(
            status(routes(readiness.clone()), "/readyz").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        readiness.set_ready();
        assert_eq!(status(routes(readiness), "/readyz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        assert_eq!(status(routes(Readiness::default()), "/metrics").await, StatusCode::NOT_FOUND);
    }
}

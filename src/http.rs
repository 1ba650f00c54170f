//! Status HTTP surface: a tiny read-only axum router exposing the
//! supervisor's current `ClusterStatus` snapshot.

use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;

use crate::status::ClusterStatus;
use crate::supervisor::Supervisor;

/// Initialize tracing subscriber for the daemon binary. Uses RUST_LOG env var
/// for filtering (defaults to info).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry().with(fmt::layer().with_ansi(true)).with(filter).init();
}

pub fn build_router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/health", get(|| async { "ok" }))
        .with_state(supervisor)
}

async fn handle_status(State(supervisor): State<Arc<Supervisor>>) -> Json<ClusterStatus> {
    Json(supervisor.status().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;
    use crate::supervisor::SupervisorConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration as StdDuration;
    use tower::ServiceExt;

    #[tokio::test]
    async fn status_endpoint_returns_ok_state_json() {
        let master = Arc::new(FakeClient::new());
        let slave = Arc::new(FakeClient::new());
        let supervisor = Arc::new(Supervisor::new(
            "master",
            "slave",
            master,
            slave,
            SupervisorConfig {
                check_interval: StdDuration::from_secs(10),
                chunk_duration: ChronoDuration::minutes(1),
                max_retention_interval: ChronoDuration::hours(24),
                db_filter: None,
            },
        ));

        let router = build_router(supervisor);
        let response = router
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_endpoint_is_ok() {
        let master = Arc::new(FakeClient::new());
        let slave = Arc::new(FakeClient::new());
        let supervisor = Arc::new(Supervisor::new(
            "master",
            "slave",
            master,
            slave,
            SupervisorConfig {
                check_interval: StdDuration::from_secs(10),
                chunk_duration: ChronoDuration::minutes(1),
                max_retention_interval: ChronoDuration::hours(24),
                db_filter: None,
            },
        ));

        let router = build_router(supervisor);
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}

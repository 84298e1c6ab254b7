use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::api::api_router;
use super::git::git_router;
use crate::auth::CredentialStore;
use crate::replication::JobQueue;
use crate::store::RepoStore;

pub struct AppState {
    pub repos: Arc<dyn RepoStore>,
    pub creds: Arc<dyn CredentialStore>,
    pub queue: Arc<dyn JobQueue>,
    /// Base URL clients use to reach this host, for clone URLs.
    pub public_url: String,
}

impl AppState {
    #[must_use]
    pub fn new(
        repos: Arc<dyn RepoStore>,
        creds: Arc<dyn CredentialStore>,
        queue: Arc<dyn JobQueue>,
        public_url: String,
    ) -> Self {
        Self {
            repos,
            creds,
            queue,
            public_url,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

/// The full HTTP surface: the management API under `/api/repos` and the git
/// smart HTTP transport at the root.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/repos", api_router())
        .merge(git_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

mod replication;
mod repos;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use super::AppState;

/// The management API, nested under `/api/repos`. It runs on a trusted
/// operator network and carries no authentication of its own, except for
/// `/replicate`, which requires a bearer token bound to the replicated repo.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(repos::create_repo))
        .route("/delete", post(repos::delete_repo))
        .route("/list", get(repos::list_repos))
        .route(
            "/metadata",
            get(repos::get_metadata).post(repos::set_metadata),
        )
        .route(
            "/register-replication",
            post(replication::register_replication),
        )
        .route("/replicate", post(replication::replicate))
}

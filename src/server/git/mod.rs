mod access;
mod handlers;

pub use access::{check_access, AccessError};

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use super::AppState;

/// The smart HTTP transport routes, mounted at the server root.
pub fn git_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{owner}/{repo}/info/refs", get(handlers::info_refs))
        .route(
            "/{owner}/{repo}/git-upload-pack",
            post(handlers::git_upload_pack),
        )
        .route(
            "/{owner}/{repo}/git-receive-pack",
            post(handlers::git_receive_pack),
        )
}

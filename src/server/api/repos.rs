use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::warn;

use crate::server::AppState;
use crate::server::dto::{
    CreateRepoResponse, ListQuery, ListReposResponse, MetadataResponse, OkResponse, RepoQuery,
    RepoRequest,
};
use crate::server::response::ApiError;
use crate::server::validation::validate_repo_id;
use crate::types::RepoMetadata;

pub async fn create_repo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RepoRequest>,
) -> Result<Json<CreateRepoResponse>, ApiError> {
    validate_repo_id(&req.owner, &req.name)?;

    if state.repos.exists(&req.owner, &req.name) {
        return Err(ApiError::conflict("repository already exists"));
    }

    state.repos.create(&req.owner, &req.name).map_err(|e| {
        warn!("create failed for {}/{}: {e}", req.owner, req.name);
        ApiError::internal(format!("create failed: {e}"))
    })?;

    Ok(Json(CreateRepoResponse {
        success: true,
        repo_path: format!("{}/{}.git", req.owner, req.name),
        clone_url: format!("{}/{}/{}.git", state.public_url, req.owner, req.name),
    }))
}

pub async fn delete_repo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RepoRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    validate_repo_id(&req.owner, &req.name)?;

    if !state.repos.exists(&req.owner, &req.name) {
        return Err(ApiError::not_found("repository not found"));
    }

    state.repos.delete(&req.owner, &req.name).map_err(|e| {
        warn!("delete failed for {}/{}: {e}", req.owner, req.name);
        ApiError::internal(format!("delete failed: {e}"))
    })?;

    Ok(Json(OkResponse::ok()))
}

pub async fn list_repos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListReposResponse>, ApiError> {
    let repos = match query.owner.as_deref() {
        Some(owner) if !owner.is_empty() => state.repos.list_by_owner(owner),
        _ => state.repos.list_all(),
    }
    .map_err(|e| ApiError::internal(format!("list failed: {e}")))?;

    Ok(Json(ListReposResponse {
        success: true,
        repos,
    }))
}

pub async fn get_metadata(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RepoQuery>,
) -> Result<Json<MetadataResponse>, ApiError> {
    validate_repo_id(&query.owner, &query.name)?;

    if !state.repos.exists(&query.owner, &query.name) {
        return Err(ApiError::not_found("repository not found"));
    }

    let metadata = state
        .repos
        .get_metadata(&query.owner, &query.name)
        .map_err(|e| ApiError::internal(format!("get metadata failed: {e}")))?;

    Ok(Json(MetadataResponse {
        success: true,
        metadata,
    }))
}

pub async fn set_metadata(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RepoQuery>,
    Json(meta): Json<RepoMetadata>,
) -> Result<Json<OkResponse>, ApiError> {
    validate_repo_id(&query.owner, &query.name)?;

    if !state.repos.exists(&query.owner, &query.name) {
        return Err(ApiError::not_found("repository not found"));
    }

    state
        .repos
        .set_metadata(&query.owner, &query.name, &meta)
        .map_err(|e| ApiError::internal(format!("set metadata failed: {e}")))?;

    Ok(Json(OkResponse::ok()))
}

use std::sync::Arc;

use async_compression::tokio::bufread::GzipDecoder;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::warn;

use super::access::{AccessError, authenticated_user, check_access};
use crate::git::{GitService, format_pkt_line_header, run_service};
use crate::server::AppState;
use crate::server::validation::validate_name;
use crate::types::RepoMetadata;

#[derive(Deserialize)]
pub struct InfoRefsQuery {
    service: Option<String>,
}

#[derive(Deserialize)]
pub struct GitPathParams {
    owner: String,
    repo: String,
}

struct GitContext {
    username: String,
    owner: String,
    repo: String,
    meta: RepoMetadata,
}

fn error_response(err: AccessError) -> Response {
    let mut response = (err.status_code(), err.message()).into_response();

    if err.requires_auth_header() {
        response
            .headers_mut()
            .insert("WWW-Authenticate", "Basic realm=\"Git\"".parse().unwrap());
    }

    response
}

fn strip_git_suffix(name: &str) -> &str {
    name.strip_suffix(".git").unwrap_or(name)
}

fn resolve_git_context(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    params: &GitPathParams,
) -> Result<GitContext, AccessError> {
    let repo = strip_git_suffix(&params.repo).to_string();

    if validate_name(&params.owner).is_err() || validate_name(&repo).is_err() {
        return Err(AccessError::InvalidRepoName);
    }

    if !state.repos.exists(&params.owner, &repo) {
        return Err(AccessError::RepoNotFound);
    }

    let meta = state
        .repos
        .get_metadata(&params.owner, &repo)
        .map_err(|_| AccessError::InternalError)?;

    Ok(GitContext {
        username: authenticated_user(headers, state),
        owner: params.owner.clone(),
        repo,
        meta,
    })
}

fn build_git_response(body: Vec<u8>, content_type: &str) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert("Content-Type", content_type.parse().unwrap());
    response
        .headers_mut()
        .insert("Cache-Control", "no-cache".parse().unwrap());
    response
}

pub async fn info_refs(
    State(state): State<Arc<AppState>>,
    Path(params): Path<GitPathParams>,
    Query(query): Query<InfoRefsQuery>,
    headers: HeaderMap,
) -> Response {
    let service = match query.service.as_deref().and_then(GitService::from_str) {
        Some(s) => s,
        None => return error_response(AccessError::InvalidService),
    };

    let ctx = match resolve_git_context(&state, &headers, &params) {
        Ok(ctx) => ctx,
        Err(e) => return error_response(e),
    };

    if let Err(e) = check_access(&ctx.username, &ctx.owner, &ctx.meta, service.is_write()) {
        return error_response(e);
    }

    let path = state.repos.repo_path(&ctx.owner, &ctx.repo);

    let output = match run_service(&path, service, true, None).await {
        Ok(o) => o,
        Err(e) => {
            warn!("ref advertisement failed for {}/{}: {e}", ctx.owner, ctx.repo);
            return error_response(AccessError::InternalError);
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("ref advertisement failed for {}/{}: {stderr}", ctx.owner, ctx.repo);
        return error_response(AccessError::InternalError);
    }

    let mut body = format_pkt_line_header(service);
    body.extend_from_slice(&output.stdout);

    build_git_response(body, service.advertisement_content_type())
}

pub async fn git_upload_pack(
    State(state): State<Arc<AppState>>,
    Path(params): Path<GitPathParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    serve_pack(state, params, headers, body, GitService::UploadPack).await
}

pub async fn git_receive_pack(
    State(state): State<Arc<AppState>>,
    Path(params): Path<GitPathParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    serve_pack(state, params, headers, body, GitService::ReceivePack).await
}

async fn serve_pack(
    state: Arc<AppState>,
    params: GitPathParams,
    headers: HeaderMap,
    body: Bytes,
    service: GitService,
) -> Response {
    let ctx = match resolve_git_context(&state, &headers, &params) {
        Ok(ctx) => ctx,
        Err(e) => return error_response(e),
    };

    if let Err(e) = check_access(&ctx.username, &ctx.owner, &ctx.meta, service.is_write()) {
        return error_response(e);
    }

    let input = match decompress_if_gzip(&headers, body).await {
        Ok(data) => data,
        Err(e) => return e,
    };

    let path = state.repos.repo_path(&ctx.owner, &ctx.repo);

    let output = match run_service(&path, service, false, Some(&input)).await {
        Ok(o) => o,
        Err(e) => {
            warn!("{} failed for {}/{}: {e}", service.command_name(), ctx.owner, ctx.repo);
            return error_response(AccessError::InternalError);
        }
    };

    // A push is durable once the engine exits cleanly; replication happens
    // later and its failures are never surfaced to the pushing client.
    if service.is_write() && output.status.success() {
        state.queue.enqueue(&ctx.owner, &ctx.repo);
    }

    build_git_response(output.stdout, service.content_type())
}

async fn decompress_if_gzip(headers: &HeaderMap, body: Bytes) -> Result<Vec<u8>, Response> {
    let content_encoding = headers
        .get("Content-Encoding")
        .and_then(|v| v.to_str().ok());

    if content_encoding == Some("gzip") {
        let reader = std::io::Cursor::new(body);
        let mut decoder = GzipDecoder::new(tokio::io::BufReader::new(reader));
        let mut decompressed = Vec::new();

        decoder
            .read_to_end(&mut decompressed)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid gzip body").into_response())?;

        Ok(decompressed)
    } else {
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_suffix_stripped() {
        assert_eq!(strip_git_suffix("foo.git"), "foo");
        assert_eq!(strip_git_suffix("foo"), "foo");
    }
}

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
};
use base64::Engine as _;
use tracing::{info, warn};

use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{OkResponse, RegisterReplicationRequest, ReplicateRequest};
use crate::server::response::ApiError;
use crate::server::validation::validate_repo_id;
use crate::types::ReplicaSource;

/// The username a replica provisions for one `(owner, repo, origin)` triple.
pub fn replication_username(owner: &str, repo: &str, origin_instance_id: &str) -> String {
    format!("replication-{owner}-{repo}-{origin_instance_id}")
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Peer side of the replication handshake: provision the credential an
/// origin will later push with. The invitation key is deliberately absent
/// here; it travels out-of-band through the operators.
pub async fn register_replication(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterReplicationRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    if req.token.is_empty() || req.origin_instance_id.is_empty() || req.replica_url.is_empty() {
        return Err(ApiError::bad_request(
            "owner, repo, token, origin_instance_id, and replica_url required",
        ));
    }

    validate_repo_id(&req.owner, &req.repo)?;

    // A live origin on this host must not be silently turned into a replica.
    if state.repos.exists(&req.owner, &req.repo) {
        let meta = state
            .repos
            .get_metadata(&req.owner, &req.repo)
            .map_err(|e| ApiError::internal(format!("get metadata failed: {e}")))?;

        if !meta.is_replica() {
            return Err(ApiError::conflict(
                "repository already exists as origin on this host",
            ));
        }
    }

    let username = replication_username(&req.owner, &req.repo, &req.origin_instance_id);

    match state
        .creds
        .create_user_with_token(&username, "replication", &req.token)
    {
        Ok(()) => info!("provisioned replication user {username}"),
        Err(Error::UserExists(_)) => {}
        Err(e) => return Err(ApiError::internal(format!("create user failed: {e}"))),
    }

    Ok(Json(OkResponse::ok()))
}

/// Peer side of a replication push: verify the token-to-repo binding and the
/// invitation key, apply the bundle, and record provenance.
pub async fn replicate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ReplicateRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("missing authorization"))?;

    let username = state
        .creds
        .validate_token(token)
        .map_err(|_| ApiError::unauthorized("invalid token"))?;

    if req.instance_id.is_empty() || req.invitation_key.is_empty() {
        return Err(ApiError::bad_request(
            "owner, repo, instance_id, and invitation_key required",
        ));
    }

    validate_repo_id(&req.owner, &req.repo)?;

    if req.bundle.is_empty() {
        return Err(ApiError::bad_request("missing bundle data"));
    }

    // The bearer token's owning username encodes which (owner, repo, origin)
    // triple it was issued for; a credential for one repository must not be
    // usable against another.
    if !username.starts_with("replication-") {
        return Err(ApiError::forbidden("unauthorized: not a replication user"));
    }

    let expected = replication_username(&req.owner, &req.repo, &req.instance_id);
    if username != expected {
        return Err(ApiError::forbidden("unauthorized: token mismatch"));
    }

    let bundle = base64::engine::general_purpose::STANDARD
        .decode(&req.bundle)
        .map_err(|e| ApiError::bad_request(format!("decode bundle: {e}")))?;

    if state.repos.exists(&req.owner, &req.repo) {
        let existing = state
            .repos
            .get_metadata(&req.owner, &req.repo)
            .map_err(|e| ApiError::internal(format!("get metadata failed: {e}")))?;

        let Some(source) = existing.replica_of else {
            return Err(ApiError::conflict(
                "cannot replicate: repo already exists as origin",
            ));
        };

        if source.invitation_key != req.invitation_key {
            return Err(ApiError::forbidden("invalid invitation key"));
        }
    } else {
        state.repos.create(&req.owner, &req.repo).map_err(|e| {
            warn!("create repo failed for {}/{}: {e}", req.owner, req.repo);
            ApiError::internal(format!("create repo failed: {e}"))
        })?;
    }

    let repo_path = state.repos.repo_path(&req.owner, &req.repo);

    let bundle_file = tempfile::NamedTempFile::new()
        .and_then(|f| {
            std::fs::write(f.path(), &bundle)?;
            Ok(f)
        })
        .map_err(|e| ApiError::internal(format!("write bundle: {e}")))?;

    crate::git::fetch_bundle(&repo_path, bundle_file.path())
        .await
        .map_err(|e| ApiError::internal(format!("apply bundle: {e}")))?;

    // Persist the origin-supplied metadata, with provenance attached. The
    // replicas field never crosses instances: the origin scrubs it on send
    // and a replica must not fan out further.
    let mut meta = req.metadata;
    meta.replicas = Vec::new();
    meta.replica_of = Some(ReplicaSource {
        instance_id: req.instance_id.clone(),
        invitation_key: req.invitation_key.clone(),
    });

    state
        .repos
        .set_metadata(&req.owner, &req.repo, &meta)
        .map_err(|e| ApiError::internal(format!("set metadata failed: {e}")))?;

    info!(
        "accepted replication push for {}/{} from instance {}",
        req.owner, req.repo, req.instance_id
    );

    Ok(Json(OkResponse::ok()))
}

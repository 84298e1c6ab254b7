use serde::{Deserialize, Serialize};

use crate::types::{RepoId, RepoMetadata};

#[derive(Debug, Deserialize)]
pub struct RepoRequest {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateRepoResponse {
    pub success: bool,
    pub repo_path: String,
    pub clone_url: String,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub success: bool,
}

impl OkResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct ListReposResponse {
    pub success: bool,
    pub repos: Vec<RepoId>,
}

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub success: bool,
    pub metadata: RepoMetadata,
}

#[derive(Debug, Deserialize)]
pub struct RepoQuery {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub owner: Option<String>,
}

/// Origin → peer handshake establishing the replica-side credential.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterReplicationRequest {
    pub owner: String,
    pub repo: String,
    pub replica_url: String,
    pub token: String,
    pub origin_instance_id: String,
}

/// Origin → peer push of a complete repository bundle.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicateRequest {
    pub owner: String,
    pub repo: String,
    pub instance_id: String,
    pub invitation_key: String,
    /// Base64-encoded bundle of the full reachable graph.
    pub bundle: String,
    pub metadata: RepoMetadata,
}

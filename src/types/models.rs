use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A repository identity: a bare directory at `<root>/<owner>/<name>.git`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// An outbound replica target recorded on the origin side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replica {
    pub instance_id: String,
    pub url: String,
    pub token: String,
    pub invitation_key: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
}

/// Inbound provenance: presence marks the repository as a read-only replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSource {
    pub instance_id: String,
    pub invitation_key: String,
}

/// The per-repository metadata document, stored as `openhub.json` inside the
/// bare directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replicas: Vec<Replica>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_of: Option<ReplicaSource>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

impl Default for RepoMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            private: false,
            default_branch: default_branch(),
            created_at: epoch(),
            replicas: Vec::new(),
            replica_of: None,
        }
    }
}

impl RepoMetadata {
    /// True when pushes must be refused on every transport.
    #[must_use]
    pub fn is_replica(&self) -> bool {
        self.replica_of.is_some()
    }
}

/// A registered SSH public key, stored in authorized_keys form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKey {
    pub name: String,
    pub key: String,
    pub added_at: DateTime<Utc>,
}

/// An API token: 32 random bytes, hex-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub name: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub ssh_keys: Vec<SshKey>,
    #[serde(default)]
    pub api_tokens: Vec<ApiToken>,
    pub created_at: DateTime<Utc>,
}

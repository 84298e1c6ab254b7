use std::sync::Arc;

use axum::http::HeaderMap;
use base64::Engine as _;

use crate::server::AppState;
use crate::types::RepoMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    InvalidService,
    InvalidRepoName,
    RepoNotFound,
    ReadOnlyReplica,
    OwnerRequired,
    PrivateRepo,
    InternalError,
}

impl AccessError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::InvalidService | Self::InvalidRepoName => StatusCode::BAD_REQUEST,
            Self::RepoNotFound => StatusCode::NOT_FOUND,
            Self::ReadOnlyReplica => StatusCode::FORBIDDEN,
            Self::OwnerRequired | Self::PrivateRepo => StatusCode::UNAUTHORIZED,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidService => "Invalid service",
            Self::InvalidRepoName => "Invalid repository name",
            Self::RepoNotFound => "Repository not found",
            Self::ReadOnlyReplica => "cannot push: repository is a read-only replica",
            Self::OwnerRequired | Self::PrivateRepo => "unauthorized",
            Self::InternalError => "Internal server error",
        }
    }

    /// Auth failures challenge the client to retry with basic credentials.
    pub fn requires_auth_header(&self) -> bool {
        matches!(self, Self::OwnerRequired | Self::PrivateRepo)
    }
}

/// Resolve HTTP basic credentials to a username, treating anything invalid
/// as anonymous. The password field carries an API token; it must resolve to
/// the same username the client claimed.
pub fn authenticated_user(headers: &HeaderMap, state: &Arc<AppState>) -> String {
    let Some((username, password)) = basic_credentials(headers) else {
        return String::new();
    };

    match state.creds.validate_token(&password) {
        Ok(validated) if validated == username => username,
        _ => String::new(),
    }
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() || password.is_empty() {
        return None;
    }

    Some((username.to_string(), password.to_string()))
}

/// The access policy shared by both transports.
///
/// Writes require a non-replica repository and the owner; reads of a private
/// repository require the owner.
pub fn check_access(
    username: &str,
    owner: &str,
    meta: &RepoMetadata,
    is_write: bool,
) -> Result<(), AccessError> {
    if is_write {
        if meta.is_replica() {
            return Err(AccessError::ReadOnlyReplica);
        }
        if username != owner {
            return Err(AccessError::OwnerRequired);
        }
    } else if meta.private && username != owner {
        return Err(AccessError::PrivateRepo);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReplicaSource;

    fn replica_meta() -> RepoMetadata {
        RepoMetadata {
            replica_of: Some(ReplicaSource {
                instance_id: "origin".to_string(),
                invitation_key: "k".to_string(),
            }),
            ..RepoMetadata::default()
        }
    }

    #[test]
    fn owner_can_push() {
        let meta = RepoMetadata::default();
        assert!(check_access("alice", "alice", &meta, true).is_ok());
    }

    #[test]
    fn non_owner_push_requires_auth() {
        let meta = RepoMetadata::default();
        assert_eq!(
            check_access("bob", "alice", &meta, true),
            Err(AccessError::OwnerRequired)
        );
        assert_eq!(
            check_access("", "alice", &meta, true),
            Err(AccessError::OwnerRequired)
        );
    }

    #[test]
    fn replica_refuses_push_even_from_owner() {
        let meta = replica_meta();
        assert_eq!(
            check_access("alice", "alice", &meta, true),
            Err(AccessError::ReadOnlyReplica)
        );
    }

    #[test]
    fn anyone_reads_public() {
        let meta = RepoMetadata::default();
        assert!(check_access("", "alice", &meta, false).is_ok());
        assert!(check_access("bob", "alice", &meta, false).is_ok());
    }

    #[test]
    fn private_reads_are_owner_only() {
        let meta = RepoMetadata {
            private: true,
            ..RepoMetadata::default()
        };
        assert!(check_access("alice", "alice", &meta, false).is_ok());
        assert_eq!(
            check_access("bob", "alice", &meta, false),
            Err(AccessError::PrivateRepo)
        );
        assert_eq!(
            check_access("", "alice", &meta, false),
            Err(AccessError::PrivateRepo)
        );
    }

    #[test]
    fn replica_still_serves_reads() {
        let meta = replica_meta();
        assert!(check_access("", "alice", &meta, false).is_ok());
    }

    #[test]
    fn challenge_header_for_auth_errors_only() {
        assert!(AccessError::OwnerRequired.requires_auth_header());
        assert!(AccessError::PrivateRepo.requires_auth_header());
        assert!(!AccessError::ReadOnlyReplica.requires_auth_header());
        assert!(!AccessError::RepoNotFound.requires_auth_header());
    }
}

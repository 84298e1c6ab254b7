use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("repository not found: {0}")]
    RepoNotFound(String),

    #[error("repository already exists: {0}")]
    RepoExists(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user already exists: {0}")]
    UserExists(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid ssh key")]
    InvalidKey,

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("cannot add replica to a replica repository")]
    ReplicaOfReplica,

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("replica returned {status}: {body}")]
    ReplicaStatus { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, Error>;

//! # OpenHub
//!
//! A self-hosted git hosting server with asynchronous replication to
//! consenting peers, usable both as a standalone binary and as a library.
//!
//! Repositories live as bare git directories under a storage root, one
//! directory per owner, with a JSON metadata document inside each bare
//! repository. Clients clone and push over SSH (public-key auth) or smart
//! HTTP (basic auth with API tokens); a successful push enqueues a
//! replication job that ships a git bundle to every configured peer
//! instance.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use openhub::auth::FsCredentialStore;
//! use openhub::replication::ReplicationManager;
//! use openhub::server::{AppState, create_router};
//! use openhub::store::FsRepoStore;
//!
//! let repos = Arc::new(FsRepoStore::open("/var/lib/openhub/repos")?);
//! let creds = Arc::new(FsCredentialStore::open("/var/lib/openhub/repos")?);
//! let manager = ReplicationManager::new(repos.clone(), instance_id);
//! let state = Arc::new(AppState::new(repos, creds, manager, public_url));
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod instance;
pub mod replication;
pub mod server;
pub mod ssh;
pub mod store;
pub mod types;

//! SSH listener bootstrap and the [`russh::server::Server`] implementation.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::OsRng;
use russh::{MethodKind, MethodSet};
use russh::keys::ssh_key::private::{KeypairData, RsaKeypair};
use russh::keys::ssh_key::{LineEnding, PrivateKey};
use russh::server::{self, Server as _};
use tracing::info;

use super::session::SshSession;
use crate::auth::CredentialStore;
use crate::instance::set_restrictive_permissions;
use crate::replication::JobQueue;
use crate::store::RepoStore;

const HOST_KEY_FILE: &str = "ssh_host_key";
const HOST_KEY_BITS: usize = 2048;

/// Top-level SSH server that hands each incoming connection to an
/// [`SshSession`] handler.
pub struct SshServer {
    repos: Arc<dyn RepoStore>,
    creds: Arc<dyn CredentialStore>,
    queue: Arc<dyn JobQueue>,
}

impl SshServer {
    pub fn new(
        repos: Arc<dyn RepoStore>,
        creds: Arc<dyn CredentialStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            repos,
            creds,
            queue,
        }
    }
}

impl server::Server for SshServer {
    type Handler = SshSession;

    fn new_client(&mut self, peer_addr: Option<SocketAddr>) -> Self::Handler {
        tracing::debug!(peer = ?peer_addr, "new ssh client connection");
        SshSession::new(
            Arc::clone(&self.repos),
            Arc::clone(&self.creds),
            Arc::clone(&self.queue),
            peer_addr,
        )
    }

    fn handle_session_error(&mut self, error: <Self::Handler as server::Handler>::Error) {
        tracing::debug!(error = %error, "ssh session error");
    }
}

/// Load the persisted host key, or generate an RSA-2048 key at first boot
/// and store it under the storage root, mode 0600.
pub fn load_or_generate_host_key(storage_dir: &Path) -> Result<PrivateKey> {
    let path = storage_dir.join(HOST_KEY_FILE);

    if path.exists() {
        return PrivateKey::read_openssh_file(&path)
            .with_context(|| format!("parse host key at {}", path.display()));
    }

    let keypair =
        RsaKeypair::random(&mut OsRng, HOST_KEY_BITS).context("generate rsa host key")?;
    let key = PrivateKey::new(KeypairData::Rsa(keypair), "openhub host key")
        .context("assemble host key")?;

    let encoded = key.to_openssh(LineEnding::LF).context("encode host key")?;
    std::fs::write(&path, encoded.as_bytes())
        .with_context(|| format!("write host key to {}", path.display()))?;
    set_restrictive_permissions(&path);

    info!("generated new SSH host key at {}", path.display());
    Ok(key)
}

/// Start the SSH listener. Runs until the server is shut down or an
/// unrecoverable error occurs.
pub async fn start_ssh_server(
    port: u16,
    storage_dir: std::path::PathBuf,
    repos: Arc<dyn RepoStore>,
    creds: Arc<dyn CredentialStore>,
    queue: Arc<dyn JobQueue>,
) -> Result<()> {
    let host_key = load_or_generate_host_key(&storage_dir)?;

    let config = Arc::new(server::Config {
        methods: MethodSet::from(&[MethodKind::PublicKey][..]),
        keys: vec![host_key],
        inactivity_timeout: Some(Duration::from_secs(600)),
        auth_rejection_time: Duration::from_secs(1),
        auth_rejection_time_initial: Some(Duration::from_secs(0)),
        ..Default::default()
    });

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(address = %addr, "starting SSH server");

    let mut ssh_server = SshServer::new(repos, creds, queue);
    ssh_server
        .run_on_address(config, addr)
        .await
        .context("SSH server exited with error")?;

    Ok(())
}

//! Per-connection SSH session handler.
//!
//! Authentication is by public key against the credential store. Each
//! session accepts one channel, and that channel handles exactly one `exec`
//! request of the form `git-<verb> '<owner>/<name>[.git]'`. On allow, the
//! engine process is spawned with its standard streams piped to the channel;
//! a clean `git-receive-pack` exit enqueues a replication job.

use std::net::SocketAddr;
use std::process::Stdio;
use std::sync::Arc;

use russh::keys::ssh_key;
use russh::server::{Auth, Handler, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{info, warn};

use crate::auth::CredentialStore;
use crate::replication::JobQueue;
use crate::server::{AccessError, check_access};
use crate::server::validation::validate_name;
use crate::store::RepoStore;

pub struct SshSession {
    repos: Arc<dyn RepoStore>,
    creds: Arc<dyn CredentialStore>,
    queue: Arc<dyn JobQueue>,
    peer_addr: Option<SocketAddr>,
    username: Option<String>,
    channel: Option<Channel<Msg>>,
}

impl SshSession {
    pub fn new(
        repos: Arc<dyn RepoStore>,
        creds: Arc<dyn CredentialStore>,
        queue: Arc<dyn JobQueue>,
        peer_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            repos,
            creds,
            queue,
            peer_addr,
            username: None,
            channel: None,
        }
    }

    /// Write a refusal to the channel's stderr stream and close it with
    /// exit status 1.
    fn refuse(
        &self,
        session: &mut Session,
        channel_id: ChannelId,
        message: &str,
    ) -> Result<(), russh::Error> {
        session.extended_data(
            channel_id,
            1,
            CryptoVec::from_slice(format!("{message}\n").as_bytes()),
        )?;
        session.exit_status_request(channel_id, 1)?;
        session.close(channel_id)?;
        Ok(())
    }
}

/// Parse an exec payload such as `git-upload-pack 'alice/foo.git'` into the
/// verb and the `(owner, name)` pair. Any verb in the `git-` command family
/// is accepted here; the access check decides what it may do.
fn parse_exec_command(command: &str) -> Option<(String, String, String)> {
    let mut parts = command.split_whitespace();
    let verb = parts.next()?;
    let raw_path = parts.next()?;

    if !verb.starts_with("git-") {
        return None;
    }

    let path = raw_path.trim_matches(|c| c == '\'' || c == '"');
    let path = path.trim_start_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let (owner, name) = path.split_once('/')?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }

    Some((verb.to_string(), owner.to_string(), name.to_string()))
}

impl Handler for SshSession {
    type Error = russh::Error;

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &ssh_key::PublicKey,
    ) -> Result<Auth, Self::Error> {
        let Ok(offered) = public_key.to_openssh() else {
            return Ok(Auth::Reject {
                proceed_with_methods: None,
                partial_success: false,
            });
        };

        match self.creds.validate_key(&offered) {
            Ok(username) => {
                info!(
                    peer = ?self.peer_addr,
                    login = %user,
                    username = %username,
                    "ssh public-key authentication successful"
                );
                self.username = Some(username);
                Ok(Auth::Accept)
            }
            Err(_) => {
                warn!(peer = ?self.peer_addr, login = %user, "ssh key not recognized");
                Ok(Auth::Reject {
                    proceed_with_methods: None,
                    partial_success: false,
                })
            }
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        if self.channel.is_some() {
            return Ok(false);
        }
        self.channel = Some(channel);
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel_id: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).into_owned();
        let username = self.username.clone().unwrap_or_default();

        info!(
            peer = ?self.peer_addr,
            username = %username,
            command = %command,
            "ssh exec request"
        );

        session.channel_success(channel_id)?;

        let Some((verb, owner, name)) = parse_exec_command(&command) else {
            return self.refuse(session, channel_id, "invalid command");
        };

        if validate_name(&owner).is_err() || validate_name(&name).is_err() {
            return self.refuse(session, channel_id, "invalid repo path");
        }

        if !self.repos.exists(&owner, &name) {
            return self.refuse(session, channel_id, "repository not found");
        }

        let Ok(meta) = self.repos.get_metadata(&owner, &name) else {
            return self.refuse(session, channel_id, "error getting metadata");
        };

        let is_write = verb == "git-receive-pack";

        if let Err(e) = check_access(&username, &owner, &meta, is_write) {
            let message = match e {
                AccessError::ReadOnlyReplica => {
                    "permission denied: repository is a read-only replica"
                }
                AccessError::OwnerRequired => "permission denied: only owner can push",
                AccessError::PrivateRepo => "permission denied: private repository",
                _ => "permission denied",
            };
            return self.refuse(session, channel_id, message);
        }

        let Some(channel) = self.channel.take() else {
            return self.refuse(session, channel_id, "no session channel");
        };

        let repo_path = self.repos.repo_path(&owner, &name);
        let child = Command::new(&verb)
            .arg(&repo_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!("failed to spawn {verb}: {e}");
                return self.refuse(session, channel_id, &format!("command error: {e}"));
            }
        };

        let handle = session.handle();
        let enqueue = is_write.then(|| (Arc::clone(&self.queue), owner, name));

        tokio::spawn(async move {
            pipe_engine(channel, child, handle, channel_id, enqueue).await;
        });

        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel_id: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_failure(channel_id)?;
        Ok(())
    }
}

/// Pump bytes between the SSH channel and the engine process, then report
/// the exit status. A clean push exit enqueues the replication job.
async fn pipe_engine(
    channel: Channel<Msg>,
    mut child: tokio::process::Child,
    handle: russh::server::Handle,
    channel_id: ChannelId,
    enqueue: Option<(Arc<dyn JobQueue>, String, String)>,
) {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stream = channel.into_stream();
    let (mut chan_read, mut chan_write) = tokio::io::split(stream);

    let to_child = async {
        if let Some(mut stdin) = stdin {
            let _ = tokio::io::copy(&mut chan_read, &mut stdin).await;
            let _ = stdin.shutdown().await;
        }
    };

    let from_child = async {
        if let Some(mut stdout) = stdout {
            let _ = tokio::io::copy(&mut stdout, &mut chan_write).await;
        }
    };

    let errors = async {
        if let Some(mut stderr) = stderr {
            let mut buf = [0u8; 4096];
            while let Ok(n) = stderr.read(&mut buf).await {
                if n == 0 {
                    break;
                }
                if handle
                    .extended_data(channel_id, 1, CryptoVec::from_slice(&buf[..n]))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    };

    tokio::join!(to_child, from_child, errors);

    let code = match child.wait().await {
        Ok(status) => u32::try_from(status.code().unwrap_or(1)).unwrap_or(1),
        Err(e) => {
            warn!("engine wait failed: {e}");
            1
        }
    };

    let _ = handle.exit_status_request(channel_id, code).await;
    let _ = handle.eof(channel_id).await;
    let _ = handle.close(channel_id).await;

    if code == 0 {
        if let Some((queue, owner, name)) = enqueue {
            queue.enqueue(&owner, &name);
        }
    }
}

//! Asynchronous replication pipeline.
//!
//! Push handlers enqueue `(owner, name)` jobs onto a bounded channel drained
//! by a small worker pool. Each job bundles the full repository and POSTs it
//! to every enabled replica with a bearer token and the shared invitation
//! key. A periodic ticker re-enqueues every repository, which is both the
//! recovery path for dropped jobs and the reconciliation path for peers that
//! were briefly unreachable.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use chrono::Utc;
use tracing::{info, warn};

use crate::auth::generate_secret;
use crate::error::{Error, Result};
use crate::server::dto::{RegisterReplicationRequest, ReplicateRequest};
use crate::store::RepoStore;
use crate::types::{Replica, RepoId};

const QUEUE_CAPACITY: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_WORKERS: usize = 3;
pub const SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// The enqueue-only capability handed to the transport front ends.
pub trait JobQueue: Send + Sync {
    /// Non-blocking: a full queue drops the job with a warning. The periodic
    /// sync covers every repository, so a dropped job only delays a mirror.
    fn enqueue(&self, owner: &str, name: &str);
}

pub struct ReplicationManager {
    repos: Arc<dyn RepoStore>,
    instance_id: String,
    tx: async_channel::Sender<RepoId>,
    rx: async_channel::Receiver<RepoId>,
    client: reqwest::Client,
}

impl ReplicationManager {
    pub fn new(repos: Arc<dyn RepoStore>, instance_id: impl Into<String>) -> Arc<Self> {
        let (tx, rx) = async_channel::bounded(QUEUE_CAPACITY);

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("http client");

        Arc::new(Self {
            repos,
            instance_id: instance_id.into(),
            tx,
            rx,
            client,
        })
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Spawn the worker pool.
    pub fn start(self: &Arc<Self>, workers: usize) {
        for _ in 0..workers {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                while let Ok(job) = manager.rx.recv().await {
                    if let Err(e) = manager.replicate(&job.owner, &job.name).await {
                        warn!("replication failed for {job}: {e}");
                    }
                }
            });
        }
    }

    /// Spawn the periodic full sweep.
    pub fn start_periodic_sync(self: &Arc<Self>, interval: Duration) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick completes immediately
            loop {
                ticker.tick().await;
                info!("starting periodic replication sync");
                manager.sync_all();
            }
        });
    }

    /// Close the queue; workers finish their in-flight job and exit.
    pub fn stop(&self) {
        self.tx.close();
    }

    /// Enqueue every known repository.
    pub fn sync_all(&self) {
        match self.repos.list_all() {
            Ok(repos) => {
                for repo in repos {
                    self.enqueue(&repo.owner, &repo.name);
                }
            }
            Err(e) => warn!("periodic sync: list repos failed: {e}"),
        }
    }

    /// Run one replication job: bundle the repository and push it to every
    /// enabled replica. Per-replica failures are logged and skipped; the
    /// job's `last_synced` updates are persisted at the end.
    pub async fn replicate(&self, owner: &str, name: &str) -> Result<()> {
        let mut meta = self.repos.get_metadata(owner, name)?;

        if meta.replicas.is_empty() {
            return Ok(());
        }

        let bundle = crate::git::create_bundle(&self.repos.repo_path(owner, name)).await?;

        for replica in &mut meta.replicas {
            if !replica.enabled {
                continue;
            }

            info!("pushing {owner}/{name} to replica {}", replica.url);
            match self.push_to_replica(owner, name, replica, &bundle).await {
                Ok(()) => {
                    replica.last_synced = Some(Utc::now());
                    info!("replicated {owner}/{name} to {}", replica.url);
                }
                Err(e) => {
                    warn!("push to replica {} failed: {e}", replica.url);
                }
            }
        }

        self.repos.set_metadata(owner, name, &meta)?;
        Ok(())
    }

    async fn push_to_replica(
        &self,
        owner: &str,
        name: &str,
        replica: &Replica,
        bundle: &[u8],
    ) -> Result<()> {
        // Re-read so the peer sees current metadata, with the replica list
        // scrubbed: peers have no business knowing about each other.
        let mut meta = self.repos.get_metadata(owner, name)?;
        meta.replicas = Vec::new();

        let payload = ReplicateRequest {
            owner: owner.to_string(),
            repo: name.to_string(),
            instance_id: self.instance_id.clone(),
            invitation_key: replica.invitation_key.clone(),
            bundle: base64::engine::general_purpose::STANDARD.encode(bundle),
            metadata: meta,
        };

        let response = self
            .client
            .post(format!("{}/api/repos/replicate", replica.url))
            .bearer_auth(&replica.token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ReplicaStatus { status, body });
        }

        Ok(())
    }

    /// Origin side of the replica handshake: generate a bearer token and an
    /// invitation key, register the token with the peer, and record the
    /// replica locally. The invitation key is returned for out-of-band
    /// delivery to the replica's operator; it is never sent to the peer here.
    pub async fn register_replica(&self, owner: &str, name: &str, url: &str) -> Result<Replica> {
        let mut meta = self.repos.get_metadata(owner, name)?;

        if meta.is_replica() {
            return Err(Error::ReplicaOfReplica);
        }

        let token = generate_secret();
        let invitation_key = generate_secret();

        let request = RegisterReplicationRequest {
            owner: owner.to_string(),
            repo: name.to_string(),
            replica_url: url.to_string(),
            token: token.clone(),
            origin_instance_id: self.instance_id.clone(),
        };

        let response = self
            .client
            .post(format!("{url}/api/repos/register-replication"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ReplicaStatus { status, body });
        }

        let replica = Replica {
            instance_id: self.instance_id.clone(),
            url: url.to_string(),
            token,
            invitation_key,
            enabled: true,
            last_synced: None,
        };

        meta.replicas.push(replica.clone());
        self.repos.set_metadata(owner, name, &meta)?;

        Ok(replica)
    }
}

impl JobQueue for ReplicationManager {
    fn enqueue(&self, owner: &str, name: &str) {
        let job = RepoId::new(owner, name);
        if let Err(e) = self.tx.try_send(job) {
            match e {
                async_channel::TrySendError::Full(job) => {
                    warn!("replication queue full, dropping job for {job}");
                }
                async_channel::TrySendError::Closed(job) => {
                    warn!("replication queue closed, dropping job for {job}");
                }
            }
        }
    }
}

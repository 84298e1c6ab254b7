use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use openhub::auth::{CredentialStore, FsCredentialStore};
use openhub::instance::Instance;
use openhub::replication::ReplicationManager;
use openhub::server::{AppState, create_router};
use openhub::store::{FsRepoStore, RepoStore};

/// A complete in-process instance: file-backed stores on a temp dir, a
/// replication manager, and the HTTP surface bound to an ephemeral port.
pub struct TestInstance {
    pub storage: TempDir,
    pub base_url: String,
    pub instance_id: String,
    pub repos: Arc<dyn RepoStore>,
    pub creds: Arc<dyn CredentialStore>,
    pub manager: Arc<ReplicationManager>,
}

impl TestInstance {
    pub async fn start() -> Self {
        let storage = TempDir::new().expect("create temp dir");

        let repos: Arc<dyn RepoStore> =
            Arc::new(FsRepoStore::open(storage.path()).expect("open repo store"));
        let creds: Arc<dyn CredentialStore> =
            Arc::new(FsCredentialStore::open(storage.path()).expect("open credential store"));
        let instance = Instance::load_or_create(storage.path()).expect("load instance");

        let manager = ReplicationManager::new(Arc::clone(&repos), instance.id.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));

        let state = Arc::new(AppState::new(
            Arc::clone(&repos),
            Arc::clone(&creds),
            manager.clone(),
            base_url.clone(),
        ));

        let app = create_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        wait_for_ready(&base_url).await;

        Self {
            storage,
            base_url,
            instance_id: instance.id,
            repos,
            creds,
            manager,
        }
    }

    pub fn repo_path(&self, owner: &str, name: &str) -> std::path::PathBuf {
        self.repos.repo_path(owner, name)
    }
}

async fn wait_for_ready(base_url: &str) {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client
            .get(format!("{base_url}/health"))
            .send()
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    panic!("Server did not become ready");
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .expect("run git");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

/// Push a single commit on `main` into a bare repository via a scratch
/// working copy.
pub fn seed_commit(bare_path: &Path) {
    let workdir = TempDir::new().expect("create workdir");
    git(workdir.path(), &["init", "-b", "main", "."]);
    std::fs::write(workdir.path().join("README.md"), "# test\n").expect("write file");
    git(workdir.path(), &["add", "README.md"]);
    git(workdir.path(), &["commit", "-m", "initial commit"]);
    git(
        workdir.path(),
        &["push", bare_path.to_str().expect("utf8 path"), "main"],
    );
}

/// List the refs of a bare repository with `git show-ref`.
pub fn show_refs(bare_path: &Path) -> String {
    let output = Command::new("git")
        .args(["show-ref"])
        .current_dir(bare_path)
        .output()
        .expect("run git show-ref");
    String::from_utf8_lossy(&output.stdout).into_owned()
}

mod common;

use std::process::Command;

use reqwest::StatusCode;
use serde_json::{Value, json};

use common::{TestInstance, seed_commit};
use openhub::auth::CredentialStore;
use openhub::store::RepoStore;
use openhub::types::{RepoMetadata, ReplicaSource};

fn basic_auth(username: &str, token: &str) -> String {
    use base64::Engine as _;
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{token}"));
    format!("Basic {encoded}")
}

#[tokio::test]
async fn create_list_delete_repo() {
    let instance = TestInstance::start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/repos/create", instance.base_url))
        .json(&json!({"owner": "alice", "name": "foo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["repo_path"], json!("alice/foo.git"));
    assert!(instance.repos.exists("alice", "foo"));

    let body: Value = client
        .get(format!("{}/api/repos/list?owner=alice", instance.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["repos"][0]["owner"], json!("alice"));
    assert_eq!(body["repos"][0]["name"], json!("foo"));

    let resp = client
        .post(format!("{}/api/repos/delete", instance.base_url))
        .json(&json!({"owner": "alice", "name": "foo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!instance.repos.exists("alice", "foo"));
}

#[tokio::test]
async fn duplicate_create_conflicts() {
    let instance = TestInstance::start().await;
    let client = reqwest::Client::new();

    let create = || {
        client
            .post(format!("{}/api/repos/create", instance.base_url))
            .json(&json!({"owner": "alice", "name": "foo"}))
            .send()
    };

    assert_eq!(create().await.unwrap().status(), StatusCode::OK);

    let resp = create().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], json!(false));

    // The failed second call leaves the repository intact.
    assert!(instance.repos.exists("alice", "foo"));
}

#[tokio::test]
async fn invalid_names_rejected() {
    let instance = TestInstance::start().await;
    let client = reqwest::Client::new();

    for (owner, name) in [
        (".alice", "foo"),
        ("alice", "foo."),
        ("al ice", "foo"),
        ("alice", ""),
    ] {
        let resp = client
            .post(format!("{}/api/repos/create", instance.base_url))
            .json(&json!({"owner": owner, "name": name}))
            .send()
            .await
            .unwrap();
        assert_eq!(
            resp.status(),
            StatusCode::BAD_REQUEST,
            "{owner}/{name} should be rejected"
        );
    }
}

#[tokio::test]
async fn metadata_round_trip() {
    let instance = TestInstance::start().await;
    let client = reqwest::Client::new();

    instance.repos.create("alice", "foo").unwrap();

    let body: Value = client
        .get(format!(
            "{}/api/repos/metadata?owner=alice&name=foo",
            instance.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["metadata"]["default_branch"], json!("main"));
    assert_eq!(body["metadata"]["private"], json!(false));

    let mut metadata = body["metadata"].clone();
    metadata["description"] = json!("the foo repo");
    metadata["private"] = json!(true);

    let resp = client
        .post(format!(
            "{}/api/repos/metadata?owner=alice&name=foo",
            instance.base_url
        ))
        .json(&metadata)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let meta = instance.repos.get_metadata("alice", "foo").unwrap();
    assert_eq!(meta.description, "the foo repo");
    assert!(meta.private);
}

#[tokio::test]
async fn anonymous_ref_advertisement_on_public_repo() {
    let instance = TestInstance::start().await;
    instance.repos.create("alice", "foo").unwrap();
    seed_commit(&instance.repo_path("alice", "foo"));

    let resp = reqwest::Client::new()
        .get(format!(
            "{}/alice/foo.git/info/refs?service=git-upload-pack",
            instance.base_url
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["Content-Type"],
        "application/x-git-upload-pack-advertisement"
    );

    let body = resp.text().await.unwrap();
    assert!(body.starts_with("001e# service=git-upload-pack\n"));
    assert!(body.contains("refs/heads/main"));
}

#[tokio::test]
async fn private_read_challenges_anonymous_and_non_owner() {
    let instance = TestInstance::start().await;
    instance.repos.create("alice", "foo").unwrap();

    let mut meta = instance.repos.get_metadata("alice", "foo").unwrap();
    meta.private = true;
    instance.repos.set_metadata("alice", "foo", &meta).unwrap();

    instance.creds.create_user("bob").unwrap();
    let bob_token = instance.creds.generate_token("bob", "test").unwrap();

    let client = reqwest::Client::new();
    let url = format!(
        "{}/alice/foo.git/info/refs?service=git-upload-pack",
        instance.base_url
    );

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()["WWW-Authenticate"], "Basic realm=\"Git\"");

    let resp = client
        .get(&url)
        .header("Authorization", basic_auth("bob", &bob_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn owner_reads_private_repo() {
    let instance = TestInstance::start().await;
    instance.repos.create("alice", "foo").unwrap();
    seed_commit(&instance.repo_path("alice", "foo"));

    let mut meta = instance.repos.get_metadata("alice", "foo").unwrap();
    meta.private = true;
    instance.repos.set_metadata("alice", "foo", &meta).unwrap();

    instance.creds.create_user("alice").unwrap();
    let token = instance.creds.generate_token("alice", "test").unwrap();

    let resp = reqwest::Client::new()
        .get(format!(
            "{}/alice/foo.git/info/refs?service=git-upload-pack",
            instance.base_url
        ))
        .header("Authorization", basic_auth("alice", &token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn push_requires_owner_credentials() {
    let instance = TestInstance::start().await;
    instance.repos.create("alice", "foo").unwrap();

    instance.creds.create_user("bob").unwrap();
    let bob_token = instance.creds.generate_token("bob", "test").unwrap();

    let client = reqwest::Client::new();
    let url = format!("{}/alice/foo.git/git-receive-pack", instance.base_url);

    // Anonymous push gets the basic-auth challenge.
    let resp = client.post(&url).body(Vec::new()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()["WWW-Authenticate"], "Basic realm=\"Git\"");

    // So does a push by a non-owner with valid credentials.
    let resp = client
        .post(&url)
        .header("Authorization", basic_auth("bob", &bob_token))
        .body(Vec::new())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Bad credentials degrade to anonymous rather than leaking detail.
    let resp = client
        .post(&url)
        .header("Authorization", basic_auth("alice", "wrong-token"))
        .body(Vec::new())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn push_to_replica_is_forbidden() {
    let instance = TestInstance::start().await;
    instance.repos.create("alice", "foo").unwrap();

    let mut meta = instance.repos.get_metadata("alice", "foo").unwrap();
    meta.replica_of = Some(ReplicaSource {
        instance_id: "origin-instance".to_string(),
        invitation_key: "key".to_string(),
    });
    instance.repos.set_metadata("alice", "foo", &meta).unwrap();

    instance.creds.create_user("alice").unwrap();
    let token = instance.creds.generate_token("alice", "test").unwrap();

    let resp = reqwest::Client::new()
        .post(format!(
            "{}/alice/foo.git/git-receive-pack",
            instance.base_url
        ))
        .header("Authorization", basic_auth("alice", &token))
        .body(Vec::new())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test(flavor = "multi_thread")]
async fn owner_push_over_http_end_to_end() {
    let instance = TestInstance::start().await;
    instance.repos.create("alice", "foo").unwrap();

    instance.creds.create_user("alice").unwrap();
    let token = instance.creds.generate_token("alice", "test").unwrap();

    // Drive a real `git push` against the smart HTTP endpoint.
    let workdir = tempfile::TempDir::new().unwrap();
    let run = |args: &[&str]| {
        let status = Command::new("git")
            .args(args)
            .current_dir(workdir.path())
            .env("GIT_AUTHOR_NAME", "alice")
            .env("GIT_AUTHOR_EMAIL", "alice@example.com")
            .env("GIT_COMMITTER_NAME", "alice")
            .env("GIT_COMMITTER_EMAIL", "alice@example.com")
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    };

    run(&["init", "-b", "main", "."]);
    std::fs::write(workdir.path().join("README.md"), "hello\n").unwrap();
    run(&["add", "README.md"]);
    run(&["commit", "-m", "initial commit"]);

    let push_url = format!(
        "http://alice:{token}@{}/alice/foo.git",
        instance.base_url.strip_prefix("http://").unwrap()
    );
    run(&["push", &push_url, "main"]);

    // An anonymous fetch now advertises the pushed branch.
    let body = reqwest::Client::new()
        .get(format!(
            "{}/alice/foo.git/info/refs?service=git-upload-pack",
            instance.base_url
        ))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("refs/heads/main"));
}

#[tokio::test]
async fn metadata_missing_repo_is_not_found() {
    let instance = TestInstance::start().await;

    let resp = reqwest::Client::new()
        .get(format!(
            "{}/api/repos/metadata?owner=alice&name=gone",
            instance.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_repo_transport_routes_are_not_found() {
    let instance = TestInstance::start().await;

    let resp = reqwest::Client::new()
        .get(format!(
            "{}/alice/gone.git/info/refs?service=git-upload-pack",
            instance.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metadata_api_persists_replica_state() {
    // Metadata written through the API is persisted verbatim, replica_of
    // included; the transports then enforce the read-only rule.
    let instance = TestInstance::start().await;
    instance.repos.create("alice", "foo").unwrap();

    let meta = RepoMetadata {
        replica_of: Some(ReplicaSource {
            instance_id: "other".to_string(),
            invitation_key: "k".to_string(),
        }),
        ..RepoMetadata::default()
    };

    let resp = reqwest::Client::new()
        .post(format!(
            "{}/api/repos/metadata?owner=alice&name=foo",
            instance.base_url
        ))
        .json(&meta)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let loaded = instance.repos.get_metadata("alice", "foo").unwrap();
    assert!(loaded.is_replica());
}

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Subcommand;
use serde_json::{Value, json};

use super::parse_repo_arg;
use crate::config::{Config, api_url};
use crate::instance::Instance;
use crate::replication::ReplicationManager;
use crate::store::{FsRepoStore, RepoStore};

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Create a new repository
    CreateRepo { path: String },

    /// Delete a repository
    DeleteRepo { path: String },

    /// List repositories, optionally filtered by owner
    ListRepos { owner: Option<String> },

    /// Show repository metadata
    GetMetadata { path: String },

    /// Set the repository description
    SetDescription { path: String, description: String },

    /// Add a replica (auto-registers with the remote instance)
    AddReplica { path: String, url: String },

    /// Remove a replica by instance id
    RemoveReplica { path: String, instance_id: String },

    /// List configured replicas
    ListReplicas { path: String },

    /// Dump the replica configuration as JSON for disaster recovery
    RecoveryBundle { path: String },
}

pub async fn run_admin(command: AdminCommands) -> anyhow::Result<()> {
    match command {
        AdminCommands::CreateRepo { path } => create_repo(&path).await,
        AdminCommands::DeleteRepo { path } => delete_repo(&path).await,
        AdminCommands::ListRepos { owner } => list_repos(owner.as_deref()).await,
        AdminCommands::GetMetadata { path } => get_metadata(&path).await,
        AdminCommands::SetDescription { path, description } => {
            set_description(&path, &description).await
        }
        AdminCommands::AddReplica { path, url } => add_replica(&path, &url).await,
        AdminCommands::RemoveReplica { path, instance_id } => {
            remove_replica(&path, &instance_id)
        }
        AdminCommands::ListReplicas { path } => list_replicas(&path),
        AdminCommands::RecoveryBundle { path } => recovery_bundle(&path),
    }
}

fn api_error(body: &Value) -> anyhow::Error {
    match body.get("error").and_then(Value::as_str) {
        Some(message) => anyhow::anyhow!("{message}"),
        None => anyhow::anyhow!("unknown failure"),
    }
}

async fn post_api(path: &str, body: Value) -> anyhow::Result<Value> {
    let response = reqwest::Client::new()
        .post(format!("{}{path}", api_url()))
        .json(&body)
        .send()
        .await
        .context("request error")?;

    response.json().await.context("decode response")
}

async fn get_api(path: &str) -> anyhow::Result<Value> {
    let response = reqwest::Client::new()
        .get(format!("{}{path}", api_url()))
        .send()
        .await
        .context("request error")?;

    response.json().await.context("decode response")
}

async fn create_repo(path: &str) -> anyhow::Result<()> {
    let (owner, name) = parse_repo_arg(path)?;

    let body = post_api("/api/repos/create", json!({"owner": owner, "name": name})).await?;

    if body["success"].as_bool() != Some(true) {
        return Err(api_error(&body));
    }

    println!("Repository created: {owner}/{name}");
    if let Some(clone_url) = body["clone_url"].as_str() {
        println!("Clone URL: {clone_url}");
    }
    Ok(())
}

async fn delete_repo(path: &str) -> anyhow::Result<()> {
    let (owner, name) = parse_repo_arg(path)?;

    let body = post_api("/api/repos/delete", json!({"owner": owner, "name": name})).await?;

    if body["success"].as_bool() != Some(true) {
        return Err(api_error(&body));
    }

    println!("Repository deleted: {owner}/{name}");
    Ok(())
}

async fn list_repos(owner: Option<&str>) -> anyhow::Result<()> {
    let path = match owner {
        Some(owner) => format!("/api/repos/list?owner={owner}"),
        None => "/api/repos/list".to_string(),
    };

    let body = get_api(&path).await?;

    if body["success"].as_bool() != Some(true) {
        return Err(api_error(&body));
    }

    let repos = body["repos"].as_array().cloned().unwrap_or_default();
    if repos.is_empty() {
        println!("No repositories found");
        return Ok(());
    }

    for repo in repos {
        if let (Some(owner), Some(name)) = (repo["owner"].as_str(), repo["name"].as_str()) {
            println!("{owner}/{name}");
        }
    }
    Ok(())
}

async fn get_metadata(path: &str) -> anyhow::Result<()> {
    let (owner, name) = parse_repo_arg(path)?;

    let body = get_api(&format!("/api/repos/metadata?owner={owner}&name={name}")).await?;

    if body["success"].as_bool() != Some(true) {
        return Err(api_error(&body));
    }

    let metadata = &body["metadata"];
    println!("Repository: {owner}/{name}");
    println!(
        "Description: {}",
        metadata["description"].as_str().unwrap_or_default()
    );
    println!("Private: {}", metadata["private"].as_bool().unwrap_or(false));
    println!(
        "Default Branch: {}",
        metadata["default_branch"].as_str().unwrap_or_default()
    );
    println!(
        "Created: {}",
        metadata["created_at"].as_str().unwrap_or_default()
    );
    Ok(())
}

async fn set_description(path: &str, description: &str) -> anyhow::Result<()> {
    let (owner, name) = parse_repo_arg(path)?;

    let body = get_api(&format!("/api/repos/metadata?owner={owner}&name={name}")).await?;
    if body["success"].as_bool() != Some(true) {
        return Err(api_error(&body));
    }

    let mut metadata = body["metadata"].clone();
    metadata["description"] = Value::String(description.to_string());

    let body = post_api(
        &format!("/api/repos/metadata?owner={owner}&name={name}"),
        metadata,
    )
    .await?;

    if body["success"].as_bool() != Some(true) {
        return Err(api_error(&body));
    }

    println!("Description updated for {owner}/{name}");
    Ok(())
}

fn open_local_store() -> anyhow::Result<(Config, Arc<FsRepoStore>)> {
    let config = Config::from_env();
    let store = FsRepoStore::open(&config.storage_dir).context("storage init")?;
    Ok((config, Arc::new(store)))
}

async fn add_replica(path: &str, url: &str) -> anyhow::Result<()> {
    let (owner, name) = parse_repo_arg(path)?;
    let (config, store) = open_local_store()?;

    let instance = Instance::load_or_create(&config.storage_dir).context("load instance")?;
    let manager = ReplicationManager::new(store, instance.id);

    println!("Registering with replica...");
    let replica = manager
        .register_replica(&owner, &name, url)
        .await
        .context("replica registration failed")?;

    println!("Replica configured successfully");
    println!("URL: {}", replica.url);
    println!("Invitation Key: {}", replica.invitation_key);
    println!();
    println!("Share this invitation key with the replica administrator.");
    println!("They need it to accept replication from this origin.");
    println!("Replica will receive updates on push");
    Ok(())
}

fn remove_replica(path: &str, instance_id: &str) -> anyhow::Result<()> {
    let (owner, name) = parse_repo_arg(path)?;
    let (_config, store) = open_local_store()?;

    let mut meta = store.get_metadata(&owner, &name)?;

    let before = meta.replicas.len();
    meta.replicas.retain(|r| r.instance_id != instance_id);
    if meta.replicas.len() == before {
        bail!("replica with instance ID {instance_id} not found");
    }

    store.set_metadata(&owner, &name, &meta)?;
    println!("Replica removed from {owner}/{name}");
    Ok(())
}

fn list_replicas(path: &str) -> anyhow::Result<()> {
    let (owner, name) = parse_repo_arg(path)?;
    let (_config, store) = open_local_store()?;

    let meta = store.get_metadata(&owner, &name)?;

    if meta.replicas.is_empty() {
        println!("No replicas configured");
        return Ok(());
    }

    println!("Replicas for {owner}/{name}:");
    for (i, replica) in meta.replicas.iter().enumerate() {
        let status = if replica.enabled { "enabled" } else { "disabled" };
        println!("{}. URL: {}", i + 1, replica.url);
        println!("   Instance ID: {}", replica.instance_id);
        println!("   Invitation Key: {}", replica.invitation_key);
        println!("   Status: {status}");
        if let Some(last_synced) = replica.last_synced {
            println!("   Last Synced: {}", last_synced.format("%Y-%m-%d %H:%M:%S"));
        }
        println!();
    }
    Ok(())
}

fn recovery_bundle(path: &str) -> anyhow::Result<()> {
    let (owner, name) = parse_repo_arg(path)?;
    let (_config, store) = open_local_store()?;

    let meta = store.get_metadata(&owner, &name)?;

    let bundle = json!({
        "repo": format!("{owner}/{name}"),
        "replicas": meta.replicas,
    });

    println!("{}", serde_json::to_string_pretty(&bundle)?);
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use openhub::auth::{CredentialStore, FsCredentialStore};
use openhub::cli::{AdminCommands, UserCommands, run_admin, run_user};
use openhub::config::Config;
use openhub::instance::Instance;
use openhub::replication::{DEFAULT_WORKERS, ReplicationManager, SYNC_INTERVAL};
use openhub::server::{AppState, create_router};
use openhub::ssh::start_ssh_server;
use openhub::store::{FsRepoStore, RepoStore};

#[derive(Parser)]
#[command(name = "openhub")]
#[command(about = "Self-hosted git hosting with asynchronous replication", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the git server (SSH and HTTP listeners)
    Serve {
        /// SSH transport port
        #[arg(long, default_value_t = 2222)]
        ssh_port: u16,

        /// HTTP transport and API port
        #[arg(long, default_value_t = 3000)]
        http_port: u16,

        /// Storage root for repositories, users, and instance identity
        #[arg(long)]
        storage: Option<PathBuf>,
    },

    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// User management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

async fn run_serve(config: Config) -> anyhow::Result<()> {
    let repos: Arc<dyn RepoStore> = Arc::new(FsRepoStore::open(&config.storage_dir)?);
    let creds: Arc<dyn CredentialStore> = Arc::new(FsCredentialStore::open(&config.storage_dir)?);

    let instance = Instance::load_or_create(&config.storage_dir)?;
    info!("instance ID: {}", instance.id);

    let manager = ReplicationManager::new(Arc::clone(&repos), instance.id);
    manager.start(DEFAULT_WORKERS);
    manager.start_periodic_sync(SYNC_INTERVAL);
    info!("started replication workers and periodic sync");

    let ssh = tokio::spawn(start_ssh_server(
        config.ssh_port,
        config.storage_dir.clone(),
        Arc::clone(&repos),
        Arc::clone(&creds),
        manager.clone(),
    ));

    let state = Arc::new(AppState::new(
        repos,
        creds,
        manager,
        config.public_url(),
    ));
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.http_port));
    info!("starting HTTP server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let http = async move { axum::serve(listener, app).await };
    tokio::select! {
        result = http => result?,
        result = ssh => result??,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("openhub=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            ssh_port,
            http_port,
            storage,
        } => {
            let mut config = Config::from_env();
            config.ssh_port = ssh_port;
            config.http_port = http_port;
            if let Some(storage) = storage {
                config.storage_dir = storage;
            }

            run_serve(config).await?;
        }
        Commands::Admin { command } => run_admin(command).await?,
        Commands::User { command } => run_user(command)?,
    }

    Ok(())
}

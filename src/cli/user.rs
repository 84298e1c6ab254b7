use anyhow::Context;
use clap::Subcommand;

use crate::auth::{CredentialStore, FsCredentialStore};
use crate::config::Config;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a new user
    Create { username: String },

    /// Register an SSH public key for a user
    AddKey {
        username: String,
        name: String,
        key: String,
    },

    /// Generate an API token for a user
    GenerateToken { username: String, name: String },
}

pub fn run_user(command: UserCommands) -> anyhow::Result<()> {
    let config = Config::from_env();
    let store = FsCredentialStore::open(&config.storage_dir).context("auth store init")?;

    match command {
        UserCommands::Create { username } => {
            store.create_user(&username)?;
            println!("User created: {username}");
        }
        UserCommands::AddKey {
            username,
            name,
            key,
        } => {
            store.add_key(&username, &name, &key)?;
            println!("SSH key added for user {username}");
        }
        UserCommands::GenerateToken { username, name } => {
            let token = store.generate_token(&username, &name)?;
            println!("API token generated for user {username}:");
            println!("{token}");
            println!();
            println!("Use this token in API requests:");
            println!("  curl -H \"Authorization: Bearer <token>\" ...");
        }
    }

    Ok(())
}

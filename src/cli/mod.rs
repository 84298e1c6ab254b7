mod admin;
mod user;

pub use admin::{AdminCommands, run_admin};
pub use user::{UserCommands, run_user};

/// Split an `owner/name` argument into its two parts.
pub fn parse_repo_arg(path: &str) -> anyhow::Result<(String, String)> {
    match path.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => anyhow::bail!("invalid repo path, must be owner/name"),
    }
}

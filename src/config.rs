use std::path::PathBuf;

fn default_storage_dir() -> PathBuf {
    PathBuf::from("/var/lib/openhub/repos")
}

/// Runtime configuration for the server process.
///
/// Priority: CLI flags > environment > defaults. `OPENHUB_STORAGE` overrides
/// the storage root; listening ports default to 2222 (SSH) and 3000 (HTTP).
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_dir: PathBuf,
    pub ssh_port: u16,
    pub http_port: u16,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("OPENHUB_STORAGE") {
            if !dir.is_empty() {
                config.storage_dir = PathBuf::from(dir);
            }
        }
        config
    }

    /// Base URL clients use to reach the HTTP listener on this host.
    #[must_use]
    pub fn public_url(&self) -> String {
        format!("http://localhost:{}", self.http_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            ssh_port: 2222,
            http_port: 3000,
        }
    }
}

/// Target URL for the admin CLI, from `OPENHUB_API_URL`.
#[must_use]
pub fn api_url() -> String {
    std::env::var("OPENHUB_API_URL")
        .ok()
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| "http://localhost:3000".to_string())
}

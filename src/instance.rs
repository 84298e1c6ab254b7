use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Per-deployment identity, persisted as `instance.json` at the storage root.
/// The id is generated once at first boot and reused thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl Instance {
    pub fn load_or_create(storage_dir: &Path) -> Result<Self> {
        let path = storage_dir.join("instance.json");

        if let Ok(data) = fs::read(&path) {
            let instance: Instance = serde_json::from_slice(&data)?;
            return Ok(instance);
        }

        let instance = Instance {
            id: Uuid::new_v4().to_string(),
            name: "openhub-instance".to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let data = serde_json::to_vec_pretty(&instance)?;
        fs::write(&path, data)?;
        set_restrictive_permissions(&path);

        Ok(instance)
    }
}

#[cfg(unix)]
pub(crate) fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[cfg(not(unix))]
pub(crate) fn set_restrictive_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generates_id_on_first_boot() {
        let dir = TempDir::new().unwrap();
        let instance = Instance::load_or_create(dir.path()).unwrap();
        assert!(!instance.id.is_empty());
        assert!(dir.path().join("instance.json").exists());
    }

    #[test]
    fn reuses_existing_identity() {
        let dir = TempDir::new().unwrap();
        let first = Instance::load_or_create(dir.path()).unwrap();
        let second = Instance::load_or_create(dir.path()).unwrap();
        assert_eq!(first.id, second.id);
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;

use super::RepoStore;
use crate::error::{Error, Result};
use crate::types::{RepoId, RepoMetadata};

const METADATA_FILE: &str = "openhub.json";

/// File-backed repository store.
///
/// Layout: `<root>/<owner>/<name>.git/` bare repositories, each carrying an
/// `openhub.json` metadata document.
pub struct FsRepoStore {
    base_path: PathBuf,
}

impl FsRepoStore {
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn metadata_path(&self, owner: &str, name: &str) -> PathBuf {
        self.repo_path(owner, name).join(METADATA_FILE)
    }

    fn init_bare(&self, path: &Path) -> Result<()> {
        let output = Command::new("git")
            .args(["init", "--bare"])
            .arg(path)
            .output()?;

        if !output.status.success() {
            return Err(Error::Git {
                command: "init".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        // Keep the on-disk default branch in agreement with the metadata
        // default, regardless of the host git's init.defaultBranch.
        fs::write(path.join("HEAD"), "ref: refs/heads/main\n")?;

        Ok(())
    }
}

impl RepoStore for FsRepoStore {
    fn create(&self, owner: &str, name: &str) -> Result<()> {
        if self.exists(owner, name) {
            return Err(Error::RepoExists(format!("{owner}/{name}")));
        }

        let path = self.repo_path(owner, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        self.init_bare(&path)?;

        let meta = RepoMetadata {
            created_at: Utc::now(),
            ..RepoMetadata::default()
        };
        self.set_metadata(owner, name, &meta)?;

        Ok(())
    }

    fn delete(&self, owner: &str, name: &str) -> Result<()> {
        if !self.exists(owner, name) {
            return Err(Error::RepoNotFound(format!("{owner}/{name}")));
        }

        fs::remove_dir_all(self.repo_path(owner, name))?;
        Ok(())
    }

    fn exists(&self, owner: &str, name: &str) -> bool {
        self.repo_path(owner, name).is_dir()
    }

    fn repo_path(&self, owner: &str, name: &str) -> PathBuf {
        self.base_path.join(owner).join(format!("{name}.git"))
    }

    fn list_all(&self) -> Result<Vec<RepoId>> {
        let mut repos = Vec::new();

        for owner_entry in fs::read_dir(&self.base_path)? {
            let owner_entry = owner_entry?;
            if !owner_entry.file_type()?.is_dir() {
                continue;
            }

            let owner = owner_entry.file_name().to_string_lossy().into_owned();
            repos.extend(self.list_by_owner(&owner)?);
        }

        Ok(repos)
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<RepoId>> {
        let owner_path = self.base_path.join(owner);

        let entries = match fs::read_dir(&owner_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut repos = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let dir_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(name) = dir_name.strip_suffix(".git") {
                repos.push(RepoId::new(owner, name));
            }
        }

        Ok(repos)
    }

    fn get_metadata(&self, owner: &str, name: &str) -> Result<RepoMetadata> {
        if !self.exists(owner, name) {
            return Err(Error::RepoNotFound(format!("{owner}/{name}")));
        }

        match fs::read(self.metadata_path(owner, name)) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RepoMetadata::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn set_metadata(&self, owner: &str, name: &str, meta: &RepoMetadata) -> Result<()> {
        if !self.exists(owner, name) {
            return Err(Error::RepoNotFound(format!("{owner}/{name}")));
        }

        let data = serde_json::to_vec_pretty(meta)?;
        fs::write(self.metadata_path(owner, name), data)?;
        Ok(())
    }
}

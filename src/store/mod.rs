mod fs;

pub use fs::FsRepoStore;

use std::path::PathBuf;

use crate::error::Result;
use crate::types::{RepoId, RepoMetadata};

/// RepoStore defines the repository persistence interface.
///
/// Owner and repository names are treated as opaque path segments here; name
/// validation happens at every ingress point before the store is touched.
pub trait RepoStore: Send + Sync {
    /// Initialize a new bare repository with default metadata. Fails if the
    /// repository already exists.
    fn create(&self, owner: &str, name: &str) -> Result<()>;

    /// Recursively remove the bare repository directory.
    fn delete(&self, owner: &str, name: &str) -> Result<()>;

    fn exists(&self, owner: &str, name: &str) -> bool;

    fn repo_path(&self, owner: &str, name: &str) -> PathBuf;

    fn list_all(&self) -> Result<Vec<RepoId>>;

    fn list_by_owner(&self, owner: &str) -> Result<Vec<RepoId>>;

    /// Read the metadata document. An existing repository with a missing
    /// metadata file yields defaults rather than an error.
    fn get_metadata(&self, owner: &str, name: &str) -> Result<RepoMetadata>;

    /// Whole-file replacement of the metadata document. Not atomic across
    /// concurrent writers.
    fn set_metadata(&self, owner: &str, name: &str, meta: &RepoMetadata) -> Result<()>;
}

mod fs;
mod token;

pub use fs::{FsCredentialStore, normalize_ssh_key};
pub use token::generate_secret;

use crate::error::Result;
use crate::types::User;

/// CredentialStore defines the user credential interface.
///
/// Token and key validation map a presented credential back to a username;
/// both scan linearly across user records, which is acceptable at the
/// intended deployment scale of dozens of users.
pub trait CredentialStore: Send + Sync {
    fn get_user(&self, username: &str) -> Result<User>;

    fn create_user(&self, username: &str) -> Result<()>;

    /// Create a user whose sole API token is the supplied value. Used by the
    /// replication handshake to provision peer credentials.
    fn create_user_with_token(&self, username: &str, token_name: &str, token: &str) -> Result<()>;

    fn add_key(&self, username: &str, name: &str, key: &str) -> Result<()>;

    /// Generate, persist, and return a fresh API token for the user.
    fn generate_token(&self, username: &str, name: &str) -> Result<String>;

    /// Resolve an API token to its owning username.
    fn validate_token(&self, token: &str) -> Result<String>;

    /// Resolve an SSH public key (authorized_keys form) to its owning
    /// username. Comparison is exact-match on the normalized key.
    fn validate_key(&self, key: &str) -> Result<String>;
}

use std::fs;
use std::path::PathBuf;

use chrono::Utc;

use super::CredentialStore;
use super::token::generate_secret;
use crate::error::{Error, Result};
use crate::instance::set_restrictive_permissions;
use crate::types::{ApiToken, SshKey, User};

/// File-backed credential store: one JSON document per user under
/// `<root>/users/<username>.json`, mode 0600.
pub struct FsCredentialStore {
    base_path: PathBuf,
}

impl FsCredentialStore {
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(base_path.join("users"))?;
        Ok(Self { base_path })
    }

    fn user_path(&self, username: &str) -> PathBuf {
        self.base_path.join("users").join(format!("{username}.json"))
    }

    fn save_user(&self, user: &User) -> Result<()> {
        let path = self.user_path(&user.username);
        let data = serde_json::to_vec_pretty(user)?;
        fs::write(&path, data)?;
        set_restrictive_permissions(&path);
        Ok(())
    }

    fn scan_users<T>(&self, mut visit: impl FnMut(&User) -> Option<T>) -> Result<Option<T>> {
        for entry in fs::read_dir(self.base_path.join("users"))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(username) = file_name.strip_suffix(".json") else {
                continue;
            };

            let Ok(user) = self.get_user(username) else {
                continue;
            };

            if let Some(found) = visit(&user) {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }
}

impl CredentialStore for FsCredentialStore {
    fn get_user(&self, username: &str) -> Result<User> {
        match fs::read(self.user_path(username)) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::UserNotFound(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create_user(&self, username: &str) -> Result<()> {
        if self.get_user(username).is_ok() {
            return Err(Error::UserExists(username.to_string()));
        }

        self.save_user(&User {
            username: username.to_string(),
            ssh_keys: Vec::new(),
            api_tokens: Vec::new(),
            created_at: Utc::now(),
        })
    }

    fn create_user_with_token(&self, username: &str, token_name: &str, token: &str) -> Result<()> {
        if self.get_user(username).is_ok() {
            return Err(Error::UserExists(username.to_string()));
        }

        self.save_user(&User {
            username: username.to_string(),
            ssh_keys: Vec::new(),
            api_tokens: vec![ApiToken {
                name: token_name.to_string(),
                token: token.to_string(),
                created_at: Utc::now(),
            }],
            created_at: Utc::now(),
        })
    }

    fn add_key(&self, username: &str, name: &str, key: &str) -> Result<()> {
        let mut user = self.get_user(username)?;

        user.ssh_keys.push(SshKey {
            name: name.to_string(),
            key: key.to_string(),
            added_at: Utc::now(),
        });

        self.save_user(&user)
    }

    fn generate_token(&self, username: &str, name: &str) -> Result<String> {
        let mut user = self.get_user(username)?;

        let token = generate_secret();
        user.api_tokens.push(ApiToken {
            name: name.to_string(),
            token: token.clone(),
            created_at: Utc::now(),
        });

        self.save_user(&user)?;
        Ok(token)
    }

    fn validate_token(&self, token: &str) -> Result<String> {
        let found = self.scan_users(|user| {
            user.api_tokens
                .iter()
                .any(|t| t.token == token)
                .then(|| user.username.clone())
        })?;

        found.ok_or(Error::InvalidToken)
    }

    fn validate_key(&self, key: &str) -> Result<String> {
        let normalized = normalize_ssh_key(key);

        let found = self.scan_users(|user| {
            user.ssh_keys
                .iter()
                .any(|k| normalize_ssh_key(&k.key) == normalized)
                .then(|| user.username.clone())
        })?;

        found.ok_or(Error::InvalidKey)
    }
}

/// Reduce an authorized_keys line to its algorithm and base64 body,
/// discarding the optional trailing comment.
#[must_use]
pub fn normalize_ssh_key(key: &str) -> String {
    let mut fields = key.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(algo), Some(body)) => format!("{algo} {body}"),
        _ => key.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KEY_A: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIGJsYWNrYm94 alice@laptop";
    const KEY_B: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIHdoaXRlYm94";

    fn open_store() -> (TempDir, FsCredentialStore) {
        let dir = TempDir::new().unwrap();
        let store = FsCredentialStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn create_and_get_user() {
        let (_dir, store) = open_store();
        store.create_user("alice").unwrap();

        let user = store.get_user("alice").unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.ssh_keys.is_empty());
        assert!(user.api_tokens.is_empty());
    }

    #[test]
    fn duplicate_user_conflicts() {
        let (_dir, store) = open_store();
        store.create_user("alice").unwrap();
        assert!(matches!(
            store.create_user("alice"),
            Err(Error::UserExists(_))
        ));
    }

    #[test]
    fn token_generation_and_validation() {
        let (_dir, store) = open_store();
        store.create_user("alice").unwrap();

        let token = store.generate_token("alice", "laptop").unwrap();
        assert_eq!(token.len(), 64);
        assert_eq!(store.validate_token(&token).unwrap(), "alice");
        assert!(matches!(
            store.validate_token("not-a-token"),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn token_maps_to_owning_user() {
        let (_dir, store) = open_store();
        store.create_user("alice").unwrap();
        store.create_user("bob").unwrap();

        let alice_token = store.generate_token("alice", "t").unwrap();
        let bob_token = store.generate_token("bob", "t").unwrap();

        assert_eq!(store.validate_token(&alice_token).unwrap(), "alice");
        assert_eq!(store.validate_token(&bob_token).unwrap(), "bob");
    }

    #[test]
    fn key_validation_ignores_comment() {
        let (_dir, store) = open_store();
        store.create_user("alice").unwrap();
        store.add_key("alice", "laptop", KEY_A).unwrap();

        // Same key presented without the comment field still matches.
        let without_comment = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIGJsYWNrYm94";
        assert_eq!(store.validate_key(without_comment).unwrap(), "alice");

        assert!(matches!(store.validate_key(KEY_B), Err(Error::InvalidKey)));
    }

    #[test]
    fn create_user_with_token_seeds_single_token() {
        let (_dir, store) = open_store();
        store
            .create_user_with_token("replication-alice-foo-xyz", "replication", "sekrit")
            .unwrap();

        let user = store.get_user("replication-alice-foo-xyz").unwrap();
        assert_eq!(user.api_tokens.len(), 1);
        assert_eq!(
            store.validate_token("sekrit").unwrap(),
            "replication-alice-foo-xyz"
        );
    }

    #[test]
    fn normalize_strips_comment_only() {
        assert_eq!(normalize_ssh_key("algo body comment"), "algo body");
        assert_eq!(normalize_ssh_key("algo body"), "algo body");
        assert_eq!(normalize_ssh_key("  solo  "), "solo");
    }
}

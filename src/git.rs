//! Invocation layer for the git engine processes.
//!
//! Everything the rest of the crate needs from git goes through here: the
//! stateless-RPC services behind the smart HTTP transport, ref
//! advertisement, and bundle creation/application for replication.

use std::path::Path;
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitService {
    UploadPack,
    ReceivePack,
}

impl GitService {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "git-upload-pack" => Some(Self::UploadPack),
            "git-receive-pack" => Some(Self::ReceivePack),
            _ => None,
        }
    }

    pub fn command_name(&self) -> &'static str {
        match self {
            Self::UploadPack => "git-upload-pack",
            Self::ReceivePack => "git-receive-pack",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::UploadPack => "application/x-git-upload-pack-result",
            Self::ReceivePack => "application/x-git-receive-pack-result",
        }
    }

    pub fn advertisement_content_type(&self) -> &'static str {
        match self {
            Self::UploadPack => "application/x-git-upload-pack-advertisement",
            Self::ReceivePack => "application/x-git-receive-pack-advertisement",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::ReceivePack)
    }
}

/// Run a service in stateless-RPC mode against a bare repository, feeding
/// `input` to its stdin and collecting the full output.
pub async fn run_service(
    repo_path: &Path,
    service: GitService,
    advertise_refs: bool,
    input: Option<&[u8]>,
) -> Result<Output> {
    let mut cmd = Command::new(service.command_name());
    cmd.arg("--stateless-rpc");

    if advertise_refs {
        cmd.arg("--advertise-refs");
    }

    cmd.arg(repo_path);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn()?;

    if let Some(data) = input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(data).await?;
        }
    }

    Ok(child.wait_with_output().await?)
}

/// Produce a self-contained bundle of every reference in the repository,
/// written to stdout by `git bundle create - --all`.
pub async fn create_bundle(repo_path: &Path) -> Result<Vec<u8>> {
    let output = Command::new("git")
        .args(["bundle", "create", "-", "--all"])
        .current_dir(repo_path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(Error::Git {
            command: "bundle".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(output.stdout)
}

/// Apply a bundle file to a bare repository, overwriting every reference.
pub async fn fetch_bundle(repo_path: &Path, bundle_path: &Path) -> Result<()> {
    let output = Command::new("git")
        .arg("fetch")
        .arg(bundle_path)
        .arg("refs/*:refs/*")
        .current_dir(repo_path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(Error::Git {
            command: "fetch".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(())
}

/// The pkt-line service announcement that precedes a ref advertisement in
/// the smart HTTP protocol: a length-prefixed `# service=<name>` packet
/// followed by a flush packet.
#[must_use]
pub fn format_pkt_line_header(service: GitService) -> Vec<u8> {
    let service_line = format!("# service={}\n", service.command_name());
    let length = service_line.len() + 4;
    let mut result = format!("{length:04x}{service_line}").into_bytes();
    result.extend_from_slice(b"0000");
    result
}

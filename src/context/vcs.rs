use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

pub const NOT_A_REPOSITORY: &str = "Not a Git repository";
pub const STATUS_UNAVAILABLE: &str = "Git repository detected (unable to read status)";

/// Read-only version-control queries. Each call may fail on its own.
#[async_trait]
pub trait VcsProbe: Send + Sync {
    async fn branch(&self, root: &Path) -> Result<String>;
    async fn status(&self, root: &Path) -> Result<String>;
    async fn remote(&self, root: &Path) -> Result<String>;
}

/// Shells out to the `git` binary.
pub struct GitProbe;

impl GitProbe {
    async fn run(&self, root: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(root)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run git {}: {}", args.join(" "), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl VcsProbe for GitProbe {
    async fn branch(&self, root: &Path) -> Result<String> {
        self.run(root, &["branch", "--show-current"]).await
    }

    async fn status(&self, root: &Path) -> Result<String> {
        self.run(root, &["status", "--short"]).await
    }

    async fn remote(&self, root: &Path) -> Result<String> {
        self.run(root, &["remote", "-v"]).await
    }
}

/// Summarise the repository at `root`. Never fails: probe errors turn into fixed text.
pub async fn describe(probe: &dyn VcsProbe, root: &Path) -> String {
    if !root.join(".git").exists() {
        return NOT_A_REPOSITORY.to_string();
    }

    let branch = match probe.branch(root).await {
        Ok(branch) => branch,
        Err(e) => {
            warn!("Reading branch failed: {:#}", e);
            return STATUS_UNAVAILABLE.to_string();
        }
    };
    let status = match probe.status(root).await {
        Ok(status) => status,
        Err(e) => {
            warn!("Reading status failed: {:#}", e);
            return STATUS_UNAVAILABLE.to_string();
        }
    };
    let remote = probe.remote(root).await.unwrap_or_else(|e| {
        debug!("No remote: {:#}", e);
        String::new()
    });

    let mut lines = vec![format!("Current branch: {}", branch.trim())];
    if let Some(first) = remote.trim().lines().next() {
        lines.push(format!("Remote: {}", first));
    }
    if status.trim().is_empty() {
        lines.push("Working tree clean".to_string());
    } else {
        lines.push(format!("Modified files:\n{}", status.trim()));
    }
    lines.join("\n")
}

//! Source control client
//!
//! Clones the repository under test into a fresh working directory. The
//! `git` binary is driven through [`ProcessCommand`] so its output ends up in
//! the log like any other phase.

use std::path::Path;

use async_trait::async_trait;

use crate::executor::ProcessCommand;

/// Fetches a repository into a local directory
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Clones `branch` of `url` into `dest`; failures are logged and reported as `false`
    async fn clone_repository(&self, url: &str, branch: &str, dest: &Path) -> bool;
}

/// [`SourceControl`] backed by the `git` command line
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    depth: Option<u32>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            depth: Some(1),
        }
    }
}

impl GitCli {
    /// Shallow-cloning git client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different git executable
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the clone depth; `None` fetches full history
    #[must_use]
    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        self.depth = depth;
        self
    }

    /// Command that performs the clone
    #[must_use]
    pub fn clone_command(&self, url: &str, branch: &str, dest: &Path) -> ProcessCommand {
        let mut command = ProcessCommand::new(&self.program).args([
            "clone",
            "--branch",
            branch,
            "--single-branch",
            "--recurse-submodules",
        ]);
        if let Some(depth) = self.depth {
            command = command
                .arg("--depth")
                .arg(depth.to_string())
                .arg("--shallow-submodules");
        }
        command.arg(url).arg(dest.to_string_lossy())
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn clone_repository(&self, url: &str, branch: &str, dest: &Path) -> bool {
        tracing::info!(url, branch, dest = %dest.display(), "Cloning repository");

        let mut stream = match self.clone_command(url, branch, dest).spawn() {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(url, error = %e, "Failed to start git");
                return false;
            }
        };
        while let Some(line) = stream.next_line().await {
            tracing::debug!(target: "git", "{line}");
        }

        match stream.finish().await {
            Ok(outcome) if outcome.is_success() => true,
            Ok(outcome) => {
                tracing::error!(
                    url,
                    branch,
                    exit_code = outcome.exit_code,
                    last = outcome.last_line().unwrap_or_default(),
                    "Clone failed"
                );
                false
            }
            Err(e) => {
                tracing::error!(url, error = %e, "Clone failed");
                false
            }
        }
    }
}

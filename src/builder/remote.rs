//! Hosts reached over an SSH session: Mac and remote Linux
//!
//! The working copy is uploaded under the host's work root, phase
//! directories live next to it, and artifacts are downloaded into the local
//! result layout before evaluation.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use uuid::Uuid;

use super::phases::PhaseHost;
use crate::executor::{HealthStatus, OutputStream, RemoteTransport, SshSession};
use crate::infrastructure::{Config, RemoteHostSettings};
use crate::model::{BuildError, EngineVersion, HostKind};
use crate::paths::{CommandLine, ToolchainPaths, join, phase_label};

/// Toolchain host behind an [`SshSession`] owned by one builder
#[derive(Debug)]
pub struct RemoteShellHost {
    kind: HostKind,
    session: SshSession,
    engine_base: String,
    work_root: String,
    project: String,
    environment: BTreeMap<String, String>,
    workspace: Option<String>,
    repository: Option<String>,
}

impl RemoteShellHost {
    /// Creates the host; nothing connects until first use
    pub fn new(
        kind: HostKind,
        settings: &RemoteHostSettings,
        engine_base: impl Into<String>,
        config: &Config,
    ) -> Self {
        Self {
            kind,
            session: SshSession::new(settings.connection.to_target()),
            engine_base: engine_base.into(),
            work_root: settings.work_root.clone(),
            project: config.project.name.clone(),
            environment: config.environment.clone(),
            workspace: None,
            repository: None,
        }
    }

    /// Session used by this host
    pub fn session(&self) -> &SshSession {
        &self.session
    }

    /// Remote workspace, once staged
    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    /// Script run on the remote shell for `command`
    #[must_use]
    pub fn script(&self, command: &CommandLine) -> Vec<String> {
        let mut lines: Vec<String> = self
            .environment
            .iter()
            .map(|(key, value)| format!("export {key}={}", shell_words::quote(value)))
            .collect();
        let invocation = command.to_shell();
        lines.push(match &self.repository {
            Some(repo) => format!("cd {} && {invocation}", shell_words::quote(repo)),
            None => invocation,
        });
        lines
    }
}

#[async_trait]
impl PhaseHost for RemoteShellHost {
    fn kind(&self) -> HostKind {
        self.kind
    }

    fn engine_base(&self) -> &str {
        &self.engine_base
    }

    async fn stage(&mut self, base: &Path, version: EngineVersion) -> Result<String, BuildError> {
        let platform = self.kind.platform();
        let id = Uuid::new_v4().simple().to_string();
        let workspace = join(
            platform,
            &self.work_root,
            &[&format!("{}_{}_{}", self.project, phase_label(platform, version), &id[..8])],
        );
        let repository = join(platform, &workspace, &["repo"]);

        self.session.create_directory(&workspace).await?;
        self.workspace = Some(workspace);
        self.session.upload_directory(base, &repository).await?;
        tracing::debug!(
            host = %self.session.target().host,
            from = %base.display(),
            to = %repository,
            "Working copy uploaded"
        );
        self.repository = Some(repository.clone());
        Ok(repository)
    }

    fn result_root(&self) -> String {
        let platform = self.kind.platform();
        match &self.workspace {
            Some(workspace) => join(platform, workspace, &["results"]),
            None => join(platform, &self.work_root, &["results"]),
        }
    }

    async fn create_directories(&self, dirs: &[&str]) -> Result<(), BuildError> {
        for dir in dirs {
            self.session.create_directory(dir).await?;
        }
        Ok(())
    }

    async fn readiness(&self, _paths: &ToolchainPaths) -> HealthStatus {
        self.session.health_check().await
    }

    async fn execute(&self, command: &CommandLine) -> Result<OutputStream, BuildError> {
        Ok(self.session.execute(&self.script(command)).await?)
    }

    async fn fetch_file(&self, host_path: &str, local: &Path) -> Result<(), BuildError> {
        Ok(self.session.download_file(host_path, local).await?)
    }

    async fn fetch_directory(&self, host_path: &str, local: &Path) -> Result<(), BuildError> {
        Ok(self.session.download_directory(host_path, local).await?)
    }

    async fn deliver(
        &self,
        host_dir: &str,
        _local_dir: &Path,
        destination: &str,
    ) -> Result<(), BuildError> {
        Ok(self.session.copy_directory(host_dir, destination).await?)
    }

    async fn cleanup(&mut self) {
        if let Some(workspace) = self.workspace.take()
            && !self.session.is_disposed()
        {
            if let Err(e) = self.session.delete_directory(&workspace).await {
                tracing::warn!(
                    host = %self.session.target().host,
                    path = %workspace,
                    error = %e,
                    "Cannot remove remote workspace"
                );
            }
        }
        self.repository = None;
        self.session.dispose().await;
    }
}

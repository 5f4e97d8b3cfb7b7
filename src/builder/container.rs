//! Linux host running each phase in a one-shot container
//!
//! The working copy is a local staging copy bind-mounted at `/project`; the
//! local result root is mounted at `/results`, so artifacts land directly in
//! the local layout and nothing needs fetching.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::phases::PhaseHost;
use super::windows::local_workspace;
use crate::executor::{ContainerSession, HealthStatus, OutputStream, RemoteTransport, VolumeMount};
use crate::infrastructure::{Config, FileSystem};
use crate::model::{BuildError, EngineVersion, HostKind};
use crate::paths::{CONTAINER_PROJECT_ROOT, CONTAINER_RESULT_ROOT, CommandLine, ToolchainPaths};

/// Container-backed Linux host
#[derive(Debug)]
pub struct ContainerHost {
    config: Arc<Config>,
    fs: Arc<dyn FileSystem>,
    staging: Option<PathBuf>,
    session: Option<ContainerSession>,
}

impl ContainerHost {
    /// Creates the host
    pub fn new(config: Arc<Config>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            config,
            fs,
            staging: None,
            session: None,
        }
    }

    /// Container session, once staged
    pub fn session(&self) -> Option<&ContainerSession> {
        self.session.as_ref()
    }

    /// Session for `version` with the staging copy and result root mounted
    #[must_use]
    pub fn session_for(&self, staging: &Path, version: EngineVersion) -> ContainerSession {
        let settings = &self.config.linux.container;
        ContainerSession::new(settings.runtime, settings.image_for(version))
            .with_volume(VolumeMount::new(
                absolute(staging).display().to_string(),
                CONTAINER_PROJECT_ROOT,
            ))
            .with_volume(VolumeMount::new(
                absolute(&self.config.result_path).display().to_string(),
                CONTAINER_RESULT_ROOT,
            ))
            .with_env(&self.config.environment)
            .with_workdir(CONTAINER_PROJECT_ROOT)
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[async_trait]
impl PhaseHost for ContainerHost {
    fn kind(&self) -> HostKind {
        HostKind::LinuxContainer
    }

    fn engine_base(&self) -> &str {
        ""
    }

    async fn stage(&mut self, base: &Path, version: EngineVersion) -> Result<String, BuildError> {
        let dir = local_workspace(&self.config, HostKind::LinuxContainer, version);
        let files = self
            .fs
            .copy_directory(base, &dir)
            .map_err(|e| BuildError::filesystem(&dir, e))?;
        tracing::debug!(from = %base.display(), to = %dir.display(), files, "Staging copy created");

        let session = self.session_for(&dir, version);
        tracing::debug!(image = session.image(), "Container session ready");
        self.session = Some(session);
        self.staging = Some(dir);
        Ok(CONTAINER_PROJECT_ROOT.to_string())
    }

    fn result_root(&self) -> String {
        CONTAINER_RESULT_ROOT.to_string()
    }

    async fn create_directories(&self, _dirs: &[&str]) -> Result<(), BuildError> {
        Ok(())
    }

    async fn readiness(&self, _paths: &ToolchainPaths) -> HealthStatus {
        match &self.session {
            Some(session) => session.health_check().await,
            None => HealthStatus::Unhealthy {
                reason: "no staged working copy".to_string(),
            },
        }
    }

    async fn execute(&self, command: &CommandLine) -> Result<OutputStream, BuildError> {
        let session = self.session.as_ref().ok_or(BuildError::NotPrepared)?;
        Ok(session.execute(&[command.to_shell()]).await?)
    }

    async fn fetch_file(&self, _host_path: &str, _local: &Path) -> Result<(), BuildError> {
        Ok(())
    }

    async fn fetch_directory(&self, _host_path: &str, _local: &Path) -> Result<(), BuildError> {
        Ok(())
    }

    async fn deliver(
        &self,
        _host_dir: &str,
        local_dir: &Path,
        destination: &str,
    ) -> Result<(), BuildError> {
        let destination = Path::new(destination);
        self.fs
            .copy_directory(local_dir, destination)
            .map(|_| ())
            .map_err(|e| BuildError::filesystem(destination, e))
    }

    async fn cleanup(&mut self) {
        self.session = None;
        if let Some(dir) = self.staging.take()
            && let Err(e) = self.fs.delete_directory(&dir)
        {
            tracing::warn!(path = %dir.display(), error = %e, "Cannot remove staging copy");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::config;
    use crate::executor::ContainerRuntime;
    use crate::infrastructure::LocalFileSystem;
    use pretty_assertions::assert_eq;

    fn host(dir: &Path) -> ContainerHost {
        let mut config = config(&dir.join("results"), true);
        config.temp_path = dir.join("tmp");
        config.linux.container.runtime = ContainerRuntime::Podman;
        config.environment.insert("UE_SDKS".into(), "/sdks".into());
        ContainerHost::new(Arc::new(config), Arc::new(LocalFileSystem::new()))
    }

    #[tokio::test]
    async fn test_stage_mounts_staging_copy_and_results() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("Sample.uproject"), "{}").unwrap();

        let mut host = host(dir.path());
        let root = host.stage(&src, EngineVersion::Ue5_4).await.unwrap();
        assert_eq!(root, "/project");
        assert_eq!(host.result_root(), "/results");

        let session = host.session().unwrap();
        assert_eq!(session.image(), "ghcr.io/epicgames/unreal-engine:dev-slim-5.4");
        let mounts: Vec<&str> = session.volumes().iter().map(|v| v.container.as_str()).collect();
        assert_eq!(mounts, vec!["/project", "/results"]);

        let staged = PathBuf::from(&session.volumes()[0].host);
        assert!(staged.join("Sample.uproject").is_file());

        let line = session.run_command_line("true");
        assert_eq!(line.program, "podman");
        assert!(line.args.contains(&"UE_SDKS=/sdks".to_string()));

        host.cleanup().await;
        assert!(!staged.exists());
        assert!(host.session().is_none());
    }

    #[tokio::test]
    async fn test_unstaged_host_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(dir.path());
        let paths = ToolchainPaths::resolve(
            HostKind::LinuxContainer,
            EngineVersion::Ue5_4,
            "",
            "/project",
            "Sample",
            None,
        );
        assert!(!host.readiness(&paths).await.is_healthy());
        assert_eq!(paths.engine_root, "/home/ue4/UnrealEngine");
        assert!(matches!(
            host.execute(&CommandLine::new("true", Vec::<String>::new())).await,
            Err(BuildError::NotPrepared)
        ));
    }
}

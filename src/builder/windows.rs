//! Local Windows host

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::phases::PhaseHost;
use crate::executor::{HealthStatus, OutputStream, ProcessCommand};
use crate::infrastructure::{Config, FileSystem};
use crate::model::{BuildError, EngineVersion, HostKind};
use crate::paths::{CommandLine, ToolchainPaths, phase_label};

/// Runs the toolchain as local processes on a copy under the temp root
#[derive(Debug)]
pub struct WindowsHost {
    config: Arc<Config>,
    fs: Arc<dyn FileSystem>,
    workspace: Option<PathBuf>,
}

impl WindowsHost {
    /// Creates the host
    pub fn new(config: Arc<Config>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            config,
            fs,
            workspace: None,
        }
    }

    /// Local working copy, once staged
    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }
}

/// `<temp>/<Project>_<Platform>_<Version>_<id>`, unique per builder
pub(crate) fn local_workspace(config: &Config, host: HostKind, version: EngineVersion) -> PathBuf {
    let id = Uuid::new_v4().simple().to_string();
    config.temp_path.join(format!(
        "{}_{}_{}",
        config.project.name,
        phase_label(host.platform(), version),
        &id[..8]
    ))
}

#[async_trait]
impl PhaseHost for WindowsHost {
    fn kind(&self) -> HostKind {
        HostKind::Windows
    }

    fn engine_base(&self) -> &str {
        &self.config.windows.engine_base
    }

    async fn stage(&mut self, base: &Path, version: EngineVersion) -> Result<String, BuildError> {
        let dir = local_workspace(&self.config, HostKind::Windows, version);
        let files = self
            .fs
            .copy_directory(base, &dir)
            .map_err(|e| BuildError::filesystem(&dir, e))?;
        tracing::debug!(from = %base.display(), to = %dir.display(), files, "Working copy created");
        let root = dir.display().to_string();
        self.workspace = Some(dir);
        Ok(root)
    }

    fn result_root(&self) -> String {
        self.config.result_path.display().to_string()
    }

    async fn create_directories(&self, dirs: &[&str]) -> Result<(), BuildError> {
        for dir in dirs {
            self.fs
                .create_directory(Path::new(dir))
                .map_err(|e| BuildError::filesystem(*dir, e))?;
        }
        Ok(())
    }

    async fn readiness(&self, paths: &ToolchainPaths) -> HealthStatus {
        if self.fs.file_exists(Path::new(&paths.build_script)) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy {
                reason: format!("build script not found at {}", paths.build_script),
            }
        }
    }

    async fn execute(&self, command: &CommandLine) -> Result<OutputStream, BuildError> {
        let mut process = ProcessCommand::from_line(command).envs(&self.config.environment);
        if let Some(dir) = &self.workspace {
            process = process.current_dir(dir);
        }
        Ok(process.spawn()?)
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
        if let Some(dir) = self.workspace.take() {
            match self.fs.delete_directory(&dir) {
                Ok(()) => tracing::debug!(path = %dir.display(), "Working copy removed"),
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "Cannot remove working copy");
                }
            }
        }
    }
}

//! One-shot container runs
//!
//! [`ContainerSession`] turns a script into a single `docker run --rm` (or
//! `podman run --rm`) invocation with the configured image, bind mounts and
//! environment, and streams it through the local process transport. No state
//! survives between calls.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::process::ProcessCommand;
use super::stream::OutputStream;
use super::traits::{HealthStatus, RemoteTransport};
use crate::model::TransportError;
use crate::paths::CommandLine;

/// Container runtime type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    /// Docker runtime
    #[default]
    Docker,
    /// Podman runtime
    Podman,
}

impl ContainerRuntime {
    /// Runtime executable name
    #[must_use]
    pub fn command(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command())
    }
}

/// Host directory bound into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Path on the host
    pub host: String,
    /// Path inside the container
    pub container: String,
}

impl VolumeMount {
    /// Creates a bind mount
    #[must_use]
    pub fn new(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }
}

/// Stateless container-run transport
#[derive(Debug, Clone)]
pub struct ContainerSession {
    runtime: ContainerRuntime,
    image: String,
    volumes: Vec<VolumeMount>,
    env: BTreeMap<String, String>,
    workdir: Option<String>,
}

impl ContainerSession {
    /// Creates a session running `image` on `runtime`
    #[must_use]
    pub fn new(runtime: ContainerRuntime, image: impl Into<String>) -> Self {
        Self {
            runtime,
            image: image.into(),
            volumes: Vec::new(),
            env: BTreeMap::new(),
            workdir: None,
        }
    }

    /// Adds a bind mount
    #[must_use]
    pub fn with_volume(mut self, mount: VolumeMount) -> Self {
        self.volumes.push(mount);
        self
    }

    /// Adds environment variables passed with `-e`
    #[must_use]
    pub fn with_env<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    /// Sets the working directory inside the container
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Image this session runs
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Bind mounts of this session
    #[must_use]
    pub fn volumes(&self) -> &[VolumeMount] {
        &self.volumes
    }

    /// Full `run` command line for an inline shell script
    #[must_use]
    pub fn run_command_line(&self, script: &str) -> CommandLine {
        let mut args = vec!["run".to_string(), "--rm".to_string()];

        // For Podman, use cgroups v2 compatibility
        if matches!(self.runtime, ContainerRuntime::Podman) {
            args.push("--cgroup-manager=cgroupfs".to_string());
        }

        for mount in &self.volumes {
            args.push("-v".to_string());
            args.push(format!("{}:{}", mount.host, mount.container));
        }
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        if let Some(workdir) = &self.workdir {
            args.push("-w".to_string());
            args.push(workdir.clone());
        }
        args.push(self.image.clone());
        args.push("sh".to_string());
        args.push("-c".to_string());
        args.push(script.to_string());

        CommandLine::new(self.runtime.command(), args)
    }
}

#[async_trait]
impl RemoteTransport for ContainerSession {
    async fn health_check(&self) -> HealthStatus {
        let runtime = self.runtime.command();

        match ProcessCommand::new(runtime).arg("--version").output().await {
            Ok(o) if o.is_success() => {}
            _ => {
                return HealthStatus::Unhealthy {
                    reason: format!("{runtime} is not available"),
                };
            }
        }

        match ProcessCommand::new(runtime).arg("info").output().await {
            Ok(o) if o.is_success() => HealthStatus::Healthy,
            Ok(o) => HealthStatus::Unhealthy {
                reason: format!(
                    "{runtime} daemon may not be running (exit code {})",
                    o.exit_code
                ),
            },
            Err(e) => HealthStatus::Unhealthy {
                reason: format!("{runtime} error: {e}"),
            },
        }
    }

    async fn execute(&self, script: &[String]) -> Result<OutputStream, TransportError> {
        let line = self.run_command_line(&script.join("\n"));
        tracing::debug!(runtime = %self.runtime, image = %self.image, "Starting container");
        ProcessCommand::from_line(&line).spawn()
    }
}

//! Platform builders
//!
//! A [`Builder`] drives one (platform, engine version) pair through
//! prepare → init → build → test → package → cleanup. There is a single
//! implementation, [`PlatformBuilder`], parameterized by a [`PhaseHost`] that
//! knows how to reach the toolchain:
//!
//! | builder | host | transport |
//! |---|---|---|
//! | [`WindowsBuilder`] | [`WindowsHost`] | local processes |
//! | [`MacBuilder`], [`LinuxRemoteBuilder`] | [`RemoteShellHost`] | SSH session |
//! | [`LinuxContainerBuilder`] | [`ContainerHost`] | one-shot containers |
//!
//! Builders never raise: failures are logged and reflected in the returned
//! [`BuildResult`].

mod container;
mod factory;
mod phases;
mod remote;
mod windows;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

pub use container::ContainerHost;
pub use factory::{BuilderConstructor, BuilderContext, BuilderFactory};
pub use phases::{PhaseContext, PhaseHost};
pub use remote::RemoteShellHost;
pub use windows::WindowsHost;

use crate::infrastructure::{Config, FileSystem};
use crate::model::{BuildResult, EngineVersion, HostKind, PhaseStatus};
use crate::paths::PackageKind;

/// Windows builder
pub type WindowsBuilder = PlatformBuilder<WindowsHost>;
/// Mac builder over SSH
pub type MacBuilder = PlatformBuilder<RemoteShellHost>;
/// Linux builder over SSH
pub type LinuxRemoteBuilder = PlatformBuilder<RemoteShellHost>;
/// Linux builder running in containers
pub type LinuxContainerBuilder = PlatformBuilder<ContainerHost>;

/// Where a builder is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Nothing done yet
    Created,
    /// Working copy is in place
    RepositoryPrepared,
    /// Result directories exist
    DirectoriesInitialized,
    /// Build ran (or was refused by preflight)
    BuildComplete(PhaseStatus),
    /// Tests ran
    TestComplete(PhaseStatus),
    /// Packaging ran
    PackageComplete(PhaseStatus),
    /// Working copy removed
    CleanedUp,
}

/// What the package phase produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Packaged plugin
    Plugin,
    /// Cooked and archived project
    Project,
}

impl Flow {
    /// Package directory kind for this flow
    #[must_use]
    pub fn package_kind(self) -> PackageKind {
        match self {
            Self::Plugin => PackageKind::Plugin,
            Self::Project => PackageKind::Project,
        }
    }
}

/// Builds, tests and packages on one platform
#[async_trait]
pub trait Builder: Send {
    /// Builder variant
    fn host(&self) -> HostKind;

    /// Current lifecycle state
    fn state(&self) -> BuilderState;

    /// Makes a working copy of `base` for `version`; false if that failed
    async fn prepare_repository(&mut self, base: &Path, version: EngineVersion) -> bool;

    /// Creates result directories for `version`; idempotent
    async fn init_directory(&mut self, version: EngineVersion) -> bool;

    /// Plugin flow: build, test, package the plugin
    async fn run(&mut self, version: EngineVersion) -> BuildResult;

    /// Project flow: build, test, cook and archive the project
    async fn run_package(&mut self, version: EngineVersion) -> BuildResult;

    /// Removes the working copy and releases remote resources
    async fn cleanup_temp_directory(&mut self);
}

/// The [`Builder`] implementation, generic over how the host is reached
#[derive(Debug)]
pub struct PlatformBuilder<H> {
    host: H,
    config: Arc<Config>,
    fs: Arc<dyn FileSystem>,
    state: BuilderState,
    prepared: Option<(EngineVersion, String)>,
    context: Option<PhaseContext>,
}

impl<H: PhaseHost> PlatformBuilder<H> {
    /// Creates a builder around `host`
    pub fn new(host: H, config: Arc<Config>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            host,
            config,
            fs,
            state: BuilderState::Created,
            prepared: None,
            context: None,
        }
    }

    /// Host this builder drives
    pub fn host_ref(&self) -> &H {
        &self.host
    }

    /// Paths resolved by the last successful [`Builder::init_directory`]
    pub fn context(&self) -> Option<&PhaseContext> {
        self.context.as_ref()
    }

    /// Working copy root if prepared for `version`
    fn prepared_for(&self, version: EngineVersion) -> Option<&str> {
        match &self.prepared {
            Some((v, root)) if *v == version => Some(root),
            _ => None,
        }
    }

    async fn execute_flow(&mut self, version: EngineVersion, flow: Flow) -> BuildResult {
        let host = self.host.kind();
        if self.prepared_for(version).is_none() {
            tracing::warn!(
                %host,
                %version,
                prepared = ?self.prepared.as_ref().map(|(v, _)| *v),
                "Builder is not prepared for this version"
            );
            return BuildResult::none();
        }

        let needs_init = self
            .context
            .as_ref()
            .is_none_or(|ctx| ctx.version() != version);
        if needs_init && !self.init_directory(version).await {
            return BuildResult::build_failed();
        }
        let Some(ctx) = self.context.clone() else {
            return BuildResult::build_failed();
        };

        tracing::info!(%host, %version, ?flow, "Starting phases");
        phases::run_phases(
            &self.host,
            &self.config,
            self.fs.as_ref(),
            &ctx,
            flow,
            &mut self.state,
        )
        .await
    }
}

#[async_trait]
impl<H: PhaseHost> Builder for PlatformBuilder<H> {
    fn host(&self) -> HostKind {
        self.host.kind()
    }

    fn state(&self) -> BuilderState {
        self.state
    }

    async fn prepare_repository(&mut self, base: &Path, version: EngineVersion) -> bool {
        let host = self.host.kind();
        if let Some((prepared, _)) = &self.prepared {
            if *prepared == version {
                return true;
            }
            tracing::warn!(%host, %version, %prepared, "Builder already holds another version");
            return false;
        }

        match self.host.stage(base, version).await {
            Ok(root) => {
                tracing::info!(%host, %version, repository = %root, "Repository prepared");
                self.prepared = Some((version, root));
                self.state = BuilderState::RepositoryPrepared;
                true
            }
            Err(e) => {
                tracing::error!(%host, %version, error = %e, "Failed to prepare repository");
                false
            }
        }
    }

    async fn init_directory(&mut self, version: EngineVersion) -> bool {
        let host = self.host.kind();
        let Some(repo_root) = self.prepared_for(version) else {
            tracing::warn!(%host, %version, "Cannot initialize directories before preparing");
            return false;
        };

        let ctx = PhaseContext::resolve(
            host,
            version,
            self.host.engine_base(),
            repo_root,
            &self.host.result_root(),
            &self.config,
        );

        for dir in ctx.local.directories() {
            if let Err(e) = self.fs.create_directory(dir) {
                tracing::error!(%host, %version, path = %dir.display(), error = %e, "Cannot create result directory");
                return false;
            }
        }
        if let Err(e) = self.host.create_directories(&ctx.host_layout.directories()).await {
            tracing::error!(%host, %version, error = %e, "Cannot create host directories");
            return false;
        }

        tracing::info!(
            %host,
            %version,
            engine = %ctx.paths.engine_root,
            project = %ctx.paths.project_file,
            build = %ctx.host_layout.build,
            tests = %ctx.host_layout.tests,
            packages = %ctx.host_layout.packages,
            "Directories initialized"
        );
        self.context = Some(ctx);
        if self.state == BuilderState::RepositoryPrepared {
            self.state = BuilderState::DirectoriesInitialized;
        }
        true
    }

    async fn run(&mut self, version: EngineVersion) -> BuildResult {
        self.execute_flow(version, Flow::Plugin).await
    }

    async fn run_package(&mut self, version: EngineVersion) -> BuildResult {
        self.execute_flow(version, Flow::Project).await
    }

    async fn cleanup_temp_directory(&mut self) {
        if self.state == BuilderState::CleanedUp {
            return;
        }
        self.host.cleanup().await;
        self.prepared = None;
        self.context = None;
        self.state = BuilderState::CleanedUp;
        tracing::debug!(host = %self.host.kind(), "Builder cleaned up");
    }
}

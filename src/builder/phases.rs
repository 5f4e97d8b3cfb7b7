//! Build, test and package phases shared by every platform builder
//!
//! A [`PhaseHost`] knows how to reach one kind of toolchain host. The phase
//! functions here only talk to that trait, the synthesized paths in a
//! [`PhaseContext`], and the local filesystem.

use std::path::Path;

use async_trait::async_trait;

use super::{BuilderState, Flow};
use crate::evaluator;
use crate::executor::{CommandOutcome, HealthStatus, OutputStream};
use crate::infrastructure::{Config, FileSystem, PhaseLog};
use crate::model::{BuildError, BuildResult, EditorPlatform, EngineVersion, HostKind, PhaseStatus};
use crate::paths::{self, CommandLine, HostLayout, LocalLayout, PackageKind, ToolchainPaths};

/// One way of reaching a toolchain host
#[async_trait]
pub trait PhaseHost: Send + Sync {
    /// Builder variant this host implements
    fn kind(&self) -> HostKind;

    /// Directory holding the engine installations
    fn engine_base(&self) -> &str;

    /// Makes `base` available to the toolchain for `version`
    ///
    /// Returns the working copy root as the toolchain sees it.
    async fn stage(&mut self, base: &Path, version: EngineVersion) -> Result<String, BuildError>;

    /// Result root as the toolchain sees it
    fn result_root(&self) -> String;

    /// Creates toolchain-side directories
    async fn create_directories(&self, dirs: &[&str]) -> Result<(), BuildError>;

    /// Readiness probe run before the first phase
    async fn readiness(&self, paths: &ToolchainPaths) -> HealthStatus;

    /// Starts `command` in the working copy
    async fn execute(&self, command: &CommandLine) -> Result<OutputStream, BuildError>;

    /// Brings a toolchain-side file into the local result layout
    async fn fetch_file(&self, host_path: &str, local: &Path) -> Result<(), BuildError>;

    /// Brings a toolchain-side directory into the local result layout
    async fn fetch_directory(&self, host_path: &str, local: &Path) -> Result<(), BuildError>;

    /// Copies a finished package to its delivery destination
    async fn deliver(
        &self,
        host_dir: &str,
        local_dir: &Path,
        destination: &str,
    ) -> Result<(), BuildError>;

    /// Removes the working copy and releases connections; never fails
    async fn cleanup(&mut self);
}

/// Everything synthesized for one host and engine version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseContext {
    /// Toolchain paths
    pub paths: ToolchainPaths,
    /// Phase directories on the toolchain host
    pub host_layout: HostLayout,
    /// Phase directories in the local result root
    pub local: LocalLayout,
}

impl PhaseContext {
    /// Resolves all paths for `host` running `version` on the working copy at `repo_root`
    #[must_use]
    pub fn resolve(
        host: HostKind,
        version: EngineVersion,
        engine_base: &str,
        repo_root: &str,
        host_result_root: &str,
        config: &Config,
    ) -> Self {
        let platform = host.platform();
        Self {
            paths: ToolchainPaths::resolve(
                host,
                version,
                engine_base,
                repo_root,
                &config.project.name,
                config.project.plugin_name.as_deref(),
            ),
            host_layout: HostLayout::resolve(platform, host_result_root, version),
            local: LocalLayout::resolve(&config.result_path, platform, version),
        }
    }

    /// Editor platform
    #[must_use]
    pub fn platform(&self) -> EditorPlatform {
        self.paths.platform()
    }

    /// Engine version
    #[must_use]
    pub fn version(&self) -> EngineVersion {
        self.paths.version
    }
}

/// Runs `command`, teeing every line into `log`
async fn run_logged<H: PhaseHost + ?Sized>(
    host: &H,
    command: &CommandLine,
    log: &mut PhaseLog,
) -> Result<CommandOutcome, BuildError> {
    log.note(&format!("Running {command}")).await;
    let mut stream = host.execute(command).await?;
    while let Some(line) = stream.next_line().await {
        log.line(&line).await;
    }
    let outcome = stream.finish().await?;
    log.note(&format!("Exit code {}", outcome.exit_code)).await;
    Ok(outcome)
}

/// Preflight, build, then the enabled test and package phases
///
/// Test and package only run after a successful build. `state` tracks the
/// last completed phase.
pub(crate) async fn run_phases<H: PhaseHost + ?Sized>(
    host: &H,
    config: &Config,
    fs: &dyn FileSystem,
    ctx: &PhaseContext,
    flow: Flow,
    state: &mut BuilderState,
) -> BuildResult {
    let platform = ctx.platform();
    let version = ctx.version();
    let mut result = BuildResult::none();

    if let HealthStatus::Unhealthy { reason } = host.readiness(&ctx.paths).await {
        tracing::error!(%platform, %version, %reason, "Host is not ready, skipping all phases");
        let mut log = PhaseLog::create(&ctx.local.build_log(), platform, version, "build").await;
        log.note(&format!("Host is not ready: {reason}")).await;
        log.finish().await;
        result.status_of_build = PhaseStatus::Failed;
        *state = BuilderState::BuildComplete(PhaseStatus::Failed);
        return result;
    }

    result.status_of_build = build(host, config, ctx).await;
    *state = BuilderState::BuildComplete(result.status_of_build);
    tracing::info!(%platform, %version, status = %result.status_of_build, "Build finished");
    if !result.status_of_build.is_success() {
        return result;
    }

    if config.phases.test {
        result.status_of_test = test(host, config, fs, ctx).await;
        *state = BuilderState::TestComplete(result.status_of_test);
        tracing::info!(%platform, %version, status = %result.status_of_test, "Tests finished");
    }

    if config.phases.package {
        let kind = flow.package_kind();
        result.status_of_package = match flow {
            Flow::Plugin => package_plugin(host, config, fs, ctx).await,
            Flow::Project => package_project(host, config, fs, ctx).await,
        };
        *state = BuilderState::PackageComplete(result.status_of_package);
        tracing::info!(%platform, %version, status = %result.status_of_package, "Packaging finished");

        if result.status_of_package.is_success() {
            deliver(host, config, ctx, kind).await;
        }
    }

    result
}

async fn build<H: PhaseHost + ?Sized>(host: &H, config: &Config, ctx: &PhaseContext) -> PhaseStatus {
    let mut log =
        PhaseLog::create(&ctx.local.build_log(), ctx.platform(), ctx.version(), "build").await;
    let command = paths::editor_build(&ctx.paths, &config.project.name);

    let status = match run_logged(host, &command, &mut log).await {
        Ok(outcome) => PhaseStatus::from_check(outcome.is_success()),
        Err(e) => {
            log.note(&format!("Build could not run: {e}")).await;
            PhaseStatus::Failed
        }
    };
    log.finish().await;
    status
}

async fn test<H: PhaseHost + ?Sized>(
    host: &H,
    config: &Config,
    fs: &dyn FileSystem,
    ctx: &PhaseContext,
) -> PhaseStatus {
    let mut log =
        PhaseLog::create(&ctx.local.test_log(), ctx.platform(), ctx.version(), "test").await;
    let report = ctx.local.test_report();
    if let Err(e) = fs.delete_file(&report) {
        tracing::warn!(path = %report.display(), error = %e, "Cannot remove stale test report");
    }

    let command = paths::automation_test(&ctx.paths, config.test_filter(), &ctx.host_layout.tests);
    if let Err(e) = run_logged(host, &command, &mut log).await {
        log.note(&format!("Tests could not run: {e}")).await;
        log.finish().await;
        return PhaseStatus::Failed;
    }

    if let Err(e) = host.fetch_file(&ctx.host_layout.test_report, &report).await {
        log.note(&format!("Test report not retrieved: {e}")).await;
    }
    let status = evaluator::evaluate_test_report(&report);
    log.note(&format!("Test report {}: {status}", report.display())).await;
    log.finish().await;
    status
}

async fn package_plugin<H: PhaseHost + ?Sized>(
    host: &H,
    config: &Config,
    fs: &dyn FileSystem,
    ctx: &PhaseContext,
) -> PhaseStatus {
    let platform = ctx.platform();
    let mut log = PhaseLog::create(&ctx.local.package_log(), platform, ctx.version(), "package").await;

    let Some(plugin) = config.project.plugin_name.as_deref() else {
        log.note("No plugin is configured").await;
        log.finish().await;
        return PhaseStatus::Failed;
    };
    let host_dir = ctx.host_layout.package_dir(platform, PackageKind::Plugin);
    let targets = paths::package_targets(platform, &config.game_platforms);
    let Some(command) = paths::plugin_package(&ctx.paths, &host_dir, &targets) else {
        log.note("No plugin descriptor to package").await;
        log.finish().await;
        return PhaseStatus::Failed;
    };

    let local_dir = ctx.local.package_dir(PackageKind::Plugin);
    clear_local(fs, &local_dir);
    let status = match run_logged(host, &command, &mut log).await {
        Ok(_) => {
            if let Err(e) = host.fetch_directory(&host_dir, &local_dir).await {
                log.note(&format!("Package not retrieved: {e}")).await;
            }
            evaluator::evaluate_plugin_manifest(&ctx.local.plugin_manifest(plugin), ctx.version())
        }
        Err(e) => {
            log.note(&format!("Packaging could not run: {e}")).await;
            PhaseStatus::Failed
        }
    };
    log.finish().await;
    status
}

async fn package_project<H: PhaseHost + ?Sized>(
    host: &H,
    config: &Config,
    fs: &dyn FileSystem,
    ctx: &PhaseContext,
) -> PhaseStatus {
    let platform = ctx.platform();
    let mut log = PhaseLog::create(&ctx.local.package_log(), platform, ctx.version(), "package").await;
    let host_dir = ctx.host_layout.package_dir(platform, PackageKind::Project);
    let local_dir = ctx.local.package_dir(PackageKind::Project);
    clear_local(fs, &local_dir);

    for target in paths::package_targets(platform, &config.game_platforms) {
        let command = paths::project_package(&ctx.paths, target, &host_dir);
        match run_logged(host, &command, &mut log).await {
            Ok(outcome) if !outcome.is_success() => {
                log.note(&format!("Packaging for {target} exited with {}", outcome.exit_code))
                    .await;
            }
            Ok(_) => {}
            Err(e) => {
                log.note(&format!("Packaging for {target} could not run: {e}")).await;
                log.finish().await;
                return PhaseStatus::Failed;
            }
        }
    }

    if let Err(e) = host.fetch_directory(&host_dir, &local_dir).await {
        log.note(&format!("Archive not retrieved: {e}")).await;
    }
    let status = evaluator::evaluate_archive(fs, &local_dir);
    log.finish().await;
    status
}

async fn deliver<H: PhaseHost + ?Sized>(
    host: &H,
    config: &Config,
    ctx: &PhaseContext,
    kind: PackageKind,
) {
    let platform = ctx.platform();
    let version = ctx.version();
    let Some(destination) = config.destination(platform, version) else {
        return;
    };
    let host_dir = ctx.host_layout.package_dir(platform, kind);
    let local_dir = ctx.local.package_dir(kind);
    match host.deliver(&host_dir, &local_dir, destination).await {
        Ok(()) => tracing::info!(%platform, %version, destination, "Package delivered"),
        Err(e) => {
            tracing::warn!(%platform, %version, destination, error = %e, "Package delivery failed");
        }
    }
}

fn clear_local(fs: &dyn FileSystem, dir: &Path) {
    if let Err(e) = fs.delete_directory(dir) {
        tracing::warn!(path = %dir.display(), error = %e, "Cannot clear previous package output");
    }
}

//! Run orchestration
//!
//! Drives the (engine version × editor platform) matrix: versions one after
//! another, the platforms of a version concurrently. Every requested pair
//! ends up in the [`RunReport`], whatever happened to it.

mod merge;
mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use uuid::Uuid;

pub use merge::{MergedRelease, PLATFORM_SUBTREES, merge_release, release_archive};
pub use report::{ReportEntry, RunReport};

use crate::builder::{Builder, BuilderContext, BuilderFactory, Flow};
use crate::infrastructure::{Config, FileSystem, SourceControl};
use crate::model::{BuildResult, EditorPlatform, EngineVersion, PhaseStatus};
use crate::paths::LocalLayout;

/// Base repository for a run
#[derive(Debug)]
enum Source {
    /// Existing checkout, left alone
    Local(PathBuf),
    /// Fresh clone, removed at the end
    Cloned(PathBuf),
}

impl Source {
    fn path(&self) -> &Path {
        match self {
            Self::Local(path) | Self::Cloned(path) => path,
        }
    }
}

/// Runs the whole build matrix
pub struct Orchestrator<'a> {
    config: Arc<Config>,
    fs: Arc<dyn FileSystem>,
    scm: &'a dyn SourceControl,
    factory: &'a BuilderFactory,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator over the given collaborators
    pub fn new(
        config: Arc<Config>,
        fs: Arc<dyn FileSystem>,
        scm: &'a dyn SourceControl,
        factory: &'a BuilderFactory,
    ) -> Self {
        Self {
            config,
            fs,
            scm,
            factory,
        }
    }

    fn flow(&self) -> Flow {
        if self.config.is_plugin_flow() {
            Flow::Plugin
        } else {
            Flow::Project
        }
    }

    /// Runs every version and platform and returns the aggregated report
    pub async fn run(&self) -> RunReport {
        let config = &self.config;
        self.export_settings();

        let Some(source) = self.obtain_source().await else {
            let report = RunReport::unattempted(&config.engine_versions, &config.editor_platforms);
            report.log_summary();
            return report;
        };

        let mut report = RunReport::new();
        for version in &config.engine_versions {
            for (platform, result) in self.run_version(source.path(), *version).await {
                report.push(*version, platform, result);
            }
        }

        if let Source::Cloned(path) = &source {
            match self.fs.delete_directory(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Cloned source removed"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Cannot remove cloned source"),
            }
        }

        report.log_summary();
        report
    }

    fn export_settings(&self) {
        let path = LocalLayout::settings_file(&self.config.result_path);
        match self.config.export_settings(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Settings snapshot written"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Cannot write settings snapshot"),
        }
    }

    async fn obtain_source(&self) -> Option<Source> {
        let repository = &self.config.project.repository;
        if let Some(local) = &repository.local_path {
            tracing::info!(path = %local.display(), "Using local repository");
            return Some(Source::Local(local.clone()));
        }

        let Some(url) = repository.url.as_deref() else {
            tracing::error!("No repository url or local path configured");
            return None;
        };
        let id = Uuid::new_v4().simple().to_string();
        let dest = self
            .config
            .temp_path
            .join(format!("{}_source_{}", self.config.project.name, &id[..8]));
        if let Err(e) = self.fs.create_directory(&self.config.temp_path) {
            tracing::error!(path = %self.config.temp_path.display(), error = %e, "Cannot create temp directory");
            return None;
        }

        if self.scm.clone_repository(url, &repository.branch, &dest).await {
            Some(Source::Cloned(dest))
        } else {
            tracing::error!(url, branch = %repository.branch, "Clone failed, no builder will run");
            if let Err(e) = self.fs.delete_directory(&dest) {
                tracing::warn!(path = %dest.display(), error = %e, "Cannot remove partial clone");
            }
            None
        }
    }

    async fn run_version(
        &self,
        base: &Path,
        version: EngineVersion,
    ) -> Vec<(EditorPlatform, BuildResult)> {
        let ctx = BuilderContext {
            config: self.config.clone(),
            fs: self.fs.clone(),
        };
        let flow = self.flow();
        tracing::info!(%version, platforms = ?self.config.editor_platforms, "Starting engine version");

        let mut builders: Vec<(EditorPlatform, Option<Box<dyn Builder>>)> = self
            .config
            .editor_platforms
            .iter()
            .map(|platform| {
                let host = self.config.host_kind(*platform);
                match self.factory.create(host, &ctx) {
                    Ok(builder) => (*platform, Some(builder)),
                    Err(e) => {
                        tracing::error!(%platform, %version, error = %e, "Cannot create builder");
                        (*platform, None)
                    }
                }
            })
            .collect();

        let results = join_all(builders.iter_mut().map(|(platform, builder)| {
            let platform = *platform;
            async move {
                let result = match builder {
                    Some(builder) => drive(builder.as_mut(), base, version, flow).await,
                    None => BuildResult::none(),
                };
                tracing::info!(%platform, %version, %result, "Platform finished");
                (platform, result)
            }
        }))
        .await;

        if flow == Flow::Plugin && self.config.phases.merge_packages {
            self.merge(version, &results);
        }

        join_all(
            builders
                .iter_mut()
                .filter_map(|(_, builder)| builder.as_mut())
                .map(|builder| builder.cleanup_temp_directory()),
        )
        .await;

        results
    }

    fn merge(&self, version: EngineVersion, results: &[(EditorPlatform, BuildResult)]) {
        let Some(plugin) = self.config.project.plugin_name.as_deref() else {
            return;
        };
        let packaged: Vec<EditorPlatform> = results
            .iter()
            .filter(|(_, result)| result.status_of_package == PhaseStatus::Success)
            .map(|(platform, _)| *platform)
            .collect();

        match merge_release(
            self.fs.as_ref(),
            &self.config.result_path,
            plugin,
            version,
            &packaged,
            self.config.phases.zip_release,
        ) {
            Ok(Some(merged)) => tracing::info!(
                %version,
                path = %merged.directory.display(),
                platforms = ?merged.platforms,
                "Release merged"
            ),
            Ok(None) => tracing::warn!(%version, "No successful package to merge"),
            Err(e) => tracing::error!(%version, error = %e, "Release merge failed"),
        }
    }
}

/// Prepare, init and run one builder
async fn drive(
    builder: &mut dyn Builder,
    base: &Path,
    version: EngineVersion,
    flow: Flow,
) -> BuildResult {
    if !builder.prepare_repository(base, version).await {
        return BuildResult::none();
    }
    builder.init_directory(version).await;
    match flow {
        Flow::Plugin => builder.run(version).await,
        Flow::Project => builder.run_package(version).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuilderState;
    use crate::infrastructure::{LocalFileSystem, RepositorySettings};
    use crate::model::HostKind;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Events recorded by the fakes, in order
    type Journal = Arc<Mutex<Vec<String>>>;

    struct FakeBuilder {
        host: HostKind,
        outcome: BuildResult,
        prepare_ok: bool,
        journal: Journal,
        state: BuilderState,
    }

    #[async_trait]
    impl Builder for FakeBuilder {
        fn host(&self) -> HostKind {
            self.host
        }

        fn state(&self) -> BuilderState {
            self.state
        }

        async fn prepare_repository(&mut self, base: &Path, version: EngineVersion) -> bool {
            self.journal
                .lock()
                .unwrap()
                .push(format!("prepare {} {version} {}", self.host, base.display()));
            self.prepare_ok
        }

        async fn init_directory(&mut self, version: EngineVersion) -> bool {
            self.journal.lock().unwrap().push(format!("init {} {version}", self.host));
            true
        }

        async fn run(&mut self, version: EngineVersion) -> BuildResult {
            self.journal.lock().unwrap().push(format!("run {} {version}", self.host));
            self.outcome
        }

        async fn run_package(&mut self, version: EngineVersion) -> BuildResult {
            self.journal
                .lock()
                .unwrap()
                .push(format!("run_package {} {version}", self.host));
            self.outcome
        }

        async fn cleanup_temp_directory(&mut self) {
            self.journal.lock().unwrap().push(format!("cleanup {}", self.host));
            self.state = BuilderState::CleanedUp;
        }
    }

    struct FakeScm {
        succeed: bool,
        calls: Mutex<Vec<(String, String, PathBuf)>>,
    }

    #[async_trait]
    impl SourceControl for FakeScm {
        async fn clone_repository(&self, url: &str, branch: &str, dest: &Path) -> bool {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), branch.to_string(), dest.to_path_buf()));
            if self.succeed {
                std::fs::create_dir_all(dest).unwrap();
                std::fs::write(dest.join("Sample.uproject"), "{}").unwrap();
            }
            self.succeed
        }
    }

    fn scm(succeed: bool) -> FakeScm {
        FakeScm {
            succeed,
            calls: Mutex::default(),
        }
    }

    fn success() -> BuildResult {
        BuildResult {
            status_of_build: PhaseStatus::Success,
            status_of_test: PhaseStatus::Success,
            status_of_package: PhaseStatus::Success,
        }
    }

    fn factory(journal: &Journal, outcomes: Vec<(HostKind, BuildResult, bool)>) -> BuilderFactory {
        let mut factory = BuilderFactory::empty();
        for (host, outcome, prepare_ok) in outcomes {
            let journal = journal.clone();
            factory.register(host, move |_ctx| {
                Ok(Box::new(FakeBuilder {
                    host,
                    outcome,
                    prepare_ok,
                    journal: journal.clone(),
                    state: BuilderState::Created,
                }))
            });
        }
        factory
    }

    fn config(dir: &Path, url: bool) -> Config {
        let mut config = crate::builder::tests::config(&dir.join("results"), true);
        config.temp_path = dir.join("tmp");
        config.engine_versions = vec![EngineVersion::Ue5_3, EngineVersion::Ue5_4];
        config.editor_platforms = vec![EditorPlatform::Windows, EditorPlatform::Linux];
        config.phases.merge_packages = false;
        if url {
            config.project.repository = RepositorySettings {
                url: Some("https://example.com/sample.git".into()),
                branch: "release".into(),
                local_path: None,
            };
        }
        config
    }

    fn lines(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_every_pair_reported_in_matrix_order() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::default();
        let factory = factory(
            &journal,
            vec![
                (HostKind::Windows, success(), true),
                (HostKind::LinuxContainer, BuildResult::build_failed(), true),
            ],
        );
        let scm = scm(true);
        let orchestrator = Orchestrator::new(
            Arc::new(config(dir.path(), false)),
            Arc::new(LocalFileSystem::new()),
            &scm,
            &factory,
        );

        let report = orchestrator.run().await;

        let pairs: Vec<(EngineVersion, EditorPlatform)> =
            report.entries().iter().map(|e| (e.version, e.platform)).collect();
        assert_eq!(
            pairs,
            vec![
                (EngineVersion::Ue5_3, EditorPlatform::Windows),
                (EngineVersion::Ue5_3, EditorPlatform::Linux),
                (EngineVersion::Ue5_4, EditorPlatform::Windows),
                (EngineVersion::Ue5_4, EditorPlatform::Linux),
            ]
        );
        assert_eq!(report.get(EngineVersion::Ue5_4, EditorPlatform::Windows), Some(&success()));
        assert!(report.has_failure());
        assert!(scm.calls.lock().unwrap().is_empty());
        assert!(dir.path().join("results/settings.json").is_file());
    }

    #[tokio::test]
    async fn test_versions_run_sequentially_and_cleanup_every_builder() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::default();
        let factory = factory(
            &journal,
            vec![
                (HostKind::Windows, success(), true),
                (HostKind::LinuxContainer, success(), false),
            ],
        );
        let scm = scm(true);
        let orchestrator = Orchestrator::new(
            Arc::new(config(dir.path(), false)),
            Arc::new(LocalFileSystem::new()),
            &scm,
            &factory,
        );

        let report = orchestrator.run().await;

        let journal = lines(&journal);
        let first_54 = journal.iter().position(|l| l.contains("5.4")).unwrap();
        let last_53 = journal.iter().rposition(|l| l.contains("5.3")).unwrap();
        assert!(last_53 < first_54);
        let is_cleanup = |l: &&String| l.starts_with("cleanup");
        assert_eq!(journal[..first_54].iter().filter(is_cleanup).count(), 2);
        assert_eq!(journal.iter().filter(is_cleanup).count(), 4);
        assert!(!journal.iter().any(|l| l.starts_with("run linux-container")));
        assert_eq!(
            report.get(EngineVersion::Ue5_3, EditorPlatform::Linux),
            Some(&BuildResult::none())
        );
    }

    #[tokio::test]
    async fn test_clone_failure_reports_all_none() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::default();
        let factory = factory(&journal, vec![(HostKind::Windows, success(), true)]);
        let scm = scm(false);
        let orchestrator = Orchestrator::new(
            Arc::new(config(dir.path(), true)),
            Arc::new(LocalFileSystem::new()),
            &scm,
            &factory,
        );

        let report = orchestrator.run().await;

        assert_eq!(report.len(), 4);
        assert!(report.entries().iter().all(|e| e.result == BuildResult::none()));
        assert!(lines(&journal).is_empty());
        let calls = scm.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://example.com/sample.git");
        assert_eq!(calls[0].1, "release");
    }

    #[tokio::test]
    async fn test_cloned_source_is_used_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::default();
        let factory = factory(
            &journal,
            vec![
                (HostKind::Windows, success(), true),
                (HostKind::LinuxContainer, success(), true),
            ],
        );
        let scm = scm(true);
        let orchestrator = Orchestrator::new(
            Arc::new(config(dir.path(), true)),
            Arc::new(LocalFileSystem::new()),
            &scm,
            &factory,
        );

        orchestrator.run().await;

        let clone = scm.calls.lock().unwrap()[0].2.clone();
        assert!(clone.starts_with(dir.path().join("tmp")));
        assert!(!clone.exists());
        let prepare = format!("prepare windows 5.3 {}", clone.display());
        assert!(lines(&journal).contains(&prepare));
    }

    #[tokio::test]
    async fn test_missing_builder_reports_none_and_siblings_run() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::default();
        let factory = factory(&journal, vec![(HostKind::Windows, success(), true)]);
        let scm = scm(true);
        let orchestrator = Orchestrator::new(
            Arc::new(config(dir.path(), false)),
            Arc::new(LocalFileSystem::new()),
            &scm,
            &factory,
        );

        let report = orchestrator.run().await;

        assert_eq!(report.get(EngineVersion::Ue5_3, EditorPlatform::Windows), Some(&success()));
        assert_eq!(
            report.get(EngineVersion::Ue5_3, EditorPlatform::Linux),
            Some(&BuildResult::none())
        );
    }

    #[tokio::test]
    async fn test_project_flow_uses_run_package() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::default();
        let factory = factory(&journal, vec![(HostKind::Windows, success(), true)]);
        let mut config = config(dir.path(), false);
        config.project.plugin_name = None;
        config.editor_platforms = vec![EditorPlatform::Windows];
        config.engine_versions = vec![EngineVersion::Ue5_3];
        let scm = scm(true);

        Orchestrator::new(Arc::new(config), Arc::new(LocalFileSystem::new()), &scm, &factory)
            .run()
            .await;

        assert!(lines(&journal).contains(&"run_package windows 5.3".to_string()));
    }

    #[tokio::test]
    async fn test_successful_packages_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        for platform in ["Windows", "Linux"] {
            let package = results.join(format!("packages/{platform}_5.3/Plugin"));
            std::fs::create_dir_all(package.join("Binaries").join(platform)).unwrap();
            std::fs::write(package.join("Binaries").join(platform).join("lib"), "x").unwrap();
        }

        let journal = Journal::default();
        let factory = factory(
            &journal,
            vec![
                (HostKind::Windows, success(), true),
                (HostKind::LinuxContainer, success(), true),
            ],
        );
        let mut config = config(dir.path(), false);
        config.engine_versions = vec![EngineVersion::Ue5_3];
        config.phases.merge_packages = true;
        config.phases.zip_release = true;
        let scm = scm(true);

        Orchestrator::new(Arc::new(config), Arc::new(LocalFileSystem::new()), &scm, &factory)
            .run()
            .await;

        let release = results.join("release/Widget_5.3");
        assert!(release.join("Binaries/Windows/lib").is_file());
        assert!(release.join("Binaries/Linux/lib").is_file());
        assert!(results.join("release/Widget_5.3.zip").is_file());
    }
}

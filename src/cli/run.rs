//! `unreal-ci run` and `unreal-ci validate`

use anyhow::{Context, Result, bail};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use unreal_ci::builder::BuilderFactory;
use unreal_ci::infrastructure::{Config, GitCli, LocalFileSystem, init_logging};
use unreal_ci::model::{EditorPlatform, EngineVersion};
use unreal_ci::orchestrator::{Orchestrator, RunReport};

/// Command-line overrides for a run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Restrict to these engine versions
    pub engines: Vec<EngineVersion>,
    /// Restrict to these editor platforms
    pub platforms: Vec<EditorPlatform>,
    /// Log level override
    pub log_level: Option<String>,
    /// Print the report as JSON
    pub json: bool,
}

/// Narrows the configured matrix to the requested versions and platforms
pub fn apply_filters(config: &mut Config, options: &RunOptions) -> Result<()> {
    if !options.engines.is_empty() {
        config
            .engine_versions
            .retain(|v| options.engines.contains(v));
        if config.engine_versions.is_empty() {
            bail!("None of the requested engine versions is configured");
        }
    }
    if !options.platforms.is_empty() {
        config
            .editor_platforms
            .retain(|p| options.platforms.contains(p));
        if config.editor_platforms.is_empty() {
            bail!("None of the requested platforms is configured");
        }
    }
    Ok(())
}

/// Runs the matrix; returns false if any phase failed or nothing ran
pub fn run_matrix(config_path: &Path, options: &RunOptions) -> Result<bool> {
    let mut config = super::load_config(config_path)?;
    apply_filters(&mut config, options)?;
    init_logging(options.log_level.as_deref().unwrap_or(&config.log_level));
    tracing::info!(config = %config_path.display(), "{}", describe(&config));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let factory = BuilderFactory::standard();
    let scm = GitCli::new();
    let report = runtime.block_on(async {
        Orchestrator::new(
            Arc::new(config),
            Arc::new(LocalFileSystem::new()),
            &scm,
            &factory,
        )
        .run()
        .await
    });

    if options.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        println!("{}", summary(&report));
    }
    Ok(!report.has_failure() && !report.nothing_attempted())
}

/// One line per pair
pub fn summary(report: &RunReport) -> String {
    let mut out = String::new();
    for entry in report.entries() {
        let _ = writeln!(out, "{entry}");
    }
    out.trim_end().to_string()
}

/// Short description of what a configuration will do
pub fn describe(config: &Config) -> String {
    let join = |items: Vec<String>| items.join(", ");
    let flow = match &config.project.plugin_name {
        Some(plugin) => format!("plugin {plugin}"),
        None => "project".to_string(),
    };
    format!(
        "{} ({flow}): engines [{}] on [{}], results in {}",
        config.project.name,
        join(config.engine_versions.iter().map(ToString::to_string).collect()),
        join(
            config
                .editor_platforms
                .iter()
                .map(|p| config.host_kind(*p).to_string())
                .collect()
        ),
        config.result_path.display()
    )
}

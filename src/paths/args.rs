//! Command-line synthesis for build, test and packaging invocations

use std::fmt;

use super::ToolchainPaths;
use crate::model::{EditorPlatform, GamePlatform};

/// Architecture list passed when packaging a Mac target on a Mac host
const MAC_ARCHITECTURES: &str = "arm64+x64";

/// A program and its argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program to run
    pub program: String,
    /// Arguments, one element per argv entry
    pub args: Vec<String>,
}

impl CommandLine {
    /// Creates a command line
    #[must_use]
    pub fn new<S: Into<String>>(program: impl Into<String>, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Single POSIX shell command string with every word quoted as needed
    #[must_use]
    pub fn to_shell(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(self.args.iter()))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell())
    }
}

/// Configured game platforms this host can package, or its native target
#[must_use]
pub fn package_targets(platform: EditorPlatform, configured: &[GamePlatform]) -> Vec<GamePlatform> {
    let targets: Vec<GamePlatform> = platform
        .packageable()
        .iter()
        .copied()
        .filter(|target| configured.contains(target))
        .collect();
    if targets.is_empty() {
        vec![platform.native_target()]
    } else {
        targets
    }
}

/// Editor target build: `{Project}Editor {Target} Development -Project=...`
#[must_use]
pub fn editor_build(paths: &ToolchainPaths, project: &str) -> CommandLine {
    CommandLine::new(
        paths.build_script.clone(),
        [
            format!("{project}Editor"),
            paths.platform().target_name().to_string(),
            "Development".to_string(),
            format!("-Project={}", paths.project_file),
            "-WaitMutex".to_string(),
            "-NoHotReload".to_string(),
        ],
    )
}

/// Headless automation test run exporting its report to `report_dir`
#[must_use]
pub fn automation_test(paths: &ToolchainPaths, test_filter: &str, report_dir: &str) -> CommandLine {
    CommandLine::new(
        paths.editor.clone(),
        [
            paths.project_file.clone(),
            format!("-ExecCmds=Automation RunTests {test_filter};Quit"),
            format!("-ReportExportPath={report_dir}"),
            "-unattended".to_string(),
            "-nopause".to_string(),
            "-nullrhi".to_string(),
            "-nosplash".to_string(),
            "-nosound".to_string(),
            "-stdout".to_string(),
            "-FullStdOutLogOutput".to_string(),
        ],
    )
}

/// `BuildPlugin` into `package_dir` for every target joined by `+`
///
/// Returns `None` when the paths carry no plugin descriptor.
#[must_use]
pub fn plugin_package(
    paths: &ToolchainPaths,
    package_dir: &str,
    targets: &[GamePlatform],
) -> Option<CommandLine> {
    let descriptor = paths.plugin_descriptor.as_ref()?;
    let targets = targets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("+");
    Some(CommandLine::new(
        paths.uat_script.clone(),
        [
            "BuildPlugin".to_string(),
            format!("-Plugin={descriptor}"),
            format!("-Package={package_dir}"),
            format!("-TargetPlatforms={targets}"),
            "-Rocket".to_string(),
        ],
    ))
}

/// `BuildCookRun` for one target, archiving into `archive_dir`
///
/// Packaging a Mac target on a Mac host passes an explicit architecture list;
/// no other combination does.
#[must_use]
pub fn project_package(paths: &ToolchainPaths, target: GamePlatform, archive_dir: &str) -> CommandLine {
    let mut args = vec![
        "BuildCookRun".to_string(),
        format!("-project={}", paths.project_file),
        format!("-platform={target}"),
        "-clientconfig=Development".to_string(),
        "-build".to_string(),
        "-cook".to_string(),
        "-stage".to_string(),
        "-pak".to_string(),
        "-archive".to_string(),
        format!("-archivedirectory={archive_dir}"),
        "-noP4".to_string(),
        "-utf8output".to_string(),
        "-unattended".to_string(),
    ];
    if paths.platform() == EditorPlatform::Mac && target == GamePlatform::Mac {
        args.push(format!("-specifiedarchitecture={MAC_ARCHITECTURES}"));
    }
    CommandLine::new(paths.uat_script.clone(), args)
}

//! Result directory layout
//!
//! ```text
//! <root>/build/<Platform>_<Version>/Build.log
//! <root>/tests/<Platform>_<Version>/AutomationTest.log
//! <root>/tests/<Platform>_<Version>/index.json
//! <root>/packages/<Platform>_<Version>/{Plugin|Project}/...
//! <root>/release/<Plugin>_<Version>/...
//! <root>/settings.json
//! ```
//!
//! [`HostLayout`] is the layout as the toolchain host sees it (possibly a
//! remote or in-container path); [`LocalLayout`] is the local mirror that logs
//! are written to and artifacts are evaluated from.

use std::path::{Path, PathBuf};

use super::join;
use crate::model::{EditorPlatform, EngineVersion};

/// Build phase log file name
pub const BUILD_LOG: &str = "Build.log";
/// Test phase log file name
pub const TEST_LOG: &str = "AutomationTest.log";
/// Package phase log file name
pub const PACKAGE_LOG: &str = "Package.log";
/// Automation report written into the report export path
pub const TEST_REPORT: &str = "index.json";

/// What a package directory holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// Packaged plugin
    Plugin,
    /// Archived project build
    Project,
}

impl PackageKind {
    /// Directory name under the package root
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Plugin => "Plugin",
            Self::Project => "Project",
        }
    }
}

/// `<Platform>_<Version>` directory name
#[must_use]
pub fn phase_label(platform: EditorPlatform, version: EngineVersion) -> String {
    format!("{platform}_{version}")
}

/// Phase directories as seen by the toolchain host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    /// Build output directory
    pub build: String,
    /// Test output directory, also the report export path
    pub tests: String,
    /// Package output directory
    pub packages: String,
    /// Automation report file
    pub test_report: String,
}

impl HostLayout {
    /// Layout under `root` using the separator of `platform`
    #[must_use]
    pub fn resolve(platform: EditorPlatform, root: &str, version: EngineVersion) -> Self {
        let label = phase_label(platform, version);
        let tests = join(platform, root, &["tests", &label]);
        Self {
            build: join(platform, root, &["build", &label]),
            test_report: join(platform, &tests, &[TEST_REPORT]),
            packages: join(platform, root, &["packages", &label]),
            tests,
        }
    }

    /// Package output for `kind`
    #[must_use]
    pub fn package_dir(&self, platform: EditorPlatform, kind: PackageKind) -> String {
        join(platform, &self.packages, &[kind.dir_name()])
    }

    /// Every directory to create before running phases
    #[must_use]
    pub fn directories(&self) -> [&str; 3] {
        [&self.build, &self.tests, &self.packages]
    }
}

/// Local mirror of the phase directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLayout {
    /// Result root
    pub root: PathBuf,
    /// Build output directory
    pub build: PathBuf,
    /// Test output directory
    pub tests: PathBuf,
    /// Package output directory
    pub packages: PathBuf,
}

impl LocalLayout {
    /// Layout under the local result root
    #[must_use]
    pub fn resolve(root: &Path, platform: EditorPlatform, version: EngineVersion) -> Self {
        let label = phase_label(platform, version);
        Self {
            root: root.to_path_buf(),
            build: root.join("build").join(&label),
            tests: root.join("tests").join(&label),
            packages: root.join("packages").join(&label),
        }
    }

    /// Build log file
    #[must_use]
    pub fn build_log(&self) -> PathBuf {
        self.build.join(BUILD_LOG)
    }

    /// Test log file
    #[must_use]
    pub fn test_log(&self) -> PathBuf {
        self.tests.join(TEST_LOG)
    }

    /// Package log file
    #[must_use]
    pub fn package_log(&self) -> PathBuf {
        self.packages.join(PACKAGE_LOG)
    }

    /// Automation report file
    #[must_use]
    pub fn test_report(&self) -> PathBuf {
        self.tests.join(TEST_REPORT)
    }

    /// Package output for `kind`
    #[must_use]
    pub fn package_dir(&self, kind: PackageKind) -> PathBuf {
        self.packages.join(kind.dir_name())
    }

    /// Packaged plugin manifest
    #[must_use]
    pub fn plugin_manifest(&self, plugin: &str) -> PathBuf {
        self.package_dir(PackageKind::Plugin)
            .join(format!("{plugin}.uplugin"))
    }

    /// Every directory to create before running phases
    #[must_use]
    pub fn directories(&self) -> [&Path; 3] {
        [&self.build, &self.tests, &self.packages]
    }

    /// Merged release tree for a plugin: `<root>/release/<Plugin>_<Version>`
    #[must_use]
    pub fn release_dir(root: &Path, plugin: &str, version: EngineVersion) -> PathBuf {
        root.join("release").join(format!("{plugin}_{version}"))
    }

    /// Settings snapshot: `<root>/settings.json`
    #[must_use]
    pub fn settings_file(root: &Path) -> PathBuf {
        root.join("settings.json")
    }
}

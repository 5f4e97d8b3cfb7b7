//! Artifact-based phase evaluation
//!
//! The engine tools are unreliable witnesses: they exit 0 when tests fail and
//! non-zero after benign warnings. Test and package phases are therefore
//! judged by what they produced. Every check returns a [`PhaseStatus`] and
//! never an error; anything unreadable or unexpected is `Failed`.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::infrastructure::FileSystem;
use crate::model::{EngineVersion, PhaseStatus};

/// Summary section of an automation test report
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    /// Tests that passed
    pub succeeded: u64,
    /// Tests that passed with warnings
    #[serde(default)]
    pub succeeded_with_warnings: u64,
    /// Tests that failed
    pub failed: u64,
    /// Tests that did not run
    #[serde(default)]
    pub not_run: u64,
    /// Wall time in seconds
    #[serde(default)]
    pub total_duration: f64,
}

#[derive(Debug, Deserialize)]
struct PluginManifest {
    #[serde(rename = "EngineVersion")]
    engine_version: Option<String>,
}

/// Parses a test report from `reader`
///
/// # Errors
///
/// Returns the JSON error if the content is not a report.
pub fn parse_test_report<R: Read>(reader: R) -> serde_json::Result<TestReport> {
    serde_json::from_reader(reader)
}

/// Success iff the report parses and no test failed
pub fn evaluate_test_reader<R: Read>(reader: R) -> PhaseStatus {
    match parse_test_report(reader) {
        Ok(report) => {
            tracing::info!(
                succeeded = report.succeeded,
                succeeded_with_warnings = report.succeeded_with_warnings,
                failed = report.failed,
                not_run = report.not_run,
                total_duration = report.total_duration,
                "Automation test report"
            );
            PhaseStatus::from_check(report.failed == 0)
        }
        Err(e) => {
            tracing::error!(error = %e, "Unreadable automation test report");
            PhaseStatus::Failed
        }
    }
}

/// Evaluates the test report at `path`; a missing file is `Failed`
pub fn evaluate_test_report(path: &Path) -> PhaseStatus {
    match std::fs::File::open(path) {
        Ok(file) => evaluate_test_reader(std::io::BufReader::new(file)),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Automation test report missing");
            PhaseStatus::Failed
        }
    }
}

/// Success iff the manifest's `EngineVersion` is exactly `{major}.{minor}.0`
pub fn evaluate_manifest_reader<R: Read>(reader: R, version: EngineVersion) -> PhaseStatus {
    let expected = version.manifest_version();
    match serde_json::from_reader::<_, PluginManifest>(reader) {
        Ok(PluginManifest {
            engine_version: Some(found),
        }) if found == expected => PhaseStatus::Success,
        Ok(PluginManifest {
            engine_version: Some(found),
        }) => {
            tracing::error!(expected = %expected, found = %found, "Packaged plugin targets another engine version");
            PhaseStatus::Failed
        }
        Ok(PluginManifest { engine_version: None }) => {
            tracing::error!("Packaged plugin manifest has no EngineVersion");
            PhaseStatus::Failed
        }
        Err(e) => {
            tracing::error!(error = %e, "Unreadable plugin manifest");
            PhaseStatus::Failed
        }
    }
}

/// Evaluates the packaged manifest at `path`; a missing file is `Failed`
pub fn evaluate_plugin_manifest(path: &Path, version: EngineVersion) -> PhaseStatus {
    match std::fs::File::open(path) {
        Ok(file) => evaluate_manifest_reader(std::io::BufReader::new(file), version),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Plugin manifest missing");
            PhaseStatus::Failed
        }
    }
}

/// Success iff the archive directory holds at least one file
pub fn evaluate_archive(fs: &dyn FileSystem, dir: &Path) -> PhaseStatus {
    let status = PhaseStatus::from_check(fs.has_files(dir));
    if status.is_failed() {
        tracing::error!(path = %dir.display(), "Archive directory is empty or missing");
    }
    status
}

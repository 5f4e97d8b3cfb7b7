//! Aggregated run results

use std::fmt;

use serde::Serialize;

use crate::model::{BuildResult, EditorPlatform, EngineVersion, PhaseStatus};

/// Result of one (engine version, editor platform) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Engine version
    pub version: EngineVersion,
    /// Editor platform
    pub platform: EditorPlatform,
    /// Phase outcomes
    pub result: BuildResult,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {}", self.version, self.platform, self.result)
    }
}

/// Every requested pair, in matrix order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    entries: Vec<ReportEntry>,
}

impl RunReport {
    /// Empty report
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report with every pair of the matrix left all-None
    #[must_use]
    pub fn unattempted(versions: &[EngineVersion], platforms: &[EditorPlatform]) -> Self {
        let mut report = Self::new();
        for version in versions {
            for platform in platforms {
                report.push(*version, *platform, BuildResult::none());
            }
        }
        report
    }

    /// Records one pair
    pub fn push(&mut self, version: EngineVersion, platform: EditorPlatform, result: BuildResult) {
        self.entries.push(ReportEntry {
            version,
            platform,
            result,
        });
    }

    /// All entries
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Result for one pair
    #[must_use]
    pub fn get(&self, version: EngineVersion, platform: EditorPlatform) -> Option<&BuildResult> {
        self.entries
            .iter()
            .find(|e| e.version == version && e.platform == platform)
            .map(|e| &e.result)
    }

    /// Returns true if any phase of any pair failed
    #[must_use]
    pub fn has_failure(&self) -> bool {
        self.entries.iter().any(|e| e.result.has_failure())
    }

    /// Returns true if no pair got as far as attempting a build
    #[must_use]
    pub fn nothing_attempted(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.result.status_of_build == PhaseStatus::None)
    }

    /// Number of recorded pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logs one line per pair
    pub fn log_summary(&self) {
        for entry in &self.entries {
            if entry.result.has_failure() {
                tracing::warn!(version = %entry.version, platform = %entry.platform, "{}", entry.result);
            } else {
                tracing::info!(version = %entry.version, platform = %entry.platform, "{}", entry.result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unattempted_covers_matrix() {
        let report = RunReport::unattempted(
            &[EngineVersion::Ue5_3, EngineVersion::Ue5_4],
            &[EditorPlatform::Windows, EditorPlatform::Linux],
        );
        assert_eq!(report.len(), 4);
        assert!(!report.has_failure());
        assert!(report.nothing_attempted());
        assert_eq!(
            report.get(EngineVersion::Ue5_4, EditorPlatform::Linux),
            Some(&BuildResult::none())
        );
    }

    #[test]
    fn test_failure_detection_and_display() {
        let mut report = RunReport::new();
        report.push(EngineVersion::Ue5_3, EditorPlatform::Mac, BuildResult::build_failed());
        assert!(report.has_failure());
        assert!(!report.nothing_attempted());
        assert_eq!(
            report.entries()[0].to_string(),
            "[5.3 Mac] Build: Failed, Test: None, Package: None"
        );
    }

    #[test]
    fn test_serializes_entries() {
        let mut report = RunReport::new();
        report.push(
            EngineVersion::Ue5_3,
            EditorPlatform::Windows,
            BuildResult {
                status_of_build: PhaseStatus::Success,
                ..BuildResult::none()
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["entries"][0]["version"], "5.3");
        assert_eq!(json["entries"][0]["result"]["StatusOfBuild"], "Success");
    }
}

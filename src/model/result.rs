//! Phase outcomes
//!
//! A [`BuildResult`] holds three independent tri-state statuses for one
//! (platform, version) pair.

#![allow(clippy::must_use_candidate)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseStatus {
    /// Phase was not attempted
    #[default]
    None,
    /// Phase completed and its artifacts checked out
    Success,
    /// Phase was attempted and failed
    Failed,
}

impl PhaseStatus {
    /// Returns true if the phase succeeded
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the phase failed
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Maps a boolean check onto Success / Failed
    pub fn from_check(passed: bool) -> Self {
        if passed { Self::Success } else { Self::Failed }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Success => write!(f, "Success"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Build, test and package status for one platform and engine version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildResult {
    /// Outcome of the editor build
    pub status_of_build: PhaseStatus,
    /// Outcome of the automation tests
    pub status_of_test: PhaseStatus,
    /// Outcome of packaging
    pub status_of_package: PhaseStatus,
}

impl BuildResult {
    /// Result with every phase unattempted
    pub fn none() -> Self {
        Self::default()
    }

    /// Result for a build that failed before any later phase
    pub fn build_failed() -> Self {
        Self {
            status_of_build: PhaseStatus::Failed,
            ..Self::default()
        }
    }

    /// Returns true if any phase failed
    pub fn has_failure(&self) -> bool {
        self.status_of_build.is_failed()
            || self.status_of_test.is_failed()
            || self.status_of_package.is_failed()
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Build: {}, Test: {}, Package: {}",
            self.status_of_build, self.status_of_test, self.status_of_package
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_all_none() {
        let result = BuildResult::default();
        assert_eq!(result.status_of_build, PhaseStatus::None);
        assert_eq!(result.status_of_test, PhaseStatus::None);
        assert_eq!(result.status_of_package, PhaseStatus::None);
        assert!(!result.has_failure());
    }

    #[test]
    fn test_build_failed_leaves_later_phases_none() {
        let result = BuildResult::build_failed();
        assert!(result.has_failure());
        assert_eq!(result.status_of_test, PhaseStatus::None);
        assert_eq!(result.status_of_package, PhaseStatus::None);
    }

    #[test]
    fn test_display() {
        let result = BuildResult {
            status_of_build: PhaseStatus::Success,
            status_of_test: PhaseStatus::Failed,
            status_of_package: PhaseStatus::None,
        };
        assert_eq!(result.to_string(), "Build: Success, Test: Failed, Package: None");
    }

    #[test]
    fn test_serialize_field_names() {
        let json = serde_json::to_string(&BuildResult::build_failed()).unwrap();
        assert_eq!(
            json,
            r#"{"StatusOfBuild":"Failed","StatusOfTest":"None","StatusOfPackage":"None"}"#
        );
    }
}

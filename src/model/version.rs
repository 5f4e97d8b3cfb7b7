//! Engine version lines
//!
//! An [`EngineVersion`] is an ordinal identifier for one supported engine
//! release line. Configuration files and command lines spell versions in
//! several ways (`5.3`, `UE5.3`, `UE_5_3`), all of which normalise to the
//! canonical `major.minor` string used in every synthesized path and argument.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::VersionParseError;

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(?:ue)?[\s_\-]?(\d+)[._](\d+)(?:[._]0)?$").expect("version pattern is valid")
});

/// Supported engine release lines, in release order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EngineVersion {
    /// 5.0
    Ue5_0,
    /// 5.1
    Ue5_1,
    /// 5.2
    Ue5_2,
    /// 5.3
    Ue5_3,
    /// 5.4
    Ue5_4,
    /// 5.5
    Ue5_5,
    /// 5.6
    Ue5_6,
    /// 5.7
    Ue5_7,
    /// 5.8
    Ue5_8,
    /// 5.9
    Ue5_9,
    /// 5.10
    Ue5_10,
}

impl EngineVersion {
    /// Every supported version, oldest first
    pub const ALL: [Self; 11] = [
        Self::Ue5_0,
        Self::Ue5_1,
        Self::Ue5_2,
        Self::Ue5_3,
        Self::Ue5_4,
        Self::Ue5_5,
        Self::Ue5_6,
        Self::Ue5_7,
        Self::Ue5_8,
        Self::Ue5_9,
        Self::Ue5_10,
    ];

    /// Position of this version in [`EngineVersion::ALL`]
    #[must_use]
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Major version number
    #[must_use]
    pub fn major(self) -> u32 {
        5
    }

    /// Minor version number
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn minor(self) -> u32 {
        self.ordinal() as u32
    }

    /// Looks up a version from its numeric parts
    #[must_use]
    pub fn from_parts(major: u32, minor: u32) -> Option<Self> {
        if major != 5 {
            return None;
        }
        Self::ALL.get(usize::try_from(minor).ok()?).copied()
    }

    /// Canonical `major.minor` form used in paths and arguments
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ue5_0 => "5.0",
            Self::Ue5_1 => "5.1",
            Self::Ue5_2 => "5.2",
            Self::Ue5_3 => "5.3",
            Self::Ue5_4 => "5.4",
            Self::Ue5_5 => "5.5",
            Self::Ue5_6 => "5.6",
            Self::Ue5_7 => "5.7",
            Self::Ue5_8 => "5.8",
            Self::Ue5_9 => "5.9",
            Self::Ue5_10 => "5.10",
        }
    }

    /// Version string a packaged plugin manifest carries, e.g. `5.3.0`
    #[must_use]
    pub fn manifest_version(self) -> String {
        format!("{}.0", self.as_str())
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let caps = VERSION_PATTERN
            .captures(trimmed)
            .ok_or_else(|| VersionParseError::Malformed(trimmed.to_string()))?;

        let major: u32 = caps[1]
            .parse()
            .map_err(|_| VersionParseError::Malformed(trimmed.to_string()))?;
        let minor: u32 = caps[2]
            .parse()
            .map_err(|_| VersionParseError::Malformed(trimmed.to_string()))?;

        Self::from_parts(major, minor).ok_or(VersionParseError::Unsupported { major, minor })
    }
}

impl TryFrom<String> for EngineVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EngineVersion> for String {
    fn from(version: EngineVersion) -> Self {
        version.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_flexible_forms() {
        for input in ["5.3", "UE5.3", "UE_5_3", "ue-5.3", "5_3", " UE 5.3 ", "5.3.0"] {
            assert_eq!(
                input.parse::<EngineVersion>().unwrap(),
                EngineVersion::Ue5_3,
                "input: {input}"
            );
        }
    }

    #[test]
    fn test_parse_two_digit_minor() {
        assert_eq!("UE_5_10".parse::<EngineVersion>().unwrap(), EngineVersion::Ue5_10);
        assert_eq!(EngineVersion::Ue5_10.as_str(), "5.10");
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        let err = "4.27".parse::<EngineVersion>().unwrap_err();
        assert_eq!(err, VersionParseError::Unsupported { major: 4, minor: 27 });

        let err = "5.11".parse::<EngineVersion>().unwrap_err();
        assert_eq!(err, VersionParseError::Unsupported { major: 5, minor: 11 });
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "latest".parse::<EngineVersion>(),
            Err(VersionParseError::Malformed(_))
        ));
        assert!("".parse::<EngineVersion>().is_err());
    }

    #[test]
    fn test_ordering_follows_releases() {
        assert!(EngineVersion::Ue5_2 < EngineVersion::Ue5_10);
        assert_eq!(EngineVersion::Ue5_4.ordinal(), 4);
        assert_eq!(EngineVersion::Ue5_4.minor(), 4);
    }

    #[test]
    fn test_manifest_version() {
        assert_eq!(EngineVersion::Ue5_3.manifest_version(), "5.3.0");
    }

    #[test]
    fn test_serde_as_canonical_string() {
        let json = serde_json::to_string(&EngineVersion::Ue5_1).unwrap();
        assert_eq!(json, r#""5.1""#);
        let parsed: EngineVersion = serde_json::from_str(r#""UE_5_2""#).unwrap();
        assert_eq!(parsed, EngineVersion::Ue5_2);
    }

    proptest! {
        #[test]
        fn prop_canonical_form_round_trips(index in 0usize..11) {
            let version = EngineVersion::ALL[index];
            prop_assert_eq!(version.as_str().parse::<EngineVersion>().unwrap(), version);
            let prefixed = format!("UE_{}_{}", version.major(), version.minor());
            prop_assert_eq!(prefixed.parse::<EngineVersion>().unwrap(), version);
        }
    }
}

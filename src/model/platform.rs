//! Host and target platforms
//!
//! Two independent axes: the [`EditorPlatform`] that runs the toolchain and
//! the [`GamePlatform`] a package is built for. [`HostKind`] refines the
//! editor platform into the four builder variants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::PlatformParseError;

/// Operating system running the editor toolchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EditorPlatform {
    /// Local Windows host
    Windows,
    /// Remote Mac reached over SSH
    Mac,
    /// Linux, in a container or over SSH
    Linux,
}

impl EditorPlatform {
    /// Toolchain target name used by the build scripts (`Win64`, `Mac`, `Linux`)
    #[must_use]
    pub fn target_name(self) -> &'static str {
        match self {
            Self::Windows => "Win64",
            Self::Mac => "Mac",
            Self::Linux => "Linux",
        }
    }

    /// Game platforms this host can package, native target first
    #[must_use]
    pub fn packageable(self) -> &'static [GamePlatform] {
        match self {
            Self::Windows => &[GamePlatform::Win64, GamePlatform::Android],
            Self::Mac => &[GamePlatform::Mac, GamePlatform::IOS],
            Self::Linux => &[GamePlatform::Linux],
        }
    }

    /// The host's own game platform
    #[must_use]
    pub fn native_target(self) -> GamePlatform {
        self.packageable()[0]
    }

    /// Whether paths for this platform use `\` separators
    #[must_use]
    pub fn uses_backslash(self) -> bool {
        matches!(self, Self::Windows)
    }
}

impl fmt::Display for EditorPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "Windows"),
            Self::Mac => write!(f, "Mac"),
            Self::Linux => write!(f, "Linux"),
        }
    }
}

impl FromStr for EditorPlatform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" | "win64" | "win" => Ok(Self::Windows),
            "mac" | "macos" | "osx" => Ok(Self::Mac),
            "linux" => Ok(Self::Linux),
            _ => Err(PlatformParseError(s.to_string())),
        }
    }
}

/// Platform a packaged build runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GamePlatform {
    /// 64-bit Windows
    Win64,
    /// macOS
    Mac,
    /// Linux
    Linux,
    /// iOS
    IOS,
    /// Android
    Android,
}

impl fmt::Display for GamePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win64 => write!(f, "Win64"),
            Self::Mac => write!(f, "Mac"),
            Self::Linux => write!(f, "Linux"),
            Self::IOS => write!(f, "IOS"),
            Self::Android => write!(f, "Android"),
        }
    }
}

impl FromStr for GamePlatform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win64" | "windows" => Ok(Self::Win64),
            "mac" | "macos" => Ok(Self::Mac),
            "linux" => Ok(Self::Linux),
            "ios" => Ok(Self::IOS),
            "android" => Ok(Self::Android),
            _ => Err(PlatformParseError(s.to_string())),
        }
    }
}

/// Builder variant: an editor platform plus how it is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    /// Local Windows toolchain
    Windows,
    /// Mac over an SSH session
    Mac,
    /// Linux over an SSH session
    LinuxRemote,
    /// Linux inside a one-shot container
    LinuxContainer,
}

impl HostKind {
    /// Editor platform this host runs
    #[must_use]
    pub fn platform(self) -> EditorPlatform {
        match self {
            Self::Windows => EditorPlatform::Windows,
            Self::Mac => EditorPlatform::Mac,
            Self::LinuxRemote | Self::LinuxContainer => EditorPlatform::Linux,
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Mac => write!(f, "mac"),
            Self::LinuxRemote => write!(f, "linux-remote"),
            Self::LinuxContainer => write!(f, "linux-container"),
        }
    }
}

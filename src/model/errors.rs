//! Error types for the build domain

use std::path::PathBuf;
use thiserror::Error;

/// Errors parsing an engine version string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    /// The text is not a recognisable version
    #[error("Malformed engine version: '{0}'")]
    Malformed(String),

    /// The version is well formed but not a supported release line
    #[error("Unsupported engine version: {major}.{minor}")]
    Unsupported {
        /// Major part
        major: u32,
        /// Minor part
        minor: u32,
    },
}

/// Unknown platform name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown platform: '{0}'")]
pub struct PlatformParseError(pub String);

/// Errors raised by process, shell-session and container transports
#[derive(Error, Debug)]
pub enum TransportError {
    /// The program could not be started
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Command exited with a non-zero status
    #[error("Command failed with exit code {code}")]
    NonZeroExit {
        /// Exit code returned by the command
        code: i32,
        /// Output captured before exit
        output: Vec<String>,
    },

    /// Remote host or container runtime is not reachable
    #[error("Target unreachable: {0}")]
    Unreachable(String),

    /// File transfer failed
    #[error("Copy of '{from}' to '{to}' failed: {reason}")]
    Copy {
        /// Source path
        from: String,
        /// Destination path
        to: String,
        /// Description of the failure
        reason: String,
    },

    /// Session was used after disposal
    #[error("Session already disposed")]
    Disposed,

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised inside a builder phase
#[derive(Error, Debug)]
pub enum BuildError {
    /// Transport failure while running a phase
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Local filesystem operation failed
    #[error("Filesystem error at '{path}': {source}")]
    Filesystem {
        /// Path involved in the failure
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The builder was used before a successful prepare
    #[error("Builder is not prepared")]
    NotPrepared,
}

impl BuildError {
    /// Wraps an IO error with the path it concerns
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_error_messages() {
        let err = VersionParseError::Unsupported { major: 4, minor: 27 };
        assert_eq!(err.to_string(), "Unsupported engine version: 4.27");
        let err = VersionParseError::Malformed("x".into());
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::NonZeroExit {
            code: 3,
            output: vec!["boom".into()],
        };
        assert_eq!(err.to_string(), "Command failed with exit code 3");
    }

    #[test]
    fn test_build_error_wraps_transport() {
        let err: BuildError = TransportError::Unreachable("mac-mini".into()).into();
        assert!(err.to_string().contains("mac-mini"));
    }
}

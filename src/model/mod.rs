//! Build domain types

pub mod errors;
pub mod platform;
pub mod result;
pub mod version;

pub use errors::{BuildError, PlatformParseError, TransportError, VersionParseError};
pub use platform::{EditorPlatform, GamePlatform, HostKind};
pub use result::{BuildResult, PhaseStatus};
pub use version::EngineVersion;

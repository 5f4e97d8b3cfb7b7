//! Infrastructure layer
//!
//! Configuration, logging, the local filesystem and source control.

mod config;
mod fs;
mod logging;
mod scm;

pub use config::{
    Config, ConfigError, ContainerSettings, DEFAULT_CONTAINER_IMAGE, LinuxMode, LinuxSettings,
    MacSettings, PhaseSettings, ProjectSettings, RemoteHostSettings, RepositorySettings,
    SshSettings, WindowsSettings,
};
pub use fs::{FileSystem, LocalFileSystem};
pub use logging::{PhaseLog, init_logging};
pub use scm::{GitCli, SourceControl};

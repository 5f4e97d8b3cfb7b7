//! Prelude module for common imports

pub use crate::builder::{
    Builder, BuilderContext, BuilderFactory, BuilderState, Flow, PhaseContext, PhaseHost,
    PlatformBuilder,
};
pub use crate::evaluator::{evaluate_archive, evaluate_plugin_manifest, evaluate_test_report};
pub use crate::executor::{
    CommandOutcome, ContainerRuntime, ContainerSession, HealthStatus, OutputStream,
    ProcessCommand, RemoteTransport, SessionTarget, SshAuth, SshSession,
};
pub use crate::infrastructure::{
    Config, ConfigError, FileSystem, GitCli, LocalFileSystem, SourceControl, init_logging,
};
pub use crate::model::{
    BuildError, BuildResult, EditorPlatform, EngineVersion, GamePlatform, HostKind, PhaseStatus,
    TransportError,
};
pub use crate::orchestrator::{Orchestrator, ReportEntry, RunReport};
pub use crate::paths::{CommandLine, HostLayout, LocalLayout, ToolchainPaths};

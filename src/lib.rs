//! # unreal-ci
//!
//! Builds, tests and packages an Unreal Engine plugin or project on several
//! host platforms for a matrix of engine versions, and reports a
//! Success/Failed/None status per phase for every (version, platform) pair.
//!
//! ## Layers
//!
//! - [`model`]: engine versions, platforms, phase results, errors
//! - [`executor`]: local processes, SSH sessions and one-shot containers,
//!   all streaming output lines and reporting exit codes as values
//! - [`paths`]: pure path and command-line synthesis per host and version
//! - [`evaluator`]: artifact-based classification of test and package phases
//! - [`builder`]: the per-platform build state machine
//! - [`orchestrator`]: the version × platform matrix, release merging, report
//! - [`infrastructure`]: configuration, logging, filesystem, source control
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use unreal_ci::builder::BuilderFactory;
//! use unreal_ci::infrastructure::{Config, GitCli, LocalFileSystem};
//! use unreal_ci::orchestrator::Orchestrator;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load("unreal-ci.yaml".as_ref())?;
//! config.validate()?;
//!
//! let factory = BuilderFactory::standard();
//! let scm = GitCli::new();
//! let report = Orchestrator::new(Arc::new(config), Arc::new(LocalFileSystem::new()), &scm, &factory)
//!     .run()
//!     .await;
//! assert!(!report.has_failure());
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of
//! - Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <https://www.apache.org/licenses/LICENSE-2.0>)
//! - MIT license ([LICENSE-MIT](LICENSE-MIT) or <https://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod builder;
pub mod evaluator;
pub mod executor;
pub mod infrastructure;
pub mod model;
pub mod orchestrator;
pub mod paths;

// Prelude module for common imports
pub mod prelude;

// Re-export commonly used types
pub use builder::{Builder, BuilderFactory, BuilderState, PlatformBuilder};
pub use executor::{CommandOutcome, OutputStream, ProcessCommand, RemoteTransport, SshSession};
pub use infrastructure::{Config, ConfigError};
pub use model::{BuildResult, EditorPlatform, EngineVersion, GamePlatform, HostKind, PhaseStatus};
pub use orchestrator::{Orchestrator, RunReport};

/// Version of the unreal-ci crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

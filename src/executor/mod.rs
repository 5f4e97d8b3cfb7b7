//! Execution transports
//!
//! Local processes, SSH shell sessions and one-shot containers. All of them
//! hand output back as an [`OutputStream`] of lines and report exit codes as
//! values in a [`CommandOutcome`].

mod container;
mod process;
mod session;
mod stream;
mod traits;

pub use container::{ContainerRuntime, ContainerSession, VolumeMount};
pub use process::ProcessCommand;
pub use session::{SessionTarget, SshAuth, SshSession};
pub use stream::{CommandOutcome, OutputStream, STREAM_CAPACITY};
pub use traits::{HealthStatus, RemoteTransport};

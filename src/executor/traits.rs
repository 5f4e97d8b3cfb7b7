//! Remote transport contract
//!
//! Shell sessions and containers both execute a script against a target,
//! stream its output, and report completion. Callers check readiness before
//! first use; an unready target fails closed.

use async_trait::async_trait;

use super::stream::OutputStream;
use crate::model::TransportError;

/// Readiness of a transport target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Target is reachable and usable
    Healthy,

    /// Target cannot be used
    Unhealthy {
        /// Reason for being unhealthy
        reason: String,
    },
}

impl HealthStatus {
    /// Returns true if the target is usable
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Executes scripts against a remote or containerized target
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Probes the target; never raises
    async fn health_check(&self) -> HealthStatus;

    /// Boolean readiness probe, false when the target is unusable
    async fn is_ready(&self) -> bool {
        self.health_check().await.is_healthy()
    }

    /// Runs `script` (one shell command per line) and streams its output
    ///
    /// The outcome's exit code is the status of the last command.
    async fn execute(&self, script: &[String]) -> Result<OutputStream, TransportError>;
}

//! Remote executor trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Transport that runs a shell command on one host.
///
/// Implementations return the captured result for any exit status; turning a
/// non-zero exit into an error is left to `RemoteSession`.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command and capture its output
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Run a command, failing with `ExecError::Timeout` once `timeout` elapses
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Close any held connection; the next command reconnects
    async fn disconnect(&self) -> Result<(), ExecError> {
        Ok(())
    }

    /// Whether a live connection is currently held
    fn is_connected(&self) -> bool {
        true
    }

    /// Short name of the transport, for logs
    fn executor_type(&self) -> &'static str;
}

//! `RemoteSession`: a host-bound executor handle
//!
//! Adds the pieces every maintenance step needs on top of the raw transport:
//! privilege elevation, a per-command timeout, and mapping a non-zero exit to
//! `ExecError::CommandFailed`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::RemoteExecutor;

/// How elevated commands are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Elevation {
    /// Already privileged (logged in as root); commands run unchanged
    None,
    /// Wrap as `sudo -n sh -c '<cmd>'`; requires passwordless sudo
    #[default]
    Sudo,
}

impl Elevation {
    /// Command string actually sent for an elevated call
    #[must_use]
    pub fn wrap(self, cmd: &str) -> String {
        match self {
            Elevation::None => cmd.to_string(),
            Elevation::Sudo => format!("sudo -n sh -c {}", shell_quote(cmd)),
        }
    }
}

/// Single-quote `text` for a POSIX shell
#[must_use]
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Command used to test for a regular file
#[must_use]
pub fn file_test_command(path: &str) -> String {
    format!(r#"if test -f "{path}"; then echo "True"; fi"#)
}

/// Command used to look for a marker file in a directory listing
#[must_use]
pub fn entry_test_command(dir: &str, flag: &str) -> String {
    format!("ls -al {dir} | grep {flag}")
}

/// Executor bound to one host, with elevation and timeout policy
#[derive(Clone)]
pub struct RemoteSession {
    host: String,
    executor: Arc<dyn RemoteExecutor>,
    elevation: Elevation,
    timeout: Option<Duration>,
}

impl fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSession")
            .field("host", &self.host)
            .field("executor", &self.executor.executor_type())
            .field("elevation", &self.elevation)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteSession {
    /// Bind an executor to a host name
    pub fn new(host: impl Into<String>, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            host: host.into(),
            executor,
            elevation: Elevation::default(),
            timeout: None,
        }
    }

    /// Set how elevated commands are run
    #[must_use]
    pub fn with_elevation(mut self, elevation: Elevation) -> Self {
        self.elevation = elevation;
        self
    }

    /// Limit every command to `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Host name used in report lines
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Run unprivileged; a non-zero exit is an error
    ///
    /// # Errors
    /// `ExecError::CommandFailed` on non-zero exit, any transport error otherwise
    pub async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        checked(self.run_unchecked(cmd).await?)
    }

    /// Run elevated; a non-zero exit is an error
    ///
    /// # Errors
    /// `ExecError::CommandFailed` on non-zero exit, any transport error otherwise
    pub async fn sudo(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        checked(self.run_unchecked(&self.elevation.wrap(cmd)).await?)
    }

    /// Run unprivileged and return the raw result whatever the exit status
    ///
    /// # Errors
    /// Only transport errors (including timeout)
    #[instrument(skip(self), fields(host = %self.host), level = "debug")]
    pub async fn run_unchecked(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        debug!(command = %cmd, "dispatching");
        match self.timeout {
            Some(limit) => self.executor.run_with_timeout(cmd, limit).await,
            None => self.executor.run(cmd).await,
        }
    }

    /// Whether `path` is a regular file on the host
    ///
    /// # Errors
    /// Transport or command failure of the test itself
    pub async fn file_exists(&self, path: &str) -> Result<bool, ExecError> {
        let result = self.run(&file_test_command(path)).await?;
        Ok(!result.stdout.trim().is_empty())
    }

    /// Whether `ls -al <dir>` lists an entry matching `flag`.
    ///
    /// `grep` exits 1 on no match, so the exit status is ignored here.
    ///
    /// # Errors
    /// Transport errors only
    pub async fn has_entry(&self, dir: &str, flag: &str) -> Result<bool, ExecError> {
        let result = self.run_unchecked(&entry_test_command(dir, flag)).await?;
        Ok(result.lines().any(|l| !l.trim().is_empty()))
    }

    /// Close the transport once the host's work is done
    pub async fn close(&self) {
        if let Err(e) = self.executor.disconnect().await {
            warn!(host = %self.host, error = %e, "disconnect failed");
        }
    }
}

fn checked(result: CommandResult) -> Result<CommandResult, ExecError> {
    if result.success() {
        Ok(result)
    } else {
        Err(ExecError::CommandFailed {
            status: result.status,
            stderr: result.stderr,
        })
    }
}

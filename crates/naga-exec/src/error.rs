//! Error types for naga-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running a command on a host
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Remote command exited non-zero
    #[error("command exited with status {status}: {}", first_line(.stderr))]
    CommandFailed {
        /// Exit status code
        status: i32,
        /// Captured stderr
        stderr: String,
    },

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error on the channel
    #[error("I/O error: {0}")]
    IoError(String),

    /// Connection not established
    #[error("not connected")]
    NotConnected,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

/// The two structural failure kinds a report line can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The transport could not reach the host or run the command
    Connection,
    /// The command ran and exited non-zero
    Command,
}

impl ExecError {
    /// Classify the error. Only a non-zero remote exit is a command
    /// failure; timeouts and every transport problem count as connection
    /// failures.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            ExecError::CommandFailed { .. } => FailureKind::Command,
            _ => FailureKind::Connection,
        }
    }

    /// Short cause suitable for a report line.
    ///
    /// For command failures this is the first line of stderr.
    #[must_use]
    pub fn cause(&self) -> String {
        match self {
            ExecError::CommandFailed { status, stderr } => {
                let line = first_line(stderr);
                if line.is_empty() {
                    format!("exit status {status}")
                } else {
                    line.to_string()
                }
            }
            ExecError::ConnectionFailed(cause) => cause.clone(),
            other => other.to_string(),
        }
    }

    /// Render as `connection failed: <cause>` or `failed: <cause>`
    #[must_use]
    pub fn report(&self) -> String {
        match self.kind() {
            FailureKind::Connection => format!("connection failed: {}", self.cause()),
            FailureKind::Command => format!("failed: {}", self.cause()),
        }
    }

    /// Whether the host should be treated as unreachable
    #[must_use]
    pub fn is_connection(&self) -> bool {
        self.kind() == FailureKind::Connection
    }
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failure_uses_first_stderr_line() {
        let err = ExecError::CommandFailed {
            status: 100,
            stderr: "E: Could not get lock /var/lib/dpkg/lock-frontend\nE: Unable to acquire"
                .to_string(),
        };

        assert_eq!(err.kind(), FailureKind::Command);
        assert_eq!(
            err.report(),
            "failed: E: Could not get lock /var/lib/dpkg/lock-frontend"
        );
    }

    #[test]
    fn test_command_failure_without_stderr() {
        let err = ExecError::CommandFailed {
            status: 2,
            stderr: String::new(),
        };

        assert_eq!(err.report(), "failed: exit status 2");
    }

    #[test]
    fn test_timeout_is_connection_failure() {
        let err = ExecError::Timeout {
            timeout: Duration::from_secs(5),
        };

        assert!(err.is_connection());
        assert!(err.report().starts_with("connection failed:"));
    }

    #[test]
    fn test_connection_failure_report() {
        let err = ExecError::ConnectionFailed("No route to host".to_string());

        assert_eq!(err.report(), "connection failed: No route to host");
    }
}

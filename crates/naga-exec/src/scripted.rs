//! Executor that replays canned responses
//!
//! Responses are keyed by the exact command string. When several responses
//! are queued for one command they are consumed in order; the last one then
//! repeats. Unknown commands succeed with empty output.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::RemoteExecutor;

/// Replays canned results and records every command it receives
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: Mutex<HashMap<String, VecDeque<Result<CommandResult, ExecError>>>>,
    calls: Mutex<Vec<String>>,
    disconnects: AtomicUsize,
    unreachable: Option<String>,
}

impl ScriptedExecutor {
    /// Executor where every unscripted command succeeds silently
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor whose every command fails with `ConnectionFailed(cause)`
    pub fn unreachable(cause: impl Into<String>) -> Self {
        Self {
            unreachable: Some(cause.into()),
            ..Self::default()
        }
    }

    /// Queue a response for `cmd`
    #[must_use]
    pub fn on(self, cmd: impl Into<String>, response: Result<CommandResult, ExecError>) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.entry(cmd.into()).or_default().push_back(response);
        }
        self
    }

    /// Queue a successful response with `stdout`
    #[must_use]
    pub fn ok(self, cmd: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.on(cmd, Ok(CommandResult::ok(stdout)))
    }

    /// Queue a non-zero exit with `stderr`
    #[must_use]
    pub fn fail(self, cmd: impl Into<String>, status: i32, stderr: impl Into<String>) -> Self {
        self.on(cmd, Ok(CommandResult::failed(status, stderr)))
    }

    /// Every command received so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// How many times the connection was closed
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Whether a command containing `needle` was issued
    pub fn ran(&self, needle: &str) -> bool {
        self.calls().iter().any(|c| c.contains(needle))
    }

    fn respond(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(cmd.to_string());
        }

        if let Some(cause) = &self.unreachable {
            return Err(ExecError::ConnectionFailed(cause.clone()));
        }

        let Ok(mut responses) = self.responses.lock() else {
            return Ok(CommandResult::default());
        };
        let next = match responses.get_mut(cmd) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        next.unwrap_or_else(|| Ok(CommandResult::default()))
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.respond(cmd)
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        _timeout: Duration,
    ) -> Result<CommandResult, ExecError> {
        self.respond(cmd)
    }

    async fn disconnect(&self) -> Result<(), ExecError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn executor_type(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_responses_then_repeat() {
        let executor = ScriptedExecutor::new()
            .ok("git pull", "Updating 1..2")
            .ok("git pull", "Already up to date.");

        assert_eq!(executor.run("git pull").await.unwrap().stdout, "Updating 1..2");
        assert_eq!(executor.run("git pull").await.unwrap().stdout, "Already up to date.");
        assert_eq!(executor.run("git pull").await.unwrap().stdout, "Already up to date.");
        assert_eq!(executor.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let executor = ScriptedExecutor::unreachable("No route to host");

        assert!(executor.run("true").await.unwrap_err().is_connection());
        assert!(executor.ran("true"));
    }
}

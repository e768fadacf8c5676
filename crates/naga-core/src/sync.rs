//! `RepoSyncEngine`: pull every repository on a host
//!
//! Each repository moves through a small state machine:
//!
//! ```text
//! guard marker present ──────────────▶ Guarded
//! git status not clean ──────────────▶ Dirty
//! git pull says "Already ..." ───────▶ UpToDate
//! otherwise (hook runs if present) ──▶ Updated
//! any remote failure ────────────────▶ Failed
//! ```
//!
//! Repositories are independent: one failure never stops the sweep.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use naga_exec::{ExecError, RemoteSession};
use naga_pkg::{Report, parse};

use crate::config::SyncConfig;

/// Where a repository ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoState {
    /// Guard marker present; nothing was run
    Guarded,
    /// Uncommitted changes; not pulled
    Dirty,
    /// Pull fetched nothing
    UpToDate,
    /// Pull fetched new commits
    Updated,
    /// A remote step failed
    Failed,
}

/// Outcome of syncing one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoOutcome {
    /// Host name
    pub host: String,
    /// Repository path on the host
    pub path: String,
    /// Final state
    pub state: RepoState,
    /// Files-changed line for `Updated`, failure text for `Failed`
    pub detail: String,
}

impl RepoOutcome {
    fn new(session: &RemoteSession, path: &str, state: RepoState, detail: String) -> Self {
        Self {
            host: session.host().to_string(),
            path: path.to_string(),
            state,
            detail,
        }
    }

    /// Report line for this repository
    #[must_use]
    pub fn line(&self) -> String {
        let status = match self.state {
            RepoState::Guarded => "noPull, aborting update",
            RepoState::Dirty => "not clean, aborting update",
            RepoState::UpToDate => "already up to date",
            RepoState::Updated | RepoState::Failed => self.detail.as_str(),
        };
        format!("{} repo {}: {status}", self.host, self.path)
    }
}

/// Syncs the configured repositories of a host
#[derive(Debug, Clone, Default)]
pub struct RepoSyncEngine {
    config: SyncConfig,
}

impl RepoSyncEngine {
    /// Create an engine
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// The fixed repositories plus every subdirectory of `repos_dir`
    ///
    /// A missing `repos_dir` only drops the discovered repositories.
    ///
    /// # Errors
    /// Transport errors while listing `repos_dir`
    pub async fn repositories(&self, session: &RemoteSession) -> Result<Vec<String>, ExecError> {
        let mut repos = self.config.fixed_repos.clone();
        let listing = session
            .run_unchecked(&format!("find {} -maxdepth 1 -type d", self.config.repos_dir))
            .await?;
        repos.extend(parse::subdirectories(&listing.stdout));
        Ok(repos)
    }

    /// Sync one repository
    #[instrument(skip(self, session), fields(host = %session.host()))]
    pub async fn sync_repo(&self, session: &RemoteSession, path: &str) -> RepoOutcome {
        match self.try_sync(session, path).await {
            Ok(outcome) => {
                info!(state = ?outcome.state, "repository synced");
                outcome
            }
            Err(e) => {
                warn!(error = %e, "repository sync failed");
                RepoOutcome::new(session, path, RepoState::Failed, e.report())
            }
        }
    }

    async fn try_sync(&self, session: &RemoteSession, path: &str) -> Result<RepoOutcome, ExecError> {
        if session.has_entry(path, &self.config.guard_file).await? {
            return Ok(RepoOutcome::new(session, path, RepoState::Guarded, String::new()));
        }

        let status = session.run(&format!("cd {path} && git status")).await?;
        if !parse::is_clean_tree(&status.stdout) {
            return Ok(RepoOutcome::new(session, path, RepoState::Dirty, String::new()));
        }

        let pull = session.run(&format!("cd {path} && git pull")).await?;
        if parse::is_up_to_date(&pull.stdout) {
            return Ok(RepoOutcome::new(session, path, RepoState::UpToDate, String::new()));
        }

        self.run_hook(session, path).await;
        let changed = parse::files_changed(&pull.stdout).unwrap_or_default();
        Ok(RepoOutcome::new(session, path, RepoState::Updated, changed))
    }

    /// Best-effort post-sync hook
    async fn run_hook(&self, session: &RemoteSession, path: &str) {
        let hook = &self.config.hook_file;
        match session.has_entry(path, hook).await {
            Ok(true) => {
                debug!(path, hook = %hook, "running post-sync hook");
                if let Err(e) = session.run(&format!("cd {path} && ./{hook}")).await {
                    warn!(path, error = %e, "post-sync hook failed");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(path, error = %e, "could not look for post-sync hook"),
        }
    }

    /// Sync every repository; `Err` only when the repositories cannot be listed
    ///
    /// # Errors
    /// Transport errors while enumerating repositories
    pub async fn sweep(&self, session: &RemoteSession) -> Result<Vec<RepoOutcome>, ExecError> {
        let repos = self.repositories(session).await?;
        let mut outcomes = Vec::with_capacity(repos.len());
        for path in &repos {
            outcomes.push(self.sync_repo(session, path).await);
        }
        Ok(outcomes)
    }

    /// `sweep` rendered as report lines
    pub async fn sync_all(&self, session: &RemoteSession) -> Report {
        match self.sweep(session).await {
            Ok(outcomes) => {
                let mut report = Report::new();
                report.extend(outcomes.iter().map(RepoOutcome::line));
                report
            }
            Err(e) => {
                warn!(host = session.host(), error = %e, "could not enumerate repositories");
                Report::line(format!("{}: {}", session.host(), e.report()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use naga_exec::session::entry_test_command;
    use naga_exec::{Elevation, ScriptedExecutor};

    use super::*;

    const CLEAN: &str = "On branch main\nnothing to commit, working tree clean\n";
    const PULLED: &str = "Updating 1a2b3c4..5d6e7f8\nFast-forward\n bin/check | 4 ++--\n 1 file changed, 2 insertions(+), 2 deletions(-)\n";

    fn session(executor: &Arc<ScriptedExecutor>) -> RemoteSession {
        RemoteSession::new("web1", executor.clone()).with_elevation(Elevation::None)
    }

    fn engine() -> RepoSyncEngine {
        RepoSyncEngine::new(SyncConfig::default())
    }

    #[tokio::test]
    async fn test_guarded_repo_never_pulls() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .ok(entry_test_command("~/bin/", ".noPull"), "-rw-r--r-- 1 ops ops 0 .noPull\n")
                .ok("cd ~/bin/ && git status", CLEAN),
        );

        let outcome = engine().sync_repo(&session(&executor), "~/bin/").await;

        assert_eq!(outcome.state, RepoState::Guarded);
        assert_eq!(outcome.line(), "web1 repo ~/bin/: noPull, aborting update");
        assert!(!executor.ran("git pull"));
        assert!(!executor.ran("git status"));
    }

    #[tokio::test]
    async fn test_dirty_repo_is_not_pulled() {
        let executor = Arc::new(ScriptedExecutor::new().ok(
            "cd ~/ && git status",
            "On branch main\nChanges not staged for commit:\n\tmodified:   .bashrc\n",
        ));

        let outcome = engine().sync_repo(&session(&executor), "~/").await;

        assert_eq!(outcome.line(), "web1 repo ~/: not clean, aborting update");
        assert!(!executor.ran("git pull"));
    }

    #[tokio::test]
    async fn test_up_to_date_skips_hook() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .ok("cd ~/ && git status", CLEAN)
                .ok("cd ~/ && git pull", "Already up to date.\n")
                .ok(entry_test_command("~/", ".postpull.sh"), "-rwxr-xr-x 1 ops ops 80 .postpull.sh\n"),
        );

        let outcome = engine().sync_repo(&session(&executor), "~/").await;

        assert_eq!(outcome.state, RepoState::UpToDate);
        assert_eq!(outcome.line(), "web1 repo ~/: already up to date");
        assert!(!executor.ran("./.postpull.sh"));
    }

    #[tokio::test]
    async fn test_updated_runs_hook_and_reports_files() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .ok("cd ~/bin/ && git status", CLEAN)
                .ok("cd ~/bin/ && git pull", PULLED)
                .ok(entry_test_command("~/bin/", ".postpull.sh"), "-rwxr-xr-x 1 ops ops 80 .postpull.sh\n")
                .fail("cd ~/bin/ && ./.postpull.sh", 1, "hook exploded"),
        );

        let outcome = engine().sync_repo(&session(&executor), "~/bin/").await;

        assert_eq!(outcome.state, RepoState::Updated);
        assert_eq!(
            outcome.line(),
            "web1 repo ~/bin/: 1 file changed, 2 insertions(+), 2 deletions(-)"
        );
        assert!(executor.ran("cd ~/bin/ && ./.postpull.sh"));
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_repo() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .ok("find ~/repos/ -maxdepth 1 -type d", "/home/ops/repos/\n/home/ops/repos/naga\n")
                .ok("cd ~/ && git status", CLEAN)
                .ok("cd ~/ && git pull", "Already up to date.\n")
                .fail("cd ~/.ssh/ && git status", 128, "fatal: not a git repository (or any of the parent directories): .git")
                .ok("cd ~/bin/ && git status", CLEAN)
                .ok("cd ~/bin/ && git pull", "Already up to date.\n")
                .ok("cd /home/ops/repos/naga && git status", CLEAN)
                .ok("cd /home/ops/repos/naga && git pull", PULLED),
        );

        let report = engine().sync_all(&session(&executor)).await;

        assert_eq!(
            report.lines,
            vec![
                "web1 repo ~/: already up to date",
                "web1 repo ~/.ssh/: failed: fatal: not a git repository (or any of the parent directories): .git",
                "web1 repo ~/bin/: already up to date",
                "web1 repo /home/ops/repos/naga: 1 file changed, 2 insertions(+), 2 deletions(-)",
            ]
        );
        assert!(!report.restart_required);
    }

    #[tokio::test]
    async fn test_missing_repos_dir_keeps_fixed_set() {
        let executor = Arc::new(ScriptedExecutor::new().fail(
            "find ~/repos/ -maxdepth 1 -type d",
            1,
            "find: '/home/ops/repos/': No such file or directory",
        ));

        let repos = engine().repositories(&session(&executor)).await.unwrap();

        assert_eq!(repos, vec!["~/", "~/.ssh/", "~/bin/"]);
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let executor = Arc::new(ScriptedExecutor::unreachable("Connection timed out"));

        let report = engine().sync_all(&session(&executor)).await;

        assert_eq!(report.lines, vec!["web1: connection failed: Connection timed out"]);
    }
}

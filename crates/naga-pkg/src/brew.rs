//! Homebrew package manager (macOS)

use async_trait::async_trait;
use naga_exec::{ExecError, RemoteSession};
use tracing::{debug, info, instrument, warn};

use crate::commands::{DEFAULT_BREW, brew, brew_outdated_count};
use crate::parse;
use crate::traits::PackageManager;
use crate::types::Report;

/// Returned by `upgrade` after upgrade and cleanup both succeeded
pub const UPGRADE_DONE: &str = "brew upgrade complete";
/// Reported instead of upgrading when nothing is outdated
pub const NOTHING_TO_DO: &str = "No packages to upgrade, skipping";

/// Homebrew protocol over one host's session.
///
/// Homebrew refuses to run as root, so nothing here is elevated.
#[derive(Debug, Clone)]
pub struct HomebrewManager {
    session: RemoteSession,
    binary: String,
}

impl HomebrewManager {
    /// Create a manager using the default brew location
    pub fn new(session: RemoteSession) -> Self {
        Self {
            session,
            binary: DEFAULT_BREW.to_string(),
        }
    }

    /// Use a different brew binary (e.g. `/opt/homebrew/bin/brew`)
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn host(&self) -> &str {
        self.session.host()
    }

    async fn try_update(&self) -> Result<String, ExecError> {
        self.session.run(&brew(&self.binary, "update")).await?;
        let count = self.session.run(&brew_outdated_count(&self.binary)).await?;
        Ok(count.stdout.trim().to_string())
    }

    async fn try_upgrade(&self) -> Result<(), ExecError> {
        self.session.run(&brew(&self.binary, "upgrade")).await?;
        self.session.run(&brew(&self.binary, "cleanup")).await?;
        Ok(())
    }
}

#[async_trait]
impl PackageManager for HomebrewManager {
    #[instrument(skip(self), fields(host = %self.host()))]
    async fn update(&self) -> String {
        match self.try_update().await {
            Ok(count) => {
                debug!(%count, "outdated formulae counted");
                format!("{count} packages to update")
            }
            Err(e) => {
                warn!(error = %e, "brew update failed");
                e.report()
            }
        }
    }

    #[instrument(skip(self), fields(host = %self.host()))]
    async fn upgrade(&self) -> String {
        match self.try_upgrade().await {
            Ok(()) => UPGRADE_DONE.to_string(),
            Err(e) => {
                warn!(error = %e, "brew upgrade failed");
                e.report()
            }
        }
    }

    async fn update_all(&self) -> Report {
        let host = self.host();
        let mut report = Report::line(format!("{host}: System update:"));

        let count = match self.try_update().await {
            Ok(count) => count,
            Err(e) => {
                warn!(host, error = %e, "brew update failed, not upgrading");
                report.push(format!("{host}: {}", e.report()));
                return report;
            }
        };
        report.push(format!("{host}: {count} packages to update"));

        if parse::outdated_count(&count) == Some(0) {
            report.push(format!("{host}: {NOTHING_TO_DO}"));
        } else {
            report.push(format!("{host}: {}", self.upgrade().await));
        }

        info!(host, "brew maintenance finished");
        report
    }
}

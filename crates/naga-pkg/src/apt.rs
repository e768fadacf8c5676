//! APT package manager (Debian/Ubuntu/Raspbian)

use async_trait::async_trait;
use naga_exec::{ExecError, RemoteSession};
use tracing::{debug, info, instrument, warn};

use crate::commands::{
    APT_AUTOREMOVE, APT_SIMULATE_UPGRADE, APT_UPDATE, APT_UPGRADE, CHECKRESTART,
    CHECKRESTART_PACKAGE, CHECKRESTART_PATH, REBOOT_SENTINEL, apt_install, apt_remove,
};
use crate::parse;
use crate::traits::PackageManager;
use crate::types::Report;

/// Returned by `upgrade` when the upgrade completed
pub const UPGRADE_DONE: &str = "system updated";
/// Appended by the restart check when the reboot sentinel exists
pub const RESTART_ALERT: &str = "*** System restart required ***";
/// Returned by `update` when the dry run printed no summary line
pub const NO_SUMMARY: &str = "no upgrade summary reported";

/// Debian-family protocol over one host's session
#[derive(Debug, Clone)]
pub struct AptManager {
    session: RemoteSession,
}

impl AptManager {
    /// Create a new APT manager
    pub fn new(session: RemoteSession) -> Self {
        Self { session }
    }

    fn host(&self) -> &str {
        self.session.host()
    }

    async fn try_update(&self) -> Result<String, ExecError> {
        self.session.sudo(APT_UPDATE).await?;
        let dry_run = self.session.run(APT_SIMULATE_UPGRADE).await?;
        Ok(parse::upgrade_summary(&dry_run.stdout).unwrap_or_else(|| NO_SUMMARY.to_string()))
    }

    /// Remove orphaned dependencies; returns the last line apt printed
    #[instrument(skip(self), fields(host = %self.host()))]
    pub async fn autoremove(&self) -> String {
        match self.session.sudo(APT_AUTOREMOVE).await {
            Ok(result) => result.last_line().unwrap_or_default().trim().to_string(),
            Err(e) => {
                warn!(error = %e, "autoremove failed");
                e.report()
            }
        }
    }

    /// Check for services and the system needing a restart.
    ///
    /// Installs `debian-goodies` first when `checkrestart` is missing.
    #[instrument(skip(self), fields(host = %self.host()))]
    pub async fn check_restart(&self) -> Report {
        match self.try_check_restart().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "restart check failed");
                Report::line(format!("{}: {}", self.host(), e.report()))
            }
        }
    }

    async fn try_check_restart(&self) -> Result<Report, ExecError> {
        if !self.session.file_exists(CHECKRESTART_PATH).await? {
            info!(package = CHECKRESTART_PACKAGE, "checkrestart missing, installing");
            let install = self.install(CHECKRESTART_PACKAGE).await;
            debug!(lines = ?install.lines, "checkrestart install finished");
        }

        let output = self.session.sudo(CHECKRESTART).await?;
        let mut report = Report::line(format!(
            "{}: {}",
            self.host(),
            output.first_line().unwrap_or_default().trim()
        ));

        if self.session.file_exists(REBOOT_SENTINEL).await? {
            info!("reboot sentinel present");
            report.push(RESTART_ALERT);
            report.restart_required = true;
        }

        Ok(report)
    }

    /// Install one package, reporting its summary and transfer lines
    #[instrument(skip(self), fields(host = %self.host()))]
    pub async fn install(&self, package: &str) -> Report {
        let mut report = Report::line(format!("{}: {package} install:", self.host()));
        if !parse::is_valid_package(package) {
            report.push(format!("{}: invalid package name '{package}'", self.host()));
            return report;
        }

        match self.session.sudo(&apt_install(package)).await {
            Ok(result) => report.extend(parse::install_lines(&result.stdout)),
            Err(e) => report.push(e.report()),
        }
        report
    }

    /// Remove one package, then autoremove and re-check for restarts
    #[instrument(skip(self), fields(host = %self.host()))]
    pub async fn remove(&self, package: &str) -> Report {
        let mut report = Report::line(format!("{}: {package} removal:", self.host()));
        if !parse::is_valid_package(package) {
            report.push(format!("{}: invalid package name '{package}'", self.host()));
            return report;
        }

        match self.session.sudo(&apt_remove(package)).await {
            Ok(result) => {
                report.extend(parse::removal_lines(&result.stdout));
                report.push(format!("{} autoremove: {}", self.host(), self.autoremove().await));
                report.merge(self.check_restart().await);
            }
            Err(e) => report.push(e.report()),
        }
        report
    }
}

#[async_trait]
impl PackageManager for AptManager {
    #[instrument(skip(self), fields(host = %self.host()))]
    async fn update(&self) -> String {
        match self.try_update().await {
            Ok(summary) => {
                debug!(%summary, "package index refreshed");
                summary
            }
            Err(e) => {
                warn!(error = %e, "apt update failed");
                e.report()
            }
        }
    }

    #[instrument(skip(self), fields(host = %self.host()))]
    async fn upgrade(&self) -> String {
        match self.session.sudo(APT_UPGRADE).await {
            Ok(_) => UPGRADE_DONE.to_string(),
            Err(e) => {
                warn!(error = %e, "apt upgrade failed");
                e.report()
            }
        }
    }

    async fn update_all(&self) -> Report {
        let host = self.host();
        let mut report = Report::line(format!("{host}: System update:"));

        match self.try_update().await {
            Ok(summary) => report.push(format!("{host}: {summary}")),
            Err(e) if e.is_connection() => {
                warn!(host, error = %e, "host unreachable, abandoning update");
                report.push(format!("{host}: {}", e.report()));
                return report;
            }
            Err(e) => report.push(format!("{host}: {}", e.report())),
        }

        report.push(format!("{host}: {}", self.upgrade().await));
        report.push(format!("{host} autoremove: {}", self.autoremove().await));
        report.merge(self.check_restart().await);

        info!(
            host,
            restart_required = report.restart_required,
            "apt maintenance finished"
        );
        report
    }
}

//! `Dispatcher`: run a host's updater and tasks
//!
//! The updater runs first, then each assigned task in order. Reports are
//! concatenated and the restart flag is raised if any step raised it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use naga_pkg::{AptManager, HomebrewManager, PackageManager, Report};

use crate::catalog::{Delay, Operation, PowerMode};
use crate::config::{EngineConfig, UnknownTaskPolicy};
use crate::error::CoreError;
use crate::model::{Host, SessionFactory};
use crate::reboot::RebootCascade;
use crate::registry::HostRegistry;
use crate::sync::RepoSyncEngine;
use crate::tasks::{self, ScriptDeploy};

/// Everything one host produced during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostReport {
    /// Host name
    pub host: String,
    /// Lines and restart flag
    #[serde(flatten)]
    pub report: Report,
}

impl HostReport {
    /// Wrap a report
    pub fn new(host: impl Into<String>, report: Report) -> Self {
        Self {
            host: host.into(),
            report,
        }
    }
}

/// Resolves task identifiers against the catalog and runs them
pub struct Dispatcher {
    registry: Arc<dyn HostRegistry>,
    sessions: Arc<dyn SessionFactory>,
    config: EngineConfig,
    sync: RepoSyncEngine,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(
        registry: Arc<dyn HostRegistry>,
        sessions: Arc<dyn SessionFactory>,
        config: EngineConfig,
    ) -> Self {
        let sync = RepoSyncEngine::new(config.sync.clone());
        Self {
            registry,
            sessions,
            config,
            sync,
        }
    }

    /// Registry this dispatcher reads hosts from
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn HostRegistry> {
        &self.registry
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reboot cascade over this dispatcher's registry
    #[must_use]
    pub fn cascade(&self) -> RebootCascade {
        RebootCascade::new(
            self.registry.clone(),
            self.sessions.clone(),
            self.config.cascade.max_depth,
        )
    }

    /// Load `name` from the registry and run its updater and tasks
    ///
    /// # Errors
    /// Registry errors, including an unknown host name. Remote failures are
    /// report lines, not errors.
    pub async fn update_host(&self, name: &str) -> Result<HostReport, CoreError> {
        let record = self.registry.require(name).await?;
        let host = match Host::bind(record, self.sessions.as_ref()) {
            Ok(host) => host,
            Err(e) => {
                warn!(host = name, error = %e, "cannot build session");
                return Ok(HostReport::new(name, Report::line(format!("{name}: {}", e.report()))));
            }
        };
        let report = self.run_host(&host).await;
        host.session.close().await;
        Ok(HostReport::new(name, report))
    }

    /// Load `name` and run a single operation in place of its task list
    ///
    /// # Errors
    /// Registry errors, including an unknown host name
    pub async fn run_adhoc(&self, name: &str, operation: &Operation) -> Result<HostReport, CoreError> {
        let record = self.registry.require(name).await?;
        let host = match Host::bind(record, self.sessions.as_ref()) {
            Ok(host) => host,
            Err(e) => {
                return Ok(HostReport::new(name, Report::line(format!("{name}: {}", e.report()))));
            }
        };
        let report = self.run_operation(&host, operation).await;
        host.session.close().await;
        Ok(HostReport::new(name, report))
    }

    /// Updater first, then every task in assignment order
    #[instrument(skip(self, host), fields(host = %host.name()))]
    pub async fn run_host(&self, host: &Host) -> Report {
        let mut report = self
            .run_operation(host, &Operation::parse(&host.record.updater))
            .await;
        for task in &host.record.tasks {
            report.merge(self.run_operation(host, &Operation::parse(task)).await);
        }
        info!(
            lines = report.lines.len(),
            restart_required = report.restart_required,
            "host finished"
        );
        report
    }

    /// Run one catalog operation against `host`
    pub async fn run_operation(&self, host: &Host, operation: &Operation) -> Report {
        let session = &host.session;
        let apt = || AptManager::new(session.clone());
        let brew = || {
            HomebrewManager::new(session.clone()).with_binary(self.config.homebrew.binary.clone())
        };
        let prefixed = |line: String| Report::line(format!("{}: {line}", host.name()));

        match operation {
            Operation::AptAll => apt().update_all().await,
            Operation::AptUpdate => prefixed(apt().update().await),
            Operation::AptUpgrade => prefixed(apt().upgrade().await),
            Operation::AptAutoremove => {
                Report::line(format!("{} autoremove: {}", host.name(), apt().autoremove().await))
            }
            Operation::AptCheckRestart => apt().check_restart().await,
            Operation::AptInstall(package) => apt().install(package).await,
            Operation::AptRemove(package) => apt().remove(package).await,
            Operation::BrewAll => brew().update_all().await,
            Operation::BrewUpdate => prefixed(brew().update().await),
            Operation::BrewUpgrade => prefixed(brew().upgrade().await),
            Operation::GitAll => self.sync.sync_all(session).await,
            Operation::GitRepo(path) => Report::line(self.sync.sync_repo(session, path).await.line()),
            Operation::PiholeUp => tasks::pihole_up(session).await,
            Operation::VersionCheck => tasks::version_check(session).await,
            Operation::Script(path) => {
                ScriptDeploy::new(self.config.dispatch.script_dest.clone())
                    .run(session, path)
                    .await
            }
            Operation::Reboot(delay) => self.power(host, *delay, PowerMode::Reboot).await,
            Operation::Halt(delay) => self.power(host, *delay, PowerMode::Halt).await,
            Operation::Unknown(identifier) => match self.config.dispatch.unknown_task {
                UnknownTaskPolicy::Fallback => {
                    warn!(host = host.name(), task = %identifier, "unknown task, running version_check");
                    tasks::version_check(session).await
                }
                UnknownTaskPolicy::Reject => {
                    warn!(host = host.name(), task = %identifier, "unknown task rejected");
                    prefixed(format!("unknown task {identifier}"))
                }
            },
        }
    }

    async fn power(&self, host: &Host, delay: Delay, mode: PowerMode) -> Report {
        let tree = self.cascade().run(&host.record, delay, mode).await;
        let mut report = Report::new();
        report.extend(tree.lines());
        report
    }
}

//! Fleet-wide runs

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use naga_pkg::Report;

use crate::catalog::Operation;
use crate::dispatch::{Dispatcher, HostReport};
use crate::error::CoreError;

/// Result of running every host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetReport {
    /// Per-host reports, in registry order
    pub hosts: Vec<HostReport>,
    /// Hosts that raised the restart flag
    pub restart_required: Vec<String>,
    /// Hosts whose run ended in an error rather than a report
    pub failed: Vec<String>,
}

impl FleetReport {
    fn record(&mut self, report: HostReport) {
        if report.report.restart_required {
            self.restart_required.push(report.host.clone());
        }
        self.hosts.push(report);
    }

    fn record_failure(&mut self, host: String, reason: String) {
        self.hosts
            .push(HostReport::new(host.clone(), Report::line(format!("{host}: {reason}"))));
        self.failed.push(host);
    }
}

/// Run every registered host through `dispatcher`.
///
/// Hosts run `batch_size` at a time, each on its own task; a batch finishes
/// before the next starts. With `operation` set, each host runs that
/// operation instead of its updater and tasks.
///
/// # Errors
/// `CoreError::NoHosts` when the registry is empty, or a registry error
/// while listing hosts
pub async fn run_fleet(
    dispatcher: Arc<Dispatcher>,
    operation: Option<Operation>,
) -> Result<FleetReport, CoreError> {
    let names = dispatcher.registry().host_names().await?;
    if names.is_empty() {
        return Err(CoreError::NoHosts);
    }

    let batch_size = dispatcher.config().fleet.batch_size.max(1);
    info!(total_hosts = names.len(), batch_size, "starting fleet run");

    let mut fleet = FleetReport::default();
    for batch in names.chunks(batch_size) {
        let mut handles = Vec::with_capacity(batch.len());

        for name in batch {
            let dispatcher = dispatcher.clone();
            let operation = operation.clone();
            let host = name.clone();
            let handle = tokio::spawn(async move {
                match operation {
                    Some(op) => dispatcher.run_adhoc(&host, &op).await,
                    None => dispatcher.update_host(&host).await,
                }
            });
            handles.push((name.clone(), handle));
        }

        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => {
                    info!(host = %name, "host completed");
                    fleet.record(report);
                }
                Ok(Err(e)) => {
                    error!(host = %name, error = %e, "host failed");
                    fleet.record_failure(name, e.to_string());
                }
                Err(e) => {
                    error!(host = %name, error = %e, "host task panicked");
                    fleet.record_failure(name, format!("task failed: {e}"));
                }
            }
        }
    }

    info!(
        total = fleet.hosts.len(),
        failed = fleet.failed.len(),
        restart_required = fleet.restart_required.len(),
        "fleet run finished"
    );
    Ok(fleet)
}

//! Auxiliary tasks: version check, Pi-hole update and script deployment

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, instrument, warn};

use naga_exec::session::shell_quote;
use naga_exec::{ExecError, RemoteSession};
use naga_pkg::Report;

/// Raw bytes per upload command; 48 KiB encodes to 64 KiB of base64
const CHUNK_BYTES: usize = 48 * 1024;

/// Report the host's distribution string (`distro` on the host's PATH)
#[instrument(skip(session), fields(host = %session.host()))]
pub async fn version_check(session: &RemoteSession) -> Report {
    let host = session.host();
    match session.run("distro").await {
        Ok(result) => Report::line(format!("{host}: {}", result.stdout.trim())),
        Err(e) => {
            warn!(error = %e, "version check failed");
            Report::line(format!("{host}: {}", e.report()))
        }
    }
}

/// Run `pihole -up` and report its last line
#[instrument(skip(session), fields(host = %session.host()))]
pub async fn pihole_up(session: &RemoteSession) -> Report {
    let host = session.host();
    let mut report = Report::line(format!("{host}: Update Pi-Hole"));
    match session.sudo("pihole -up").await {
        Ok(result) => report.push(format!(
            "{host}: pihole {}",
            result.last_line().unwrap_or_default().trim()
        )),
        Err(e) => {
            warn!(error = %e, "pihole update failed");
            report.push(format!("{host}: {}", e.report()));
        }
    }
    report
}

/// Copies a local file to a host and optionally runs it.
///
/// The file travels as base64 through ordinary commands, so no file-transfer
/// subsystem is needed on the host.
#[derive(Debug, Clone)]
pub struct ScriptDeploy {
    dest_dir: String,
}

impl ScriptDeploy {
    /// Deploy into `dest_dir` and run the script
    pub fn new(dest_dir: impl Into<String>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
        }
    }

    /// Remote path the script lands at
    #[must_use]
    pub fn destination(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.dest_dir.trim_end_matches('/'))
    }

    /// Deploy `local` to the host
    #[instrument(skip(self, session), fields(host = %session.host()))]
    pub async fn run(&self, session: &RemoteSession, local: &str) -> Report {
        let host = session.host();
        let mut report = Report::line(format!("Deploying to {host}..."));

        let path = expand_home(local);
        let file_name = path.file_name().and_then(|n| n.to_str()).map(str::to_string);
        let (Some(file_name), true) = (file_name, path.is_file()) else {
            report.push(format!("{} is not a valid filename", path.display()));
            return report;
        };

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                report.push(format!("{host}: Transfer failed: {e}"));
                return report;
            }
        };

        let dest = self.destination(&file_name);
        if let Err(e) = upload(session, &contents, &dest).await {
            warn!(error = %e, "upload failed");
            report.push(format!("{host}: Transfer failed: {}", e.report()));
            return report;
        }
        info!(dest = %dest, bytes = contents.len(), "script uploaded");

        match session.run(&shell_quote(&dest)).await {
            Ok(result) => report.extend(
                result
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| format!("{host}: {l}")),
            ),
            Err(e) => report.push(format!("{host}: {}", e.report())),
        }
        report
    }
}

async fn upload(session: &RemoteSession, contents: &[u8], dest: &str) -> Result<(), ExecError> {
    let target = shell_quote(dest);
    if contents.is_empty() {
        session.run(&format!(": > {target}")).await?;
    }
    for (i, chunk) in contents.chunks(CHUNK_BYTES).enumerate() {
        let redirect = if i == 0 { ">" } else { ">>" };
        let encoded = STANDARD.encode(chunk);
        debug!(chunk = i, len = encoded.len(), "sending chunk");
        session
            .run(&format!("printf '%s' '{encoded}' | base64 -d {redirect} {target}"))
            .await?;
    }
    session.run(&format!("chmod 755 {target}")).await?;
    Ok(())
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => Path::new(path).to_path_buf(),
    }
}

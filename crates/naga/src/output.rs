//! Report rendering: plain lines or JSON on stdout

use std::io::{self, Write};

use serde::Serialize;

use naga_core::{CascadeNode, FleetReport, HostReport};

/// Writes reports in the selected format
pub struct Printer<W: Write> {
    out: W,
    json: bool,
}

impl Printer<io::Stdout> {
    /// Printer on stdout
    pub fn stdout(json: bool) -> Self {
        Self::new(io::stdout(), json)
    }
}

impl<W: Write> Printer<W> {
    /// Printer on any writer
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    /// One or more hosts' report lines, then the hosts needing a restart
    ///
    /// # Errors
    /// I/O or serialization errors
    pub fn fleet(&mut self, fleet: &FleetReport) -> eyre::Result<()> {
        if self.json {
            return self.json_value(fleet);
        }
        for host in &fleet.hosts {
            self.lines(&host.report.lines)?;
        }
        self.restart_summary(&fleet.restart_required)
    }

    /// A single host's run
    ///
    /// # Errors
    /// I/O or serialization errors
    pub fn host(&mut self, report: &HostReport) -> eyre::Result<()> {
        let mut fleet = FleetReport::default();
        if report.report.restart_required {
            fleet.restart_required.push(report.host.clone());
        }
        fleet.hosts.push(report.clone());
        self.fleet(&fleet)
    }

    /// Cascade outcomes, children before parents
    ///
    /// # Errors
    /// I/O or serialization errors
    pub fn cascade(&mut self, tree: &CascadeNode) -> eyre::Result<()> {
        if self.json {
            return self.json_value(tree);
        }
        self.lines(&tree.lines())
    }

    /// Anything serializable in JSON mode, `plain` lines otherwise
    ///
    /// # Errors
    /// I/O or serialization errors
    pub fn value<T: Serialize>(&mut self, value: &T, plain: &[String]) -> eyre::Result<()> {
        if self.json {
            return self.json_value(value);
        }
        self.lines(plain)
    }

    fn restart_summary(&mut self, hosts: &[String]) -> eyre::Result<()> {
        if hosts.is_empty() {
            writeln!(self.out, "No hosts require a restart")?;
        } else {
            writeln!(self.out, "Hosts requiring restart: {}", hosts.join(", "))?;
        }
        Ok(())
    }

    fn lines(&mut self, lines: &[String]) -> eyre::Result<()> {
        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    fn json_value<T: Serialize>(&mut self, value: &T) -> eyre::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, value)?;
        writeln!(self.out)?;
        Ok(())
    }
}

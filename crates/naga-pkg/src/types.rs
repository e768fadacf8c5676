//! Type definitions for package management

use serde::{Deserialize, Serialize};

/// Ordered report lines plus the restart-required flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Human-readable lines, in the order the steps ran
    pub lines: Vec<String>,
    /// Raised when the host needs a restart
    pub restart_required: bool,
}

impl Report {
    /// Empty report
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report holding a single line
    pub fn line(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
            restart_required: false,
        }
    }

    /// Append a line
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Append another report, keeping any restart flag it raised
    pub fn merge(&mut self, other: Report) {
        self.lines.extend(other.lines);
        self.restart_required |= other.restart_required;
    }

    /// Mark restart as required
    #[must_use]
    pub fn with_restart(mut self) -> Self {
        self.restart_required = true;
        self
    }
}

impl Extend<String> for Report {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.lines.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_restart_flag() {
        let mut report = Report::line("web1: System update:");
        report.merge(Report::line("*** System restart required ***").with_restart());
        report.merge(Report::line("web1 repo ~/: already up to date"));

        assert!(report.restart_required);
        assert_eq!(report.lines.len(), 3);
    }
}

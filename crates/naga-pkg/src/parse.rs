//! Output parsers for package manager and git commands
//!
//! Upstream tools do not promise a stable output format, so every output
//! pattern naga relies on lives here, one parser per command shape.

use std::sync::OnceLock;

use regex::Regex;

static SUMMARY_RE: OnceLock<Regex> = OnceLock::new();
static INSTALL_RE: OnceLock<Regex> = OnceLock::new();
static REMOVE_RE: OnceLock<Regex> = OnceLock::new();
static PACKAGE_RE: OnceLock<Regex> = OnceLock::new();
static FILES_CHANGED_RE: OnceLock<Regex> = OnceLock::new();

/// Last line of `git status` for a repository with nothing to commit
pub const WORKING_TREE_CLEAN: &str = "working tree clean";
/// Last line of `git pull` when nothing was fetched (`Already up to date.`)
pub const ALREADY_UP_TO_DATE: &str = "Already ";

/// apt summary lines start with a count:
/// `3 upgraded, 0 newly installed, 0 to remove and 0 not upgraded.`
fn summary_re() -> &'static Regex {
    SUMMARY_RE.get_or_init(|| Regex::new(r"^[0-9]").unwrap())
}

/// Install output worth keeping: count summaries and the `Fetched` transfer line
fn install_re() -> &'static Regex {
    INSTALL_RE.get_or_init(|| Regex::new(r"^(?:[0-9]|Fetched)").unwrap())
}

/// Removal output worth keeping: count summaries and `Removing <pkg>` lines
fn remove_re() -> &'static Regex {
    REMOVE_RE.get_or_init(|| Regex::new(r"^(?:[0-9]|Removing)").unwrap())
}

/// Package arguments: a Debian name with optional `:arch` or `=version`
fn package_re() -> &'static Regex {
    PACKAGE_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.+:=~_-]*$").unwrap())
}

/// Diffstat summary of `git pull`: ` 3 files changed, 10 insertions(+)`
fn files_changed_re() -> &'static Regex {
    FILES_CHANGED_RE.get_or_init(|| Regex::new(r"^ [0-9]+ file").unwrap())
}

/// First upgrade summary line of `apt-get --just-print upgrade`
#[must_use]
pub fn upgrade_summary(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find(|l| summary_re().is_match(l))
        .map(|l| l.trim().to_string())
}

/// Lines of `apt-get install` output to report
#[must_use]
pub fn install_lines(stdout: &str) -> Vec<String> {
    keep_matching(stdout, install_re())
}

/// Lines of `apt-get remove` output to report
#[must_use]
pub fn removal_lines(stdout: &str) -> Vec<String> {
    keep_matching(stdout, remove_re())
}

/// Count printed by the `brew outdated | wc -l` pipeline
#[must_use]
pub fn outdated_count(stdout: &str) -> Option<u32> {
    stdout.trim().parse().ok()
}

/// Whether `name` is safe to splice into an apt command line
#[must_use]
pub fn is_valid_package(name: &str) -> bool {
    package_re().is_match(name)
}

/// Whether `git status` output ends on a clean working tree
#[must_use]
pub fn is_clean_tree(stdout: &str) -> bool {
    stdout
        .lines()
        .last()
        .is_some_and(|l| l.contains(WORKING_TREE_CLEAN))
}

/// Whether `git pull` output ends on the nothing-to-do line
#[must_use]
pub fn is_up_to_date(stdout: &str) -> bool {
    stdout
        .lines()
        .last()
        .is_some_and(|l| l.contains(ALREADY_UP_TO_DATE))
}

/// The last diffstat summary line of `git pull`, trimmed
#[must_use]
pub fn files_changed(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .filter(|l| files_changed_re().is_match(l))
        .last()
        .map(|l| l.trim().to_string())
}

/// Subdirectories listed by `find <dir> -maxdepth 1 -type d`.
///
/// `find` prints the directory itself first; fewer than two lines means
/// there are no subdirectories.
#[must_use]
pub fn subdirectories(stdout: &str) -> Vec<String> {
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Vec::new();
    }
    lines[1..].iter().map(|l| l.trim().to_string()).collect()
}

fn keep_matching(stdout: &str, re: &Regex) -> Vec<String> {
    stdout
        .lines()
        .filter(|l| re.is_match(l))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUST_PRINT: &str = "Reading package lists...
Building dependency tree...
Reading state information...
Calculating upgrade...
The following packages will be upgraded:
  curl libcurl4
2 upgraded, 0 newly installed, 0 to remove and 0 not upgraded.
Inst curl [7.88.1-10+deb12u4] (7.88.1-10+deb12u5 Debian-Security:12/stable-security [amd64])
";

    #[test]
    fn test_upgrade_summary() {
        assert_eq!(
            upgrade_summary(JUST_PRINT).as_deref(),
            Some("2 upgraded, 0 newly installed, 0 to remove and 0 not upgraded.")
        );
        assert_eq!(upgrade_summary("Reading package lists...\n"), None);
    }

    #[test]
    fn test_install_lines() {
        let out = "Reading package lists...
The following NEW packages will be installed:
  debian-goodies
1 upgraded, 1 newly installed, 0 to remove and 3 not upgraded.
Need to get 67.2 kB of archives.
Fetched 67.2 kB in 0s (512 kB/s)
Setting up debian-goodies (0.88) ...
";

        assert_eq!(
            install_lines(out),
            vec![
                "1 upgraded, 1 newly installed, 0 to remove and 3 not upgraded.",
                "Fetched 67.2 kB in 0s (512 kB/s)",
            ]
        );
    }

    #[test]
    fn test_removal_lines() {
        let out = "The following packages will be REMOVED:
  vim
0 upgraded, 0 newly installed, 1 to remove and 0 not upgraded.
Removing vim (2:9.0.1378-2) ...
Processing triggers for man-db (2.11.2-2) ...
";

        assert_eq!(
            removal_lines(out),
            vec![
                "0 upgraded, 0 newly installed, 1 to remove and 0 not upgraded.",
                "Removing vim (2:9.0.1378-2) ...",
            ]
        );
    }

    #[test]
    fn test_outdated_count() {
        assert_eq!(outdated_count("12\n"), Some(12));
        assert_eq!(outdated_count("0"), Some(0));
        assert_eq!(outdated_count("Error: no network"), None);
    }

    #[test]
    fn test_git_status_and_pull() {
        let status = "On branch main\nYour branch is up to date with 'origin/main'.\n\nnothing to commit, working tree clean\n";
        assert!(is_clean_tree(status));
        assert!(!is_clean_tree("On branch main\nChanges not staged for commit:\n\tmodified:   README.md\n"));
        assert!(!is_clean_tree(""));

        assert!(is_up_to_date("Already up to date.\n"));
        assert!(is_up_to_date("Already up-to-date.\n"));

        let pull = "Updating 1a2b3c4..5d6e7f8
Fast-forward
 README.md | 2 +-
 src/main.rs | 10 ++++++++--
 2 files changed, 9 insertions(+), 3 deletions(-)
";
        assert!(!is_up_to_date(pull));
        assert_eq!(
            files_changed(pull).as_deref(),
            Some("2 files changed, 9 insertions(+), 3 deletions(-)")
        );
    }

    #[test]
    fn test_subdirectories() {
        assert_eq!(
            subdirectories("/home/ops/repos/\n/home/ops/repos/naga\n/home/ops/repos/dotfiles\n"),
            vec!["/home/ops/repos/naga", "/home/ops/repos/dotfiles"]
        );
        assert!(subdirectories("/home/ops/repos/\n").is_empty());
        assert!(subdirectories("").is_empty());
    }

    #[test]
    fn test_package_validation() {
        assert!(is_valid_package("debian-goodies"));
        assert!(is_valid_package("libc6:amd64"));
        assert!(is_valid_package("nginx=1.22.1-9"));
        assert!(!is_valid_package("vim; rm -rf /"));
        assert!(!is_valid_package(""));
    }
}

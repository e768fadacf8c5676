//! The closed catalog of maintenance operations
//!
//! Task identifiers are stored as `name` or `name:arg`. Anything that does not
//! resolve becomes `Operation::Unknown`, which the dispatcher handles by
//! policy.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// When a power operation takes effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delay {
    /// Minutes from now (`+N`)
    Relative(u32),
    /// Wall-clock time (`HH:MM`)
    At(NaiveTime),
}

impl Delay {
    /// The same delay one minute later, carrying into the hour and wrapping
    /// past midnight
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Delay::Relative(minutes) => Delay::Relative(minutes.saturating_add(1)),
            Delay::At(time) => Delay::At(time.overflowing_add_signed(TimeDelta::minutes(1)).0),
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Delay::Relative(1)
    }
}

impl FromStr for Delay {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "now" {
            return Ok(Delay::Relative(0));
        }
        if let Some(minutes) = s.strip_prefix('+') {
            return minutes
                .parse()
                .map(Delay::Relative)
                .map_err(|_| CoreError::InvalidDelay(s.to_string()));
        }
        NaiveTime::parse_from_str(s, "%H:%M")
            .map(Delay::At)
            .map_err(|_| CoreError::InvalidDelay(s.to_string()))
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delay::Relative(minutes) => write!(f, "+{minutes}"),
            Delay::At(time) => write!(f, "{}", time.format("%H:%M")),
        }
    }
}

/// Reboot or halt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerMode {
    /// `shutdown -r`
    Reboot,
    /// `shutdown -h`
    Halt,
}

impl PowerMode {
    /// `shutdown` flag for this mode
    #[must_use]
    pub fn flag(self) -> &'static str {
        match self {
            PowerMode::Reboot => "-r",
            PowerMode::Halt => "-h",
        }
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerMode::Reboot => write!(f, "reboot"),
            PowerMode::Halt => write!(f, "halt"),
        }
    }
}

/// A resolved task identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Debian update, upgrade, autoremove and restart check
    AptAll,
    /// Debian index refresh and upgrade summary
    AptUpdate,
    /// Debian upgrade
    AptUpgrade,
    /// Debian autoremove
    AptAutoremove,
    /// Debian restart check
    AptCheckRestart,
    /// Install one Debian package
    AptInstall(String),
    /// Remove one Debian package
    AptRemove(String),
    /// Homebrew update and, when needed, upgrade
    BrewAll,
    /// Homebrew update and outdated count
    BrewUpdate,
    /// Homebrew upgrade and cleanup
    BrewUpgrade,
    /// Sync every repository on the host
    GitAll,
    /// Sync one repository
    GitRepo(String),
    /// Update Pi-hole
    PiholeUp,
    /// Report the distribution string
    VersionCheck,
    /// Deploy and run a local script
    Script(String),
    /// Reboot cascade
    Reboot(Delay),
    /// Halt cascade
    Halt(Delay),
    /// Anything else
    Unknown(String),
}

impl Operation {
    /// Resolve a stored identifier (`name` or `name:arg`)
    #[must_use]
    pub fn parse(identifier: &str) -> Self {
        let identifier = identifier.trim();
        match identifier.split_once(':') {
            Some((name, arg)) => Self::from_parts(name, Some(arg)),
            None => Self::from_parts(identifier, None),
        }
    }

    /// Resolve an operation name and optional argument
    #[must_use]
    pub fn from_parts(name: &str, arg: Option<&str>) -> Self {
        let arg = arg.map(str::trim).filter(|a| !a.is_empty());
        match (name, arg) {
            ("apt_all", None) => Operation::AptAll,
            ("apt_update", None) => Operation::AptUpdate,
            ("apt_upgrade", None) => Operation::AptUpgrade,
            ("apt_autoremove", None) => Operation::AptAutoremove,
            ("apt_checkrestart", None) => Operation::AptCheckRestart,
            ("apt_install", Some(pkg)) => Operation::AptInstall(pkg.to_string()),
            ("apt_remove", Some(pkg)) => Operation::AptRemove(pkg.to_string()),
            ("brew_all", None) => Operation::BrewAll,
            ("brew_update", None) => Operation::BrewUpdate,
            ("brew_upgrade", None) => Operation::BrewUpgrade,
            ("git_all", None) => Operation::GitAll,
            ("git_repo", Some(path)) => Operation::GitRepo(path.to_string()),
            ("pihole_up", None) => Operation::PiholeUp,
            ("version_check", None) => Operation::VersionCheck,
            ("script", Some(path)) => Operation::Script(path.to_string()),
            ("reboot" | "halt", arg) => {
                let delay = match arg.map(str::parse::<Delay>) {
                    None => Delay::default(),
                    Some(Ok(delay)) => delay,
                    Some(Err(_)) => return Operation::Unknown(join(name, arg)),
                };
                if name == "reboot" {
                    Operation::Reboot(delay)
                } else {
                    Operation::Halt(delay)
                }
            }
            _ => Operation::Unknown(join(name, arg)),
        }
    }

    /// Whether this is a power operation handled by the reboot cascade
    #[must_use]
    pub fn is_power(&self) -> bool {
        matches!(self, Operation::Reboot(_) | Operation::Halt(_))
    }
}

fn join(name: &str, arg: Option<&str>) -> String {
    match arg {
        Some(arg) => format!("{name}:{arg}"),
        None => name.to_string(),
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::AptAll => write!(f, "apt_all"),
            Operation::AptUpdate => write!(f, "apt_update"),
            Operation::AptUpgrade => write!(f, "apt_upgrade"),
            Operation::AptAutoremove => write!(f, "apt_autoremove"),
            Operation::AptCheckRestart => write!(f, "apt_checkrestart"),
            Operation::AptInstall(pkg) => write!(f, "apt_install:{pkg}"),
            Operation::AptRemove(pkg) => write!(f, "apt_remove:{pkg}"),
            Operation::BrewAll => write!(f, "brew_all"),
            Operation::BrewUpdate => write!(f, "brew_update"),
            Operation::BrewUpgrade => write!(f, "brew_upgrade"),
            Operation::GitAll => write!(f, "git_all"),
            Operation::GitRepo(path) => write!(f, "git_repo:{path}"),
            Operation::PiholeUp => write!(f, "pihole_up"),
            Operation::VersionCheck => write!(f, "version_check"),
            Operation::Script(path) => write!(f, "script:{path}"),
            Operation::Reboot(delay) => write!(f, "reboot:{delay}"),
            Operation::Halt(delay) => write!(f, "halt:{delay}"),
            Operation::Unknown(identifier) => write!(f, "{identifier}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> Delay {
        Delay::At(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    #[test]
    fn test_delay_parse_and_display() {
        assert_eq!("+5".parse::<Delay>().unwrap(), Delay::Relative(5));
        assert_eq!("now".parse::<Delay>().unwrap(), Delay::Relative(0));
        assert_eq!("23:05".parse::<Delay>().unwrap(), at(23, 5));
        assert_eq!(at(7, 3).to_string(), "07:03");
        assert_eq!(Delay::Relative(2).to_string(), "+2");
        assert!("+x".parse::<Delay>().is_err());
        assert!("25:00".parse::<Delay>().is_err());
        assert!("soon".parse::<Delay>().is_err());
    }

    #[test]
    fn test_delay_next_carries() {
        assert_eq!(Delay::Relative(1).next(), Delay::Relative(2));
        assert_eq!(at(10, 15).next(), at(10, 16));
        assert_eq!(at(10, 59).next(), at(11, 0));
        assert_eq!(at(23, 59).next(), at(0, 0));
    }

    #[test]
    fn test_parse_catalog() {
        assert_eq!(Operation::parse("apt_all"), Operation::AptAll);
        assert_eq!(
            Operation::parse("apt_install:debian-goodies"),
            Operation::AptInstall("debian-goodies".to_string())
        );
        assert_eq!(
            Operation::parse("git_repo:~/repos/naga"),
            Operation::GitRepo("~/repos/naga".to_string())
        );
        assert_eq!(Operation::parse("reboot"), Operation::Reboot(Delay::Relative(1)));
        assert_eq!(Operation::parse("halt:12:30"), Operation::Halt(at(12, 30)));
        assert_eq!(
            Operation::from_parts("reboot", Some("+3")),
            Operation::Reboot(Delay::Relative(3))
        );
    }

    #[test]
    fn test_unresolved_identifiers_are_unknown() {
        assert_eq!(
            Operation::parse("docker_prune"),
            Operation::Unknown("docker_prune".to_string())
        );
        assert_eq!(
            Operation::parse("apt_install"),
            Operation::Unknown("apt_install".to_string())
        );
        assert_eq!(
            Operation::parse("reboot:later"),
            Operation::Unknown("reboot:later".to_string())
        );
    }

    #[test]
    fn test_display_matches_identifier() {
        for id in ["apt_all", "apt_remove:vim", "script:~/bin/fix.sh", "halt:+4", "brew_all"] {
            assert_eq!(Operation::parse(id).to_string(), id);
        }
    }
}

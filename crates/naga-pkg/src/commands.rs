//! Remote command strings
//!
//! These are sent verbatim; changing one changes what runs on every host.

/// Refresh the package index (elevated)
pub const APT_UPDATE: &str = "apt-get update";
/// Dry-run upgrade, used only for its summary line (unprivileged)
pub const APT_SIMULATE_UPGRADE: &str = "apt-get --just-print upgrade";
/// Non-interactive upgrade (elevated)
pub const APT_UPGRADE: &str = "DEBIAN_FRONTEND=noninteractive apt-get -y upgrade";
/// Remove orphaned dependencies (elevated)
pub const APT_AUTOREMOVE: &str = "apt-get -y autoremove";
/// Service restart checker (elevated)
pub const CHECKRESTART: &str = "checkrestart";
/// Where `checkrestart` is installed
pub const CHECKRESTART_PATH: &str = "/usr/sbin/checkrestart";
/// Package providing `checkrestart`
pub const CHECKRESTART_PACKAGE: &str = "debian-goodies";
/// Present when the kernel or libc asks for a reboot
pub const REBOOT_SENTINEL: &str = "/var/run/reboot-required";

/// Default Homebrew binary
pub const DEFAULT_BREW: &str = "/usr/local/bin/brew";

/// Non-interactive install of one package (elevated)
#[must_use]
pub fn apt_install(package: &str) -> String {
    format!("DEBIAN_FRONTEND=noninteractive apt-get -y install {package}")
}

/// Non-interactive removal of one package (elevated)
#[must_use]
pub fn apt_remove(package: &str) -> String {
    format!("DEBIAN_FRONTEND=noninteractive apt-get -y remove {package}")
}

/// `brew <subcommand>` using the configured binary
#[must_use]
pub fn brew(binary: &str, subcommand: &str) -> String {
    format!("{binary} {subcommand}")
}

/// Number of outdated formulae, printed as a bare integer
#[must_use]
pub fn brew_outdated_count(binary: &str) -> String {
    format!("{binary} outdated | wc -l | awk '{{print $1}}'")
}

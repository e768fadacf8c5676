//! Engine configuration
//!
//! Every component takes its settings explicitly at construction; the
//! binary deserialises these from its TOML file.

use serde::{Deserialize, Serialize};

/// Repository sync settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Parent directory whose first-level subdirectories are repositories
    #[serde(default = "default_repos_dir")]
    pub repos_dir: String,
    /// Repositories synced on every host
    #[serde(default = "default_fixed_repos")]
    pub fixed_repos: Vec<String>,
    /// Marker file that suppresses sync of a repository
    #[serde(default = "default_guard_file")]
    pub guard_file: String,
    /// Executable run after a repository pulled new commits
    #[serde(default = "default_hook_file")]
    pub hook_file: String,
}

fn default_repos_dir() -> String {
    "~/repos/".to_string()
}

fn default_fixed_repos() -> Vec<String> {
    vec!["~/".to_string(), "~/.ssh/".to_string(), "~/bin/".to_string()]
}

fn default_guard_file() -> String {
    ".noPull".to_string()
}

fn default_hook_file() -> String {
    ".postpull.sh".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repos_dir: default_repos_dir(),
            fixed_repos: default_fixed_repos(),
            guard_file: default_guard_file(),
            hook_file: default_hook_file(),
        }
    }
}

/// What the dispatcher does with a task identifier it cannot resolve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTaskPolicy {
    /// Run `version_check` instead
    #[default]
    Fallback,
    /// Report the identifier as unknown
    Reject,
}

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Handling of unresolved task identifiers
    #[serde(default)]
    pub unknown_task: UnknownTaskPolicy,
    /// Remote directory scripts are deployed to
    #[serde(default = "default_script_dest")]
    pub script_dest: String,
}

fn default_script_dest() -> String {
    "/tmp".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            unknown_task: UnknownTaskPolicy::default(),
            script_dest: default_script_dest(),
        }
    }
}

/// Fleet run settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Hosts updated concurrently; 1 runs the fleet strictly in order
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    1
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Reboot cascade settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Deepest descendant level the cascade will schedule
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    16
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Homebrew settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomebrewConfig {
    /// Path of the brew binary on macOS hosts
    #[serde(default = "default_brew_binary")]
    pub binary: String,
}

fn default_brew_binary() -> String {
    naga_pkg::commands::DEFAULT_BREW.to_string()
}

impl Default for HomebrewConfig {
    fn default() -> Self {
        Self {
            binary: default_brew_binary(),
        }
    }
}

/// Everything the dispatcher and fleet runner need
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `[sync]`
    #[serde(default)]
    pub sync: SyncConfig,
    /// `[dispatch]`
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// `[fleet]`
    #[serde(default)]
    pub fleet: FleetConfig,
    /// `[cascade]`
    #[serde(default)]
    pub cascade: CascadeConfig,
    /// `[homebrew]`
    #[serde(default)]
    pub homebrew: HomebrewConfig,
}

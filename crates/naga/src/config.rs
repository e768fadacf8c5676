//! Configuration loading and types

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use naga_core::EngineConfig;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "NAGA_CONFIG";

/// Top-level configuration for naga
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Registry file settings
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Connection defaults for every host
    #[serde(default)]
    pub ssh: SshConfig,
    /// Per-host connection overrides
    #[serde(default)]
    pub hosts: BTreeMap<String, HostOverride>,
    /// Sync, dispatch, fleet, cascade and homebrew settings
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            registry: RegistryConfig::default(),
            ssh: SshConfig::default(),
            hosts: BTreeMap::new(),
            engine: EngineConfig::default(),
        }
    }
}

/// `[registry]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// SQLite file holding hosts, tasks and power edges
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

/// `[ssh]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Login user
    #[serde(default = "default_user")]
    pub user: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Private key file; `~/.ssh/id_ed25519` or `~/.ssh/id_rsa` when unset
    #[serde(default)]
    pub key: Option<PathBuf>,
    /// Environment variable holding a base64-encoded private key
    #[serde(default)]
    pub key_env: Option<String>,
    /// Run privileged commands through `sudo -n`
    #[serde(default = "default_sudo")]
    pub sudo: bool,
    /// Per-command timeout
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            port: default_port(),
            key: None,
            key_env: None,
            sudo: default_sudo(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

/// `[hosts.<name>]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostOverride {
    /// Address to connect to instead of the host name
    #[serde(default)]
    pub addr: Option<String>,
    /// Login user
    #[serde(default)]
    pub user: Option<String>,
    /// SSH port
    #[serde(default)]
    pub port: Option<u16>,
    /// Private key file
    #[serde(default)]
    pub key: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("hosts.db")
}

fn default_user() -> String {
    "root".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_sudo() -> bool {
    true
}

fn default_command_timeout() -> u64 {
    600
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("cannot read {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `explicit`, else the first file found on the search path, else defaults
    ///
    /// # Errors
    /// Returns error if the chosen file cannot be read or parsed
    pub fn locate(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        for path in search_paths() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "using config file");
                return Self::load(&path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Config::default())
    }

    /// Connection override for `host`, if any
    #[must_use]
    pub fn host(&self, host: &str) -> Option<&HostOverride> {
        self.hosts.get(host)
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("naga.toml"),
        PathBuf::from("/etc/naga/naga.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("naga/naga.toml"));
    }
    paths
}

//! Session factory: SSH or local executors for registry hosts

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use naga_core::{HostRecord, SessionFactory};
use naga_exec::{
    Elevation, ExecError, LocalExecutor, RemoteExecutor, RemoteSession, SshExecutorBuilder,
};

use crate::config::Config;

/// Default implementation of `SessionFactory`
pub struct DefaultSessionFactory {
    config: Config,
}

impl DefaultSessionFactory {
    /// Create a factory from the `[ssh]` and `[hosts.*]` sections
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Create a remote executor for a host
    fn create_executor(&self, name: &str) -> Result<Arc<dyn RemoteExecutor>, ExecError> {
        let host = self.config.host(name).cloned().unwrap_or_default();
        let ssh = &self.config.ssh;
        let addr = host.addr.unwrap_or_else(|| name.to_string());

        // For localhost connections, use LocalExecutor
        if addr == "localhost" || addr == "127.0.0.1" {
            return Ok(Arc::new(LocalExecutor::new()));
        }

        let user = host.user.unwrap_or_else(|| ssh.user.clone());
        let mut builder = SshExecutorBuilder::new(addr, user).with_port(host.port.unwrap_or(ssh.port));
        builder = match (host.key.or_else(|| ssh.key.clone()), &ssh.key_env) {
            (Some(path), _) => builder.with_key_path(path),
            (None, Some(var)) => builder.with_env_key(var.clone()),
            (None, None) => match default_key() {
                Some(path) => builder.with_key_path(path),
                None => builder,
            },
        };
        Ok(Arc::new(builder.build()?))
    }

    fn elevation(&self) -> Elevation {
        if self.config.ssh.sudo {
            Elevation::Sudo
        } else {
            Elevation::None
        }
    }
}

/// First of `~/.ssh/id_ed25519`, `~/.ssh/id_rsa` that exists
fn default_key() -> Option<PathBuf> {
    let ssh_dir = dirs::home_dir()?.join(".ssh");
    ["id_ed25519", "id_rsa"]
        .iter()
        .map(|name| ssh_dir.join(name))
        .find(|path| path.exists())
}

impl SessionFactory for DefaultSessionFactory {
    fn session_for(&self, record: &HostRecord) -> Result<RemoteSession, ExecError> {
        let executor = self.create_executor(&record.name)?;
        tracing::debug!(
            host = %record.name,
            executor = executor.executor_type(),
            "session created"
        );
        Ok(RemoteSession::new(record.name.clone(), executor)
            .with_elevation(self.elevation())
            .with_timeout(Duration::from_secs(self.config.ssh.command_timeout_secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostOverride;

    fn record(name: &str) -> HostRecord {
        HostRecord {
            id: 1,
            name: name.to_string(),
            updater: "apt_all".to_string(),
            tasks: vec![],
            children: vec![],
        }
    }

    #[test]
    fn test_localhost_executor_creation() {
        let factory = DefaultSessionFactory::new(&Config::default());

        let session = factory.session_for(&record("localhost")).unwrap();
        assert_eq!(session.host(), "localhost");
    }

    #[test]
    fn test_address_override_selects_local_executor() {
        let mut config = Config::default();
        config.hosts.insert(
            "nas1".to_string(),
            HostOverride {
                addr: Some("127.0.0.1".to_string()),
                ..HostOverride::default()
            },
        );
        let factory = DefaultSessionFactory::new(&config);

        let executor = factory.create_executor("nas1").unwrap();
        assert_eq!(executor.executor_type(), "local");
    }

    #[test]
    fn test_missing_key_file_is_a_session_error() {
        let mut config = Config::default();
        config.ssh.key = Some(PathBuf::from("/nonexistent/naga/id_ed25519"));
        let factory = DefaultSessionFactory::new(&config);

        assert!(factory.session_for(&record("web1")).is_err());
    }

    #[test]
    fn test_elevation_follows_sudo_flag() {
        let mut config = Config::default();
        assert_eq!(DefaultSessionFactory::new(&config).elevation(), Elevation::Sudo);

        config.ssh.sudo = false;
        assert_eq!(DefaultSessionFactory::new(&config).elevation(), Elevation::None);
    }
}

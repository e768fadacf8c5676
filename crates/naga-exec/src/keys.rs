//! SSH key resolution

use std::env;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

/// Where the SSH private key comes from
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Key file on disk
    Path(PathBuf),
    /// SSH agent
    Agent,
    /// Base64-encoded key held in an environment variable
    Env(String),
}

impl KeySource {
    /// Resolve to something the SSH client can load.
    ///
    /// `Env` keys are decoded into a 0600 temp file that lives as long as the
    /// returned `ResolvedKey`.
    ///
    /// # Errors
    /// Returns `KeyError` if the key is missing, unreadable or too permissive
    pub fn resolve(&self) -> Result<ResolvedKey, KeyError> {
        match self {
            KeySource::Path(path) => {
                check_permissions(path)?;
                Ok(ResolvedKey::Path(path.clone()))
            }
            KeySource::Agent => Ok(ResolvedKey::Agent),
            KeySource::Env(var) => {
                let encoded = env::var(var).map_err(|_| KeyError::EnvNotSet(var.clone()))?;
                let decoded = decode(&encoded).map_err(|_| KeyError::InvalidBase64)?;
                Ok(ResolvedKey::Temp(write_temp_key(&decoded)?))
            }
        }
    }
}

/// Resolved key location
#[derive(Debug)]
pub enum ResolvedKey {
    /// Key file owned by the user
    Path(PathBuf),
    /// SSH agent
    Agent,
    /// Decoded key in its own temp file, deleted on drop
    Temp(NamedTempFile),
}

impl ResolvedKey {
    /// Path of the key file, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ResolvedKey::Path(p) => Some(p),
            ResolvedKey::Temp(file) => Some(file.path()),
            ResolvedKey::Agent => None,
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

fn check_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => KeyError::NotFound(path.display().to_string()),
        _ => KeyError::Io(e),
    })?;

    // group/other bits must be clear
    if metadata.permissions().mode() & 0o077 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

/// Write `key` to a fresh 0600 file owned by the returned handle
fn write_temp_key(key: &[u8]) -> Result<NamedTempFile, KeyError> {
    use std::io::Write;

    let mut file = tempfile::Builder::new().prefix("naga_ssh_key_").tempfile()?;
    file.write_all(key)?;
    file.flush()?;

    debug!(path = %file.path().display(), "wrote temporary SSH key");

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_file() {
        let source = KeySource::Path(PathBuf::from("/nonexistent/naga/id_ed25519"));

        assert!(matches!(source.resolve(), Err(KeyError::NotFound(_))));
    }

    #[test]
    fn test_unset_env_key() {
        let source = KeySource::Env("NAGA_TEST_KEY_THAT_IS_NOT_SET".to_string());

        assert!(matches!(source.resolve(), Err(KeyError::EnvNotSet(_))));
    }

    #[test]
    fn test_agent_has_no_path() {
        let resolved = KeySource::Agent.resolve().unwrap();

        assert!(resolved.path().is_none());
    }

    #[test]
    fn test_temp_keys_are_independent() {
        use std::os::unix::fs::PermissionsExt;

        let first = ResolvedKey::Temp(write_temp_key(b"first").unwrap());
        let second = ResolvedKey::Temp(write_temp_key(b"second").unwrap());
        let first_path = first.path().unwrap().to_path_buf();
        let second_path = second.path().unwrap().to_path_buf();
        assert_ne!(first_path, second_path);

        let mode = std::fs::metadata(&second_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);

        drop(first);

        assert!(!first_path.exists());
        assert!(second_path.exists());
        assert_eq!(std::fs::read(&second_path).unwrap(), b"second");
    }
}

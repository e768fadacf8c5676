//! Host data model

use serde::{Deserialize, Serialize};

use naga_exec::{ExecError, RemoteSession};

/// Stable registry id of a host
pub type HostId = i64;

/// A host as persisted in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Registry id
    pub id: HostId,
    /// Unique host name, also used as the connection target
    pub name: String,
    /// Primary maintenance operation identifier
    pub updater: String,
    /// Auxiliary task identifiers, in assignment order
    pub tasks: Vec<String>,
    /// Ids of hosts powered by this one
    pub children: Vec<HostId>,
}

/// Input for registering a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHost {
    /// Unique host name
    pub name: String,
    /// Primary maintenance operation identifier
    pub updater: String,
    /// Auxiliary task identifiers
    #[serde(default)]
    pub tasks: Vec<String>,
}

impl NewHost {
    /// Host with an updater and no tasks
    pub fn new(name: impl Into<String>, updater: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            updater: updater.into(),
            tasks: Vec::new(),
        }
    }

    /// Add a task
    #[must_use]
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.tasks.push(task.into());
        self
    }
}

/// Builds the session used to reach a host.
///
/// Sessions connect lazily, so building one does not touch the network.
pub trait SessionFactory: Send + Sync {
    /// Session for `record`
    ///
    /// # Errors
    /// Returns an error when the host's connection settings are unusable
    fn session_for(&self, record: &HostRecord) -> Result<RemoteSession, ExecError>;
}

/// A host loaded for one run: its record plus a live session
#[derive(Debug, Clone)]
pub struct Host {
    /// Registry record
    pub record: HostRecord,
    /// Session bound at load time
    pub session: RemoteSession,
}

impl Host {
    /// Bind a session to `record`
    ///
    /// # Errors
    /// Propagates the factory's error
    pub fn bind(record: HostRecord, sessions: &dyn SessionFactory) -> Result<Self, ExecError> {
        let session = sessions.session_for(&record)?;
        Ok(Self { record, session })
    }

    /// Host name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.record.name
    }
}

//! Core error types for naga-core

use thiserror::Error;

use crate::model::HostId;

/// Errors from the registry, the host model and fleet runs.
///
/// Remote command failures are not represented here: they are report lines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No host with this name in the registry
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// No host with this id in the registry
    #[error("host id not found: {0}")]
    HostIdNotFound(HostId),

    /// Host name already taken
    #[error("host already exists: {0}")]
    HostAlreadyExists(String),

    /// Host record failed validation
    #[error("invalid host: {0}")]
    InvalidHost(String),

    /// Task already assigned to the host
    #[error("task {task} already assigned to {host}")]
    TaskAlreadyAssigned {
        /// Host name
        host: String,
        /// Task identifier
        task: String,
    },

    /// Task is not assigned to the host
    #[error("task {task} is not assigned to {host}")]
    TaskNotAssigned {
        /// Host name
        host: String,
        /// Task identifier
        task: String,
    },

    /// A host cannot power itself
    #[error("host {0} cannot be its own child")]
    SelfLink(String),

    /// Edge would close a loop in the power-dependency graph
    #[error("linking {child} under {parent} would create a cycle")]
    Cycle {
        /// Parent host name
        parent: String,
        /// Child host name
        child: String,
    },

    /// Child already linked under the parent
    #[error("{child} is already a child of {parent}")]
    ChildAlreadyLinked {
        /// Parent host name
        parent: String,
        /// Child host name
        child: String,
    },

    /// Child is not linked under the parent
    #[error("{child} is not a child of {parent}")]
    NotAChild {
        /// Parent host name
        parent: String,
        /// Child host name
        child: String,
    },

    /// Delay is neither `+N`, `HH:MM` nor `now`
    #[error("invalid delay: {0}")]
    InvalidDelay(String),

    /// Fleet run requested with an empty registry
    #[error("no hosts defined")]
    NoHosts,

    /// Backing store failure
    #[error("registry error: {0}")]
    Registry(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

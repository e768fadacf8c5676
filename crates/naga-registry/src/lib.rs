//! naga-registry: SQLite-backed host registry
//!
//! The store is owned by a kameo actor; [`Registry`] is a cheap, cloneable
//! handle that implements `naga_core::HostRegistry` by asking it.

pub mod actor;
pub mod store;

use std::path::Path;

use async_trait::async_trait;
use kameo::actor::{ActorRef, Spawn};
use kameo::error::SendError;

use naga_core::{CoreError, HostId, HostRecord, HostRegistry, NewHost};

pub use actor::RegistryActor;
pub use store::{Store, StoreError};

use actor::{
    AddChild, AddHost, AssignTask, DeleteHost, FindHost, GetHost, ListHosts, RemoveChild,
    RemoveTask,
};

/// Handle to a running registry actor
#[derive(Clone)]
pub struct Registry {
    actor: ActorRef<RegistryActor>,
}

impl Registry {
    /// Open an existing registry file
    ///
    /// # Errors
    /// `StoreError::Missing` when the file does not exist, SQLite errors
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self::spawn(Store::open(path)?))
    }

    /// Create the registry file and schema if needed, then open it
    ///
    /// # Errors
    /// SQLite errors
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self::spawn(Store::init(path)?))
    }

    /// Start an actor owning `store`
    #[must_use]
    pub fn spawn(store: Store) -> Self {
        Self {
            actor: RegistryActor::spawn(store),
        }
    }

    /// Stop the actor once queued messages are handled
    pub async fn shutdown(&self) {
        self.actor.stop_gracefully().await.ok();
    }
}

fn unwrap_reply<M>(err: SendError<M, CoreError>) -> CoreError {
    match err {
        SendError::HandlerError(e) => e,
        _ => CoreError::Registry("registry actor is not running".to_string()),
    }
}

#[async_trait]
impl HostRegistry for Registry {
    async fn host_names(&self) -> Result<Vec<String>, CoreError> {
        self.actor.ask(ListHosts).await.map_err(unwrap_reply)
    }

    async fn find(&self, name: &str) -> Result<Option<HostRecord>, CoreError> {
        self.actor
            .ask(FindHost {
                name: name.to_string(),
            })
            .await
            .map_err(unwrap_reply)
    }

    async fn get(&self, id: HostId) -> Result<Option<HostRecord>, CoreError> {
        self.actor.ask(GetHost { id }).await.map_err(unwrap_reply)
    }

    async fn add_host(&self, host: NewHost) -> Result<HostId, CoreError> {
        self.actor.ask(AddHost { host }).await.map_err(unwrap_reply)
    }

    async fn delete_host(&self, name: &str) -> Result<(), CoreError> {
        self.actor
            .ask(DeleteHost {
                name: name.to_string(),
            })
            .await
            .map_err(unwrap_reply)
    }

    async fn assign_task(&self, name: &str, task: &str) -> Result<(), CoreError> {
        self.actor
            .ask(AssignTask {
                host: name.to_string(),
                task: task.to_string(),
            })
            .await
            .map_err(unwrap_reply)
    }

    async fn remove_task(&self, name: &str, task: &str) -> Result<(), CoreError> {
        self.actor
            .ask(RemoveTask {
                host: name.to_string(),
                task: task.to_string(),
            })
            .await
            .map_err(unwrap_reply)
    }

    async fn add_child(&self, parent: &str, child: &str) -> Result<(), CoreError> {
        self.actor
            .ask(AddChild {
                parent: parent.to_string(),
                child: child.to_string(),
            })
            .await
            .map_err(unwrap_reply)
    }

    async fn remove_child(&self, parent: &str, child: &str) -> Result<(), CoreError> {
        self.actor
            .ask(RemoveChild {
                parent: parent.to_string(),
                child: child.to_string(),
            })
            .await
            .map_err(unwrap_reply)
    }
}

//! `RegistryActor`: sole owner of the SQLite connection
//!
//! Every read and write is a message, so concurrent fleet tasks see
//! mutations applied one at a time.

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tracing::info;

use naga_core::{CoreError, HostId, HostRecord, NewHost};

use crate::store::Store;

/// List every host name
#[derive(Debug, Clone)]
pub struct ListHosts;

/// Look a host up by name
#[derive(Debug, Clone)]
pub struct FindHost {
    /// Host name
    pub name: String,
}

/// Look a host up by id
#[derive(Debug, Clone)]
pub struct GetHost {
    /// Host id
    pub id: HostId,
}

/// Register a host
#[derive(Debug, Clone)]
pub struct AddHost {
    /// Host to add
    pub host: NewHost,
}

/// Delete a host
#[derive(Debug, Clone)]
pub struct DeleteHost {
    /// Host name
    pub name: String,
}

/// Assign a task
#[derive(Debug, Clone)]
pub struct AssignTask {
    /// Host name
    pub host: String,
    /// Task identifier
    pub task: String,
}

/// Remove a task
#[derive(Debug, Clone)]
pub struct RemoveTask {
    /// Host name
    pub host: String,
    /// Task identifier
    pub task: String,
}

/// Link a child under a parent
#[derive(Debug, Clone)]
pub struct AddChild {
    /// Parent host name
    pub parent: String,
    /// Child host name
    pub child: String,
}

/// Unlink a child from a parent
#[derive(Debug, Clone)]
pub struct RemoveChild {
    /// Parent host name
    pub parent: String,
    /// Child host name
    pub child: String,
}

/// Actor wrapping the registry store
pub struct RegistryActor {
    store: Store,
}

impl Actor for RegistryActor {
    type Args = Store;
    type Error = CoreError;

    async fn on_start(store: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(id = %actor_ref.id(), "RegistryActor starting");
        Ok(Self { store })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(reason = ?reason, "RegistryActor stopping");
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<ListHosts> for RegistryActor {
    type Reply = Result<Vec<String>, CoreError>;

    async fn handle(&mut self, _msg: ListHosts, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.store.host_names()?)
    }
}

impl Message<FindHost> for RegistryActor {
    type Reply = Result<Option<HostRecord>, CoreError>;

    async fn handle(&mut self, msg: FindHost, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.store.find(&msg.name)?)
    }
}

impl Message<GetHost> for RegistryActor {
    type Reply = Result<Option<HostRecord>, CoreError>;

    async fn handle(&mut self, msg: GetHost, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.store.get(msg.id)?)
    }
}

impl Message<AddHost> for RegistryActor {
    type Reply = Result<HostId, CoreError>;

    async fn handle(&mut self, msg: AddHost, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.store.add_host(msg.host)?)
    }
}

impl Message<DeleteHost> for RegistryActor {
    type Reply = Result<(), CoreError>;

    async fn handle(&mut self, msg: DeleteHost, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.store.delete_host(&msg.name)?)
    }
}

impl Message<AssignTask> for RegistryActor {
    type Reply = Result<(), CoreError>;

    async fn handle(&mut self, msg: AssignTask, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.store.assign_task(&msg.host, &msg.task)?)
    }
}

impl Message<RemoveTask> for RegistryActor {
    type Reply = Result<(), CoreError>;

    async fn handle(&mut self, msg: RemoveTask, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.store.remove_task(&msg.host, &msg.task)?)
    }
}

impl Message<AddChild> for RegistryActor {
    type Reply = Result<(), CoreError>;

    async fn handle(&mut self, msg: AddChild, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.store.add_child(&msg.parent, &msg.child)?)
    }
}

impl Message<RemoveChild> for RegistryActor {
    type Reply = Result<(), CoreError>;

    async fn handle(&mut self, msg: RemoveChild, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.store.remove_child(&msg.parent, &msg.child)?)
    }
}

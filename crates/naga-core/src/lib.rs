//! naga-core: Host model, registry contract and maintenance workflows
//!
//! Resolves each host's updater and tasks against a closed catalog,
//! syncs repositories, runs reboot cascades down the power-dependency
//! graph, and drives fleet-wide runs.

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fleet;
pub mod model;
pub mod reboot;
pub mod registry;
pub mod sync;
pub mod tasks;

pub use catalog::{Delay, Operation, PowerMode};
pub use config::{
    CascadeConfig, DispatchConfig, EngineConfig, FleetConfig, HomebrewConfig, SyncConfig,
    UnknownTaskPolicy,
};
pub use dispatch::{Dispatcher, HostReport};
pub use error::CoreError;
pub use fleet::{FleetReport, run_fleet};
pub use model::{Host, HostId, HostRecord, NewHost, SessionFactory};
pub use reboot::{CascadeNode, CascadeOutcome, RebootCascade};
pub use registry::{HostRegistry, MemoryRegistry};
pub use sync::{RepoOutcome, RepoState, RepoSyncEngine};

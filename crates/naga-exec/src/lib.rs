//! naga-exec: Remote command execution for fleet maintenance
//!
//! Provides the `RemoteExecutor` transport trait, local and SSH executors,
//! and `RemoteSession`, which adds elevation, timeouts and the
//! connection/command failure classification every report line relies on.

pub mod error;
pub mod keys;
pub mod local;
pub mod result;
#[cfg(feature = "scripted")]
pub mod scripted;
pub mod session;
pub mod ssh;
pub mod traits;

pub use error::{ExecError, FailureKind};
pub use keys::{KeyError, KeySource};
pub use local::LocalExecutor;
pub use result::{CommandResult, ConnectionInfo};
#[cfg(feature = "scripted")]
pub use scripted::ScriptedExecutor;
pub use session::{Elevation, RemoteSession};
pub use ssh::{SshExecutor, SshExecutorBuilder};
pub use traits::RemoteExecutor;

//! naga-pkg: Package manager protocols
//!
//! Drives the Debian (`apt-get`) and Homebrew update sequences over a
//! `RemoteSession` and turns their output into report lines. Remote failures
//! never escape an adapter: they come back as `failed: ...` or
//! `connection failed: ...` lines.

pub mod apt;
pub mod brew;
pub mod commands;
pub mod parse;
pub mod traits;
pub mod types;

pub use apt::AptManager;
pub use brew::HomebrewManager;
pub use traits::PackageManager;
pub use types::Report;

//! Package manager traits

use async_trait::async_trait;

use crate::types::Report;

/// A package manager protocol bound to one host's session.
///
/// None of these methods fail: remote errors are folded into the returned
/// strings and reports.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Refresh package metadata and summarise pending upgrades
    async fn update(&self) -> String;

    /// Apply pending upgrades
    async fn upgrade(&self) -> String;

    /// The full maintenance sequence, with the restart-required flag
    async fn update_all(&self) -> Report;
}

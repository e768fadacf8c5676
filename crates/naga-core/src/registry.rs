//! `HostRegistry`: the persistence contract for hosts, tasks and power edges

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{HostId, HostRecord, NewHost};

/// Host, task and parent/child storage.
///
/// Implementations serialize mutations; callers may share one registry
/// across concurrent fleet tasks.
#[async_trait]
pub trait HostRegistry: Send + Sync {
    /// Every host name, in id order
    async fn host_names(&self) -> Result<Vec<String>, CoreError>;

    /// Look a host up by name
    async fn find(&self, name: &str) -> Result<Option<HostRecord>, CoreError>;

    /// Look a host up by id
    async fn get(&self, id: HostId) -> Result<Option<HostRecord>, CoreError>;

    /// Register a host; returns its id
    async fn add_host(&self, host: NewHost) -> Result<HostId, CoreError>;

    /// Delete a host, its tasks, and every parent's reference to it
    async fn delete_host(&self, name: &str) -> Result<(), CoreError>;

    /// Assign a task to a host
    async fn assign_task(&self, name: &str, task: &str) -> Result<(), CoreError>;

    /// Remove a task from a host
    async fn remove_task(&self, name: &str, task: &str) -> Result<(), CoreError>;

    /// Link `child` under `parent`
    async fn add_child(&self, parent: &str, child: &str) -> Result<(), CoreError>;

    /// Unlink `child` from `parent`
    async fn remove_child(&self, parent: &str, child: &str) -> Result<(), CoreError>;

    /// Look a host up by name, failing when it does not exist
    async fn require(&self, name: &str) -> Result<HostRecord, CoreError> {
        self.find(name)
            .await?
            .ok_or_else(|| CoreError::HostNotFound(name.to_string()))
    }
}

/// Check a new host before it is stored
///
/// # Errors
/// `CoreError::InvalidHost` for an empty name or updater
pub fn validate_new_host(host: &NewHost) -> Result<(), CoreError> {
    if host.name.trim().is_empty() {
        return Err(CoreError::InvalidHost("name is empty".to_string()));
    }
    if host.name.contains(char::is_whitespace) {
        return Err(CoreError::InvalidHost(format!(
            "name '{}' contains whitespace",
            host.name
        )));
    }
    if host.updater.trim().is_empty() {
        return Err(CoreError::InvalidHost(format!(
            "{} has no updater",
            host.name
        )));
    }
    Ok(())
}

/// Whether adding the edge `parent -> child` would close a loop.
///
/// `children_of` returns the current child ids of a host.
pub fn creates_cycle<F>(parent: HostId, child: HostId, children_of: F) -> bool
where
    F: Fn(HostId) -> Vec<HostId>,
{
    if parent == child {
        return true;
    }

    let mut seen = HashSet::new();
    let mut stack = vec![child];
    while let Some(id) = stack.pop() {
        if id == parent {
            return true;
        }
        if seen.insert(id) {
            stack.extend(children_of(id));
        }
    }
    false
}

/// Task list without duplicates, keeping first occurrences in order
#[must_use]
pub fn dedup_tasks(tasks: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: HostId,
    hosts: BTreeMap<HostId, HostRecord>,
}

impl MemoryInner {
    fn by_name(&self, name: &str) -> Result<&HostRecord, CoreError> {
        self.hosts
            .values()
            .find(|h| h.name == name)
            .ok_or_else(|| CoreError::HostNotFound(name.to_string()))
    }

    fn by_name_mut(&mut self, name: &str) -> Result<&mut HostRecord, CoreError> {
        self.hosts
            .values_mut()
            .find(|h| h.name == name)
            .ok_or_else(|| CoreError::HostNotFound(name.to_string()))
    }
}

/// In-process registry, for tests and one-off runs
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    inner: RwLock<MemoryInner>,
}

impl MemoryRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HostRegistry for MemoryRegistry {
    async fn host_names(&self) -> Result<Vec<String>, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner.hosts.values().map(|h| h.name.clone()).collect())
    }

    async fn find(&self, name: &str) -> Result<Option<HostRecord>, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner.hosts.values().find(|h| h.name == name).cloned())
    }

    async fn get(&self, id: HostId) -> Result<Option<HostRecord>, CoreError> {
        Ok(self.inner.read().await.hosts.get(&id).cloned())
    }

    async fn add_host(&self, host: NewHost) -> Result<HostId, CoreError> {
        validate_new_host(&host)?;
        let mut inner = self.inner.write().await;
        if inner.hosts.values().any(|h| h.name == host.name) {
            return Err(CoreError::HostAlreadyExists(host.name));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.hosts.insert(
            id,
            HostRecord {
                id,
                tasks: dedup_tasks(&host.tasks),
                name: host.name,
                updater: host.updater,
                children: Vec::new(),
            },
        );
        info!(id, "host added");
        Ok(id)
    }

    async fn delete_host(&self, name: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        let id = inner.by_name(name)?.id;
        inner.hosts.remove(&id);
        for host in inner.hosts.values_mut() {
            host.children.retain(|c| *c != id);
        }
        info!(host = name, "host deleted");
        Ok(())
    }

    async fn assign_task(&self, name: &str, task: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        let host = inner.by_name_mut(name)?;
        if host.tasks.iter().any(|t| t == task) {
            return Err(CoreError::TaskAlreadyAssigned {
                host: name.to_string(),
                task: task.to_string(),
            });
        }
        host.tasks.push(task.to_string());
        debug!(host = name, task, "task assigned");
        Ok(())
    }

    async fn remove_task(&self, name: &str, task: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        let host = inner.by_name_mut(name)?;
        let before = host.tasks.len();
        host.tasks.retain(|t| t != task);
        if host.tasks.len() == before {
            return Err(CoreError::TaskNotAssigned {
                host: name.to_string(),
                task: task.to_string(),
            });
        }
        Ok(())
    }

    async fn add_child(&self, parent: &str, child: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        let parent_id = inner.by_name(parent)?.id;
        let child_id = inner.by_name(child)?.id;

        if parent_id == child_id {
            return Err(CoreError::SelfLink(parent.to_string()));
        }
        if inner.hosts[&parent_id].children.contains(&child_id) {
            return Err(CoreError::ChildAlreadyLinked {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        let hosts = &inner.hosts;
        if creates_cycle(parent_id, child_id, |id| {
            hosts.get(&id).map(|h| h.children.clone()).unwrap_or_default()
        }) {
            return Err(CoreError::Cycle {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }

        if let Some(host) = inner.hosts.get_mut(&parent_id) {
            host.children.push(child_id);
        }
        Ok(())
    }

    async fn remove_child(&self, parent: &str, child: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        let child_id = inner.by_name(child)?.id;
        let host = inner.by_name_mut(parent)?;
        if !host.children.contains(&child_id) {
            return Err(CoreError::NotAChild {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        host.children.retain(|c| *c != child_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry_with(names: &[&str]) -> MemoryRegistry {
        let registry = MemoryRegistry::new();
        for name in names {
            registry.add_host(NewHost::new(*name, "apt_all")).await.unwrap();
        }
        registry
    }

    #[test]
    fn test_creates_cycle() {
        // 1 -> 2 -> 3
        let children = |id: HostId| match id {
            1 => vec![2],
            2 => vec![3],
            _ => vec![],
        };
        assert!(creates_cycle(3, 1, children));
        assert!(creates_cycle(2, 2, children));
        assert!(!creates_cycle(1, 3, children));
        assert!(!creates_cycle(4, 1, children));
    }

    #[tokio::test]
    async fn test_add_and_find() {
        let registry = MemoryRegistry::new();
        let id = registry
            .add_host(NewHost::new("web1", "apt_all").with_task("git_all").with_task("git_all"))
            .await
            .unwrap();

        let host = registry.require("web1").await.unwrap();
        assert_eq!(host.id, id);
        assert_eq!(host.tasks, vec!["git_all"]);
        assert!(host.children.is_empty());
        assert_eq!(registry.get(id).await.unwrap(), Some(host));
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let registry = registry_with(&["web1"]).await;
        let err = registry.add_host(NewHost::new("web1", "brew_all")).await;
        assert_eq!(err, Err(CoreError::HostAlreadyExists("web1".to_string())));
    }

    #[tokio::test]
    async fn test_invalid_host_rejected() {
        let registry = MemoryRegistry::new();
        assert!(matches!(
            registry.add_host(NewHost::new("", "apt_all")).await,
            Err(CoreError::InvalidHost(_))
        ));
        assert!(matches!(
            registry.add_host(NewHost::new("web1", " ")).await,
            Err(CoreError::InvalidHost(_))
        ));
    }

    #[tokio::test]
    async fn test_tasks() {
        let registry = registry_with(&["web1"]).await;
        registry.assign_task("web1", "pihole_up").await.unwrap();
        assert!(matches!(
            registry.assign_task("web1", "pihole_up").await,
            Err(CoreError::TaskAlreadyAssigned { .. })
        ));

        registry.remove_task("web1", "pihole_up").await.unwrap();
        assert!(matches!(
            registry.remove_task("web1", "pihole_up").await,
            Err(CoreError::TaskNotAssigned { .. })
        ));
    }

    #[tokio::test]
    async fn test_child_links_reject_cycles() {
        let registry = registry_with(&["hv1", "web1", "db1"]).await;
        registry.add_child("hv1", "web1").await.unwrap();
        registry.add_child("web1", "db1").await.unwrap();

        assert!(matches!(
            registry.add_child("db1", "hv1").await,
            Err(CoreError::Cycle { .. })
        ));
        assert_eq!(
            registry.add_child("db1", "db1").await,
            Err(CoreError::SelfLink("db1".to_string()))
        );
        assert!(matches!(
            registry.add_child("hv1", "web1").await,
            Err(CoreError::ChildAlreadyLinked { .. })
        ));
        assert_eq!(
            registry.add_child("hv1", "nas").await,
            Err(CoreError::HostNotFound("nas".to_string()))
        );
    }

    #[tokio::test]
    async fn test_delete_severs_parents() {
        let registry = registry_with(&["hv1", "web1"]).await;
        registry.add_child("hv1", "web1").await.unwrap();

        registry.delete_host("web1").await.unwrap();

        assert!(registry.require("hv1").await.unwrap().children.is_empty());
        assert_eq!(registry.host_names().await.unwrap(), vec!["hv1"]);
    }

    #[tokio::test]
    async fn test_remove_child() {
        let registry = registry_with(&["hv1", "web1"]).await;
        registry.add_child("hv1", "web1").await.unwrap();
        registry.remove_child("hv1", "web1").await.unwrap();

        assert!(matches!(
            registry.remove_child("hv1", "web1").await,
            Err(CoreError::NotAChild { .. })
        ));
    }
}

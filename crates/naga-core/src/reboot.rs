//! `RebootCascade`: power a host off after everything it powers
//!
//! Children are always halted, one minute later than their parent's own
//! delay, and they are all scheduled before the parent's command is issued.
//! The cascade returns a tree of per-host outcomes; flattening it is left to
//! the caller. A host reachable along several paths appears once, under
//! the parent on its longest path.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use serde::Serialize;
use tracing::{info, instrument, warn};

use naga_exec::RemoteSession;

use crate::catalog::{Delay, PowerMode};
use crate::model::{HostId, HostRecord, SessionFactory};
use crate::registry::HostRegistry;

/// What happened to one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CascadeOutcome {
    /// `shutdown` accepted; carries its confirmation text
    Scheduled(String),
    /// Remote failure, rendered as a report fragment
    Failed(String),
    /// Not attempted
    Skipped(String),
}

/// One host touched by a cascade, with the children scheduled before it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeNode {
    /// Host name
    pub host: String,
    /// Mode requested for this host
    pub mode: PowerMode,
    /// Delay requested for this host
    pub delay: Delay,
    /// Outcome
    pub outcome: CascadeOutcome,
    /// Descendants, scheduled first
    pub children: Vec<CascadeNode>,
}

impl CascadeNode {
    /// Report line for this node alone
    #[must_use]
    pub fn line(&self) -> String {
        match &self.outcome {
            CascadeOutcome::Scheduled(message) => format!("{} {message}", self.host),
            CascadeOutcome::Failed(report) => format!("{}: {report}", self.host),
            CascadeOutcome::Skipped(reason) => format!("{}: skipped, {reason}", self.host),
        }
    }

    /// Every node, children before their parent
    #[must_use]
    pub fn flatten(&self) -> Vec<&CascadeNode> {
        let mut nodes = Vec::new();
        self.collect(&mut nodes);
        nodes
    }

    fn collect<'a>(&'a self, nodes: &mut Vec<&'a CascadeNode>) {
        for child in &self.children {
            child.collect(nodes);
        }
        nodes.push(self);
    }

    /// One report line per host, children first
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.flatten().into_iter().map(CascadeNode::line).collect()
    }

    /// Whether any host in the tree failed or was skipped
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.flatten()
            .iter()
            .any(|n| !matches!(n.outcome, CascadeOutcome::Scheduled(_)))
    }
}

/// Remote power command for `mode` at `delay`
#[must_use]
pub fn shutdown_command(mode: PowerMode, delay: Delay) -> String {
    format!("/sbin/shutdown {} {delay}", mode.flag())
}

/// Schedules power operations down the parent/child graph
#[derive(Clone)]
pub struct RebootCascade {
    registry: Arc<dyn HostRegistry>,
    sessions: Arc<dyn SessionFactory>,
    max_depth: usize,
}

impl RebootCascade {
    /// Create a cascade over `registry`
    pub fn new(
        registry: Arc<dyn HostRegistry>,
        sessions: Arc<dyn SessionFactory>,
        max_depth: usize,
    ) -> Self {
        Self {
            registry,
            sessions,
            max_depth,
        }
    }

    /// Power-cycle `root` and, transitively, everything it powers
    ///
    /// A host reachable along several paths is powered once, at the delay of
    /// its longest path from `root`.
    #[instrument(skip(self, root), fields(host = %root.name, %delay, %mode))]
    pub async fn run(&self, root: &HostRecord, delay: Delay, mode: PowerMode) -> CascadeNode {
        let plan = self.plan(root).await;
        let node = self.visit(&plan, root, delay, mode).await;
        info!(hosts = node.flatten().len(), "cascade scheduled");
        node
    }

    /// Walk the graph breadth first, deepening a host each time a longer
    /// path to it turns up
    async fn plan(&self, root: &HostRecord) -> Plan {
        let mut plan = Plan {
            max_depth: self.max_depth,
            records: HashMap::from([(root.id, root.clone())]),
            depth: HashMap::from([(root.id, 0)]),
            parent: HashMap::new(),
            skipped: Vec::new(),
        };
        let mut queue = VecDeque::from([vec![root.id]]);

        while let Some(path) = queue.pop_front() {
            let Some(&id) = path.last() else { continue };
            let children = plan
                .records
                .get(&id)
                .map(|r| r.children.clone())
                .unwrap_or_default();

            for child in children {
                if path.contains(&child) {
                    let host = plan.name(child);
                    warn!(%host, "power dependency loop");
                    plan.skip(id, child, host, "already in this cascade".to_string());
                    continue;
                }
                if !plan.records.contains_key(&child) {
                    match self.registry.get(child).await {
                        Ok(Some(record)) => {
                            plan.records.insert(child, record);
                        }
                        Ok(None) => {
                            warn!(id = child, "child host missing from registry");
                            plan.skip(id, child, format!("#{child}"), "not in registry".to_string());
                            continue;
                        }
                        Err(e) => {
                            plan.skip(id, child, format!("#{child}"), e.to_string());
                            continue;
                        }
                    }
                }

                let depth = path.len().min(self.max_depth.saturating_add(1));
                if plan.depth.get(&child).is_some_and(|d| *d >= depth) {
                    continue;
                }
                plan.depth.insert(child, depth);
                plan.parent.insert(child, id);
                if depth > self.max_depth {
                    warn!(host = %plan.name(child), max_depth = self.max_depth, "cascade too deep");
                    continue;
                }
                let mut next = path.clone();
                next.push(child);
                queue.push_back(next);
            }
        }
        plan
    }

    fn visit<'a>(
        &'a self,
        plan: &'a Plan,
        record: &'a HostRecord,
        delay: Delay,
        mode: PowerMode,
    ) -> BoxFuture<'a, CascadeNode> {
        Box::pin(async move {
            let child_delay = delay.next();
            let pending = plan.steps(record).into_iter().map(move |step| async move {
                match step {
                    Step::Visit(child) => self.visit(plan, child, child_delay, PowerMode::Halt).await,
                    Step::Skip(host, reason) => CascadeNode {
                        host,
                        mode: PowerMode::Halt,
                        delay: child_delay,
                        outcome: CascadeOutcome::Skipped(reason),
                        children: Vec::new(),
                    },
                }
            });
            let children = join_all(pending).await;

            let outcome = match self.sessions.session_for(record) {
                Ok(session) => {
                    let outcome = power(&session, mode, delay).await;
                    session.close().await;
                    outcome
                }
                Err(e) => CascadeOutcome::Failed(e.report()),
            };

            CascadeNode {
                host: record.name.clone(),
                mode,
                delay,
                outcome,
                children,
            }
        })
    }
}

/// Hosts reachable from a cascade root, each placed under the parent on
/// its longest path
struct Plan {
    max_depth: usize,
    records: HashMap<HostId, HostRecord>,
    /// Longest path length from the root, capped at `max_depth + 1`
    depth: HashMap<HostId, usize>,
    parent: HashMap<HostId, HostId>,
    /// (parent, child, host label, reason)
    skipped: Vec<(HostId, HostId, String, String)>,
}

enum Step<'a> {
    Visit(&'a HostRecord),
    Skip(String, String),
}

impl Plan {
    fn name(&self, id: HostId) -> String {
        self.records
            .get(&id)
            .map_or_else(|| format!("#{id}"), |r| r.name.clone())
    }

    fn skip(&mut self, parent: HostId, child: HostId, host: String, reason: String) {
        if !self.skipped.iter().any(|(p, c, ..)| *p == parent && *c == child) {
            self.skipped.push((parent, child, host, reason));
        }
    }

    /// What `record` does with each of its children, in link order
    fn steps<'a>(&'a self, record: &HostRecord) -> Vec<Step<'a>> {
        let mut seen = HashSet::new();
        record
            .children
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| {
                if self.parent.get(&id) == Some(&record.id) {
                    let child = self.records.get(&id)?;
                    if self.depth.get(&id).is_some_and(|d| *d > self.max_depth) {
                        return Some(Step::Skip(
                            child.name.clone(),
                            format!("deeper than {} levels", self.max_depth),
                        ));
                    }
                    return Some(Step::Visit(child));
                }
                // scheduled under another parent, or a recorded skip
                self.skipped
                    .iter()
                    .find(|(p, c, ..)| *p == record.id && *c == id)
                    .map(|(_, _, host, reason)| Step::Skip(host.clone(), reason.clone()))
            })
            .collect()
    }
}

async fn power(session: &RemoteSession, mode: PowerMode, delay: Delay) -> CascadeOutcome {
    match session.sudo(&shutdown_command(mode, delay)).await {
        Ok(result) => {
            let confirmation = result
                .stderr
                .trim()
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            if confirmation.is_empty() {
                CascadeOutcome::Scheduled(format!("{mode} scheduled {delay}"))
            } else {
                CascadeOutcome::Scheduled(confirmation)
            }
        }
        Err(e) => {
            warn!(host = session.host(), error = %e, "power command failed");
            CascadeOutcome::Failed(e.report())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveTime;
    use naga_exec::{CommandResult, Elevation, ExecError, ScriptedExecutor};

    use super::*;
    use crate::model::NewHost;
    use crate::registry::MemoryRegistry;

    /// One scripted executor per host name
    #[derive(Default)]
    struct Fleet {
        executors: HashMap<String, Arc<ScriptedExecutor>>,
    }

    impl Fleet {
        fn with(mut self, host: &str, executor: ScriptedExecutor) -> Self {
            self.executors.insert(host.to_string(), Arc::new(executor));
            self
        }

        fn calls(&self, host: &str) -> Vec<String> {
            self.executors[host].calls()
        }
    }

    impl SessionFactory for Fleet {
        fn session_for(&self, record: &HostRecord) -> Result<RemoteSession, ExecError> {
            let executor = self
                .executors
                .get(&record.name)
                .cloned()
                .ok_or_else(|| ExecError::ConfigError(format!("no executor for {}", record.name)))?;
            Ok(RemoteSession::new(record.name.clone(), executor).with_elevation(Elevation::None))
        }
    }

    async fn registry(edges: &[(&str, &str)], hosts: &[&str]) -> Arc<MemoryRegistry> {
        let registry = Arc::new(MemoryRegistry::new());
        for host in hosts {
            registry.add_host(NewHost::new(*host, "apt_all")).await.unwrap();
        }
        for (parent, child) in edges {
            registry.add_child(parent, child).await.unwrap();
        }
        registry
    }

    fn at(h: u32, m: u32) -> Delay {
        Delay::At(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    #[tokio::test]
    async fn test_child_halted_one_minute_later() {
        let registry = registry(&[("web1", "db1")], &["web1", "db1"]).await;
        let fleet = Arc::new(
            Fleet::default()
                .with("web1", ScriptedExecutor::new())
                .with("db1", ScriptedExecutor::new()),
        );
        let cascade = RebootCascade::new(registry.clone(), fleet.clone(), 16);
        let web1 = registry.require("web1").await.unwrap();

        let tree = cascade.run(&web1, Delay::Relative(1), PowerMode::Reboot).await;

        let nodes = tree.flatten();
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            (nodes[0].host.as_str(), nodes[0].mode, nodes[0].delay),
            ("db1", PowerMode::Halt, Delay::Relative(2))
        );
        assert_eq!(
            (nodes[1].host.as_str(), nodes[1].mode, nodes[1].delay),
            ("web1", PowerMode::Reboot, Delay::Relative(1))
        );
        assert_eq!(fleet.calls("db1"), vec!["/sbin/shutdown -h +2"]);
        assert_eq!(fleet.calls("web1"), vec!["/sbin/shutdown -r +1"]);
        assert_eq!(
            tree.lines(),
            vec!["db1 halt scheduled +2", "web1 reboot scheduled +1"]
        );
    }

    #[tokio::test]
    async fn test_absolute_delay_carries_into_hour() {
        let registry = registry(&[("hv1", "web1"), ("web1", "db1")], &["hv1", "web1", "db1"]).await;
        let fleet = Arc::new(
            Fleet::default()
                .with("hv1", ScriptedExecutor::new())
                .with("web1", ScriptedExecutor::new())
                .with("db1", ScriptedExecutor::new()),
        );
        let cascade = RebootCascade::new(registry.clone(), fleet.clone(), 16);
        let hv1 = registry.require("hv1").await.unwrap();

        cascade.run(&hv1, at(9, 58), PowerMode::Halt).await;

        assert_eq!(fleet.calls("hv1"), vec!["/sbin/shutdown -h 09:58"]);
        assert_eq!(fleet.calls("web1"), vec!["/sbin/shutdown -h 09:59"]);
        assert_eq!(fleet.calls("db1"), vec!["/sbin/shutdown -h 10:00"]);
    }

    #[tokio::test]
    async fn test_shutdown_confirmation_is_first_segment() {
        let registry = registry(&[], &["web1"]).await;
        let fleet = Arc::new(Fleet::default().with(
            "web1",
            ScriptedExecutor::new().on(
                "/sbin/shutdown -r +5",
                Ok(CommandResult::ok("").with_stderr(
                    "Shutdown scheduled for Fri 2026-10-16 10:05:00 UTC, use 'shutdown -c' to cancel.\n",
                )),
            ),
        ));
        let cascade = RebootCascade::new(registry.clone(), fleet, 16);
        let web1 = registry.require("web1").await.unwrap();

        let tree = cascade.run(&web1, Delay::Relative(5), PowerMode::Reboot).await;

        assert_eq!(
            tree.lines(),
            vec!["web1 Shutdown scheduled for Fri 2026-10-16 10:05:00 UTC"]
        );
        assert!(!tree.has_failures());
    }

    #[tokio::test]
    async fn test_failures_are_per_host() {
        let registry = registry(&[("hv1", "web1"), ("hv1", "db1")], &["hv1", "web1", "db1"]).await;
        let fleet = Arc::new(
            Fleet::default()
                .with("hv1", ScriptedExecutor::new())
                .with("web1", ScriptedExecutor::unreachable("No route to host"))
                .with(
                    "db1",
                    ScriptedExecutor::new().fail("/sbin/shutdown -h +2", 1, "sudo: a password is required"),
                ),
        );
        let cascade = RebootCascade::new(registry.clone(), fleet.clone(), 16);
        let hv1 = registry.require("hv1").await.unwrap();

        let tree = cascade.run(&hv1, Delay::Relative(1), PowerMode::Reboot).await;

        assert!(tree.has_failures());
        assert_eq!(
            tree.lines(),
            vec![
                "web1: connection failed: No route to host",
                "db1: failed: sudo: a password is required",
                "hv1 reboot scheduled +1",
            ]
        );
        assert_eq!(fleet.calls("hv1"), vec!["/sbin/shutdown -r +1"]);
    }

    #[tokio::test]
    async fn test_depth_limit_skips_descendants() {
        let registry = registry(&[("a", "b"), ("b", "c")], &["a", "b", "c"]).await;
        let fleet = Arc::new(
            Fleet::default()
                .with("a", ScriptedExecutor::new())
                .with("b", ScriptedExecutor::new())
                .with("c", ScriptedExecutor::new()),
        );
        let cascade = RebootCascade::new(registry.clone(), fleet.clone(), 1);
        let a = registry.require("a").await.unwrap();

        let tree = cascade.run(&a, Delay::Relative(1), PowerMode::Reboot).await;

        assert_eq!(tree.lines()[0], "c: skipped, deeper than 1 levels");
        assert!(fleet.calls("c").is_empty());
        assert_eq!(fleet.calls("b"), vec!["/sbin/shutdown -h +2"]);
    }

    #[tokio::test]
    async fn test_shared_child_halted_once_after_both_parents() {
        let registry = registry(
            &[("hv1", "web1"), ("hv1", "db1"), ("web1", "db1")],
            &["hv1", "web1", "db1"],
        )
        .await;
        let fleet = Arc::new(
            Fleet::default()
                .with("hv1", ScriptedExecutor::new())
                .with("web1", ScriptedExecutor::new())
                .with("db1", ScriptedExecutor::new()),
        );
        let cascade = RebootCascade::new(registry.clone(), fleet.clone(), 16);
        let hv1 = registry.require("hv1").await.unwrap();

        let tree = cascade.run(&hv1, Delay::Relative(1), PowerMode::Reboot).await;

        assert_eq!(fleet.calls("db1"), vec!["/sbin/shutdown -h +3"]);
        assert_eq!(fleet.calls("web1"), vec!["/sbin/shutdown -h +2"]);
        assert_eq!(fleet.executors["db1"].disconnects(), 1);
        assert_eq!(
            tree.lines(),
            vec![
                "db1 halt scheduled +3",
                "web1 halt scheduled +2",
                "hv1 reboot scheduled +1",
            ]
        );
    }

    #[tokio::test]
    async fn test_longest_path_wins_regardless_of_link_order() {
        // db1 is linked from hv1 before web1 is
        let registry = registry(
            &[("hv1", "db1"), ("hv1", "web1"), ("web1", "app1"), ("app1", "db1")],
            &["hv1", "web1", "app1", "db1"],
        )
        .await;
        let fleet = Arc::new(
            Fleet::default()
                .with("hv1", ScriptedExecutor::new())
                .with("web1", ScriptedExecutor::new())
                .with("app1", ScriptedExecutor::new())
                .with("db1", ScriptedExecutor::new()),
        );
        let cascade = RebootCascade::new(registry.clone(), fleet.clone(), 16);
        let hv1 = registry.require("hv1").await.unwrap();

        let tree = cascade.run(&hv1, Delay::Relative(1), PowerMode::Halt).await;

        assert_eq!(fleet.calls("db1"), vec!["/sbin/shutdown -h +4"]);
        assert_eq!(fleet.calls("app1"), vec!["/sbin/shutdown -h +3"]);
        assert_eq!(tree.flatten().len(), 4);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].host, "web1");
    }

    #[tokio::test]
    async fn test_revisit_is_skipped() {
        let registry = registry(&[], &["a", "b"]).await;
        let fleet = Arc::new(
            Fleet::default()
                .with("a", ScriptedExecutor::new())
                .with("b", ScriptedExecutor::new()),
        );
        let cascade = RebootCascade::new(registry.clone(), fleet.clone(), 16);
        let mut a = registry.require("a").await.unwrap();
        let b_id = registry.require("b").await.unwrap().id;
        // a loop the registry itself would refuse to store
        a.children = vec![b_id, a.id];

        let tree = cascade.run(&a, Delay::Relative(1), PowerMode::Reboot).await;

        assert_eq!(
            tree.lines(),
            vec![
                "b halt scheduled +2",
                "a: skipped, already in this cascade",
                "a reboot scheduled +1",
            ]
        );
        assert_eq!(fleet.calls("a"), vec!["/sbin/shutdown -r +1"]);
    }
}

//! Dependency tracking between tasks.
//!
//! This module provides the dependency contract ([`DependencyTracker`]),
//! the graph algorithms shared by every implementation (cycle prevention,
//! readiness, tree rendering), and [`GraphBackend`] - a wrapper that layers
//! the contract onto any [`Backend`] without the backend knowing about it.
//!
//! Edges reference task ids by value. A dangling edge (its blocker was
//! deleted) is treated as if the blocker were absent at read time, never
//! as corruption, and is not cleaned up eagerly.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::model::{FieldWrite, Status, Task, TaskFilter};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A dependency edge: `blocked` must wait for `blocker`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// The task that must finish first.
    pub blocker: String,
    /// The task that waits.
    pub blocked: String,
}

/// A task annotated with the ids of its still-open blockers.
///
/// Plain data for rendering collaborators; an empty `open_blockers` list
/// means the task is not blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedTask {
    /// The task snapshot.
    pub task: Task,
    /// Ids of open blockers, sorted. Dangling and done blockers excluded.
    pub open_blockers: Vec<String>,
}

/// One node in a dependency tree: a task and everything it blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepNode {
    /// The task snapshot at this node.
    pub task: Task,
    /// Tasks directly blocked by this one, expanded depth-first.
    pub blocks: Vec<DepNode>,
    /// True if this node was reached again along its own ancestry - a
    /// residual cycle in storage. Children are not expanded in that case.
    pub cycle: bool,
}

/// The dependency contract, layered onto the plain backend contract.
#[allow(clippy::missing_errors_doc)]
pub trait DependencyTracker {
    /// Record that `blocked` must wait for `blocker`.
    ///
    /// Fails with [`Error::NotFound`] if either id does not resolve to an
    /// existing task, and with [`Error::CycleDetected`] if the edge would
    /// create a directed cycle (including `blocker == blocked`). The edge
    /// is never written speculatively.
    fn add_dependency(&self, blocker: &str, blocked: &str) -> Result<()>;

    /// Remove an edge. Removing an absent edge succeeds (idempotent).
    fn remove_dependency(&self, blocker: &str, blocked: &str) -> Result<()>;

    /// Open tasks with zero incomplete blockers.
    fn list_ready(&self) -> Result<Vec<Task>>;

    /// Open tasks with at least one open blocker, annotated with them.
    fn list_blocked(&self) -> Result<Vec<AnnotatedTask>>;

    /// The plain `list` pass-through augmented with open-blocker ids per
    /// open task, computed as of the same logical read.
    fn list_annotated(&self, filter: &TaskFilter) -> Result<Vec<AnnotatedTask>>;

    /// Depth-first expansion of what the root task blocks.
    ///
    /// Fails with [`Error::NotFound`] if the root does not exist.
    /// Tolerates residual cycles by flagging the node instead of recursing.
    fn dependency_tree(&self, root: &str) -> Result<DepNode>;
}

/// Check whether a path `from -> ... -> to` exists over the edge set.
///
/// DFS along the blocker -> blocked direction, matching how a new edge
/// would extend a chain of blocking work.
pub(crate) fn path_exists(edges: &[Edge], from: &str, to: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![from];

    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if visited.insert(current) {
            stack.extend(
                edges.iter().filter(|e| e.blocker == current).map(|e| e.blocked.as_str()),
            );
        }
    }
    false
}

/// Ids of still-open blockers of `id`, sorted.
///
/// A blocker that is done, or that no longer exists (dangling edge), does
/// not count.
pub(crate) fn open_blockers(
    edges: &[Edge],
    tasks_by_id: &HashMap<&str, &Task>,
    id: &str,
) -> Vec<String> {
    let mut blockers: Vec<String> = edges
        .iter()
        .filter(|e| e.blocked == id)
        .filter_map(|e| tasks_by_id.get(e.blocker.as_str()))
        .filter(|blocker| blocker.is_open())
        .map(|blocker| blocker.id.clone())
        .collect();
    blockers.sort();
    blockers.dedup();
    blockers
}

/// Annotate a selection of tasks with their open blockers.
///
/// `all_tasks` is the full store snapshot the blocker statuses are read
/// from; `selected` is whatever subset the caller is presenting.
pub(crate) fn annotate(selected: Vec<Task>, all_tasks: &[Task], edges: &[Edge]) -> Vec<AnnotatedTask> {
    let by_id: HashMap<&str, &Task> = all_tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    selected
        .into_iter()
        .map(|task| {
            let open_blockers = if task.is_open() {
                open_blockers(edges, &by_id, &task.id)
            } else {
                Vec::new()
            };
            AnnotatedTask { task, open_blockers }
        })
        .collect()
}

/// Build the dependency tree rooted at `root_id`.
///
/// Returns `None` for ids with no live task (dangling edge endpoints are
/// skipped silently). `path` carries the current ancestry for cycle
/// detection.
fn build_tree(
    root_id: &str,
    tasks_by_id: &HashMap<&str, &Task>,
    edges: &[Edge],
    path: &mut HashSet<String>,
) -> Option<DepNode> {
    let task = (*tasks_by_id.get(root_id)?).clone();

    if path.contains(root_id) {
        return Some(DepNode { task, blocks: Vec::new(), cycle: true });
    }
    path.insert(root_id.to_string());

    let mut blocked_ids: Vec<&str> = edges
        .iter()
        .filter(|e| e.blocker == root_id)
        .map(|e| e.blocked.as_str())
        .collect();
    blocked_ids.sort_unstable();
    blocked_ids.dedup();

    let blocks = blocked_ids
        .into_iter()
        .filter_map(|id| build_tree(id, tasks_by_id, edges, path))
        .collect();

    path.remove(root_id);
    Some(DepNode { task, blocks, cycle: false })
}

/// Shared readiness/blocked/tree logic over a loaded snapshot.
///
/// Both the wrapper and the native `SQLite` tracker delegate here so graph
/// semantics cannot drift between them.
pub(crate) struct GraphSnapshot {
    pub tasks: Vec<Task>,
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub(crate) fn check_new_edge(&self, blocker: &str, blocked: &str) -> Result<()> {
        if blocker == blocked {
            return Err(Error::CycleDetected {
                blocker: blocker.to_string(),
                blocked: blocked.to_string(),
            });
        }
        // The new edge blocker -> blocked closes a cycle iff blocker is
        // already reachable from blocked.
        if path_exists(&self.edges, blocked, blocker) {
            return Err(Error::CycleDetected {
                blocker: blocker.to_string(),
                blocked: blocked.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn ready(&self) -> Vec<Task> {
        let by_id: HashMap<&str, &Task> =
            self.tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        self.tasks
            .iter()
            .filter(|t| t.is_open() && open_blockers(&self.edges, &by_id, &t.id).is_empty())
            .cloned()
            .collect()
    }

    pub(crate) fn blocked(&self) -> Vec<AnnotatedTask> {
        let open: Vec<Task> = self.tasks.iter().filter(|t| t.is_open()).cloned().collect();
        annotate(open, &self.tasks, &self.edges)
            .into_iter()
            .filter(|a| !a.open_blockers.is_empty())
            .collect()
    }

    pub(crate) fn tree(&self, root: &str) -> Result<DepNode> {
        let by_id: HashMap<&str, &Task> =
            self.tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        build_tree(root, &by_id, &self.edges, &mut HashSet::new())
            .ok_or_else(|| Error::NotFound(root.to_string()))
    }
}

/// Wrapper that adds dependency tracking to any backend.
///
/// Plain backend operations are delegated unchanged. The edge relation is
/// persisted in a sidecar JSON file next to the wrapped store, so the
/// wrapped backend needs no schema support of its own.
pub struct GraphBackend {
    inner: Box<dyn Backend>,
    edges_path: PathBuf,
}

impl GraphBackend {
    /// Wrap a backend, persisting edges at the given sidecar path.
    #[must_use]
    pub fn wrap(inner: Box<dyn Backend>, edges_path: PathBuf) -> Self {
        Self { inner, edges_path }
    }

    /// Wrap a backend whose store lives at `store_path`, deriving the
    /// conventional sidecar location next to it.
    #[must_use]
    pub fn for_store(inner: Box<dyn Backend>, store_path: &Path) -> Self {
        Self::wrap(inner, sidecar_path(store_path))
    }

    /// Path of the sidecar edge file.
    #[must_use]
    pub fn edges_path(&self) -> &Path {
        &self.edges_path
    }

    fn load_edges(&self) -> Result<Vec<Edge>> {
        if !self.edges_path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.edges_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_edges(&self, edges: &[Edge]) -> Result<()> {
        if let Some(parent) = self.edges_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.edges_path, serde_json::to_string_pretty(edges)?)?;
        Ok(())
    }

    fn snapshot(&self) -> Result<GraphSnapshot> {
        Ok(GraphSnapshot {
            tasks: self.inner.list(&TaskFilter::default())?,
            edges: self.load_edges()?,
        })
    }
}

impl Backend for GraphBackend {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn create(&self, task: Task) -> Result<Task> {
        self.inner.create(task)
    }

    fn get(&self, id: &str) -> Result<Task> {
        self.inner.get(id)
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.inner.list(filter)
    }

    fn update_status(&self, id: &str, status: Status, done_at: Option<String>) -> Result<Task> {
        self.inner.update_status(id, status, done_at)
    }

    fn update_field(&self, id: &str, write: &FieldWrite) -> Result<Task> {
        self.inner.update_field(id, write)
    }

    // Deleting a task does not cascade-delete edges referencing it; the
    // edges go dangling and read as absent.
    fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id)
    }

    fn as_dependency_tracker(&self) -> Option<&dyn DependencyTracker> {
        Some(self)
    }
}

impl DependencyTracker for GraphBackend {
    fn add_dependency(&self, blocker: &str, blocked: &str) -> Result<()> {
        self.inner.get(blocker)?;
        self.inner.get(blocked)?;

        let mut edges = self.load_edges()?;
        let snapshot = GraphSnapshot { tasks: Vec::new(), edges: edges.clone() };
        snapshot.check_new_edge(blocker, blocked)?;

        let edge = Edge { blocker: blocker.to_string(), blocked: blocked.to_string() };
        if !edges.contains(&edge) {
            edges.push(edge);
            self.save_edges(&edges)?;
        }
        Ok(())
    }

    fn remove_dependency(&self, blocker: &str, blocked: &str) -> Result<()> {
        let mut edges = self.load_edges()?;
        let before = edges.len();
        edges.retain(|e| !(e.blocker == blocker && e.blocked == blocked));
        if edges.len() != before {
            self.save_edges(&edges)?;
        }
        Ok(())
    }

    fn list_ready(&self) -> Result<Vec<Task>> {
        Ok(self.snapshot()?.ready())
    }

    fn list_blocked(&self) -> Result<Vec<AnnotatedTask>> {
        Ok(self.snapshot()?.blocked())
    }

    fn list_annotated(&self, filter: &TaskFilter) -> Result<Vec<AnnotatedTask>> {
        let snapshot = self.snapshot()?;
        let now = chrono::Utc::now();
        let selected: Vec<Task> =
            snapshot.tasks.iter().filter(|t| filter.matches(t, &now)).cloned().collect();
        Ok(annotate(selected, &snapshot.tasks, &snapshot.edges))
    }

    fn dependency_tree(&self, root: &str) -> Result<DepNode> {
        self.snapshot()?.tree(root)
    }
}

/// Conventional sidecar location for a store's edge file.
#[must_use]
pub fn sidecar_path(store_path: &Path) -> PathBuf {
    let mut name = store_path.file_name().map_or_else(
        || std::ffi::OsString::from("store"),
        std::ffi::OsStr::to_os_string,
    );
    name.push(".deps.json");
    store_path.with_file_name(name)
}

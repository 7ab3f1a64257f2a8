//! Embedded `SQLite` backend.
//!
//! One row per task, with tags and metadata stored as JSON text columns.
//! Each operation opens its own connection; single-statement atomicity
//! comes from `SQLite` itself. This is the one backend that also carries a
//! native dependency relation (`task_deps`), so it satisfies the
//! dependency contract without wrapping.
//!
//! `task_deps` deliberately has no foreign keys: deleting a task leaves
//! its edges dangling, and dangling edges read as absent.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::graph::{AnnotatedTask, DepNode, DependencyTracker, Edge, GraphSnapshot, annotate};
use crate::model::{FieldWrite, Priority, Status, Task, TaskFilter};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Column list shared by every task SELECT.
const TASK_COLUMNS: &str = "id, text, status, priority, project, tags, due, meta, created_at, done_at";

/// `SQLite`-backed task store.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    db_path: PathBuf,
}

impl SqliteBackend {
    /// Create a backend over the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let backend = Self { db_path: db_path.as_ref().to_path_buf() };
        backend.init_schema()?;
        Ok(backend)
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection to the database.
    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'done')),
                priority INTEGER NOT NULL DEFAULT 1 CHECK (priority >= 0 AND priority <= 3),
                project TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                due TEXT,
                meta TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                done_at TEXT
            );

            -- Dependency relation: blocked waits for blocker. No foreign
            -- keys so edges can dangle after a task is deleted.
            CREATE TABLE IF NOT EXISTS task_deps (
                blocker_id TEXT NOT NULL,
                blocked_id TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (blocker_id, blocked_id),
                CHECK (blocker_id != blocked_id)
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project);
            CREATE INDEX IF NOT EXISTS idx_task_deps_blocked ON task_deps(blocked_id);
            ",
        )?;

        Ok(())
    }

    /// Parse a task from a row (column order per [`TASK_COLUMNS`]).
    fn parse_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let status_str: String = row.get(2)?;
        let priority_val: u8 = row.get(3)?;
        let tags_json: String = row.get(5)?;
        let meta_json: String = row.get(7)?;

        Ok(Task {
            id: row.get(0)?,
            text: row.get(1)?,
            status: Status::from_str(&status_str).unwrap_or(Status::Open),
            priority: Priority::from_u8(priority_val).unwrap_or(Priority::Normal),
            project: row.get(4)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            due: row.get(6)?,
            meta: serde_json::from_str(&meta_json).unwrap_or_default(),
            created_at: row.get(8)?,
            done_at: row.get(9)?,
        })
    }

    /// Fetch one task on an existing connection.
    fn fetch(conn: &Connection, id: &str) -> Result<Task> {
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            Self::parse_task,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Check that a task id exists on an existing connection.
    fn exists(conn: &Connection, id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Load the full edge relation.
    fn edges(conn: &Connection) -> Result<Vec<Edge>> {
        let mut stmt = conn
            .prepare("SELECT blocker_id, blocked_id FROM task_deps ORDER BY blocker_id, blocked_id")?;
        let edges = stmt
            .query_map([], |row| {
                Ok(Edge { blocker: row.get(0)?, blocked: row.get(1)? })
            })?
            .flatten()
            .collect();
        Ok(edges)
    }

    /// Load tasks plus edges for graph queries.
    fn snapshot(&self) -> Result<GraphSnapshot> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at ASC"))?;
        let tasks = stmt.query_map([], Self::parse_task)?.flatten().collect();
        Ok(GraphSnapshot { tasks, edges: Self::edges(&conn)? })
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn create(&self, task: Task) -> Result<Task> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO tasks (id, text, status, priority, project, tags, due, meta, created_at, done_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &task.id,
                &task.text,
                task.status.as_str(),
                task.priority.as_u8(),
                &task.project,
                serde_json::to_string(&task.tags)?,
                &task.due,
                serde_json::to_string(&task.meta)?,
                &task.created_at,
                &task.done_at,
            ],
        )?;
        Self::fetch(&conn, &task.id)
    }

    fn get(&self, id: &str) -> Result<Task> {
        let conn = self.open()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = self.open()?;

        // Status and project hit indexed columns; the remaining predicates
        // go through the shared matcher so semantics stay identical to the
        // flat-file backend.
        let mut conditions = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(ref project) = filter.project {
            conditions.push("project = ?");
            values.push(Box::new(project.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks {where_clause}
             ORDER BY priority DESC, created_at ASC"
        );

        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(AsRef::as_ref).collect();
        let mut stmt = conn.prepare(&sql)?;
        let now = Utc::now();
        let tasks = stmt
            .query_map(params.as_slice(), Self::parse_task)?
            .flatten()
            .filter(|t| filter.matches(t, &now))
            .collect();

        Ok(tasks)
    }

    fn update_status(&self, id: &str, status: Status, done_at: Option<String>) -> Result<Task> {
        let conn = self.open()?;
        let rows = conn.execute(
            "UPDATE tasks SET status = ?1, done_at = ?2 WHERE id = ?3",
            params![status.as_str(), &done_at, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Self::fetch(&conn, id)
    }

    fn update_field(&self, id: &str, write: &FieldWrite) -> Result<Task> {
        let conn = self.open()?;
        let updated = Self::fetch(&conn, id)?.with_field(write);

        match write {
            FieldWrite::Priority(priority) => {
                conn.execute(
                    "UPDATE tasks SET priority = ?1 WHERE id = ?2",
                    params![priority.as_u8(), id],
                )?;
            }
            FieldWrite::Due(due) => {
                conn.execute("UPDATE tasks SET due = ?1 WHERE id = ?2", params![due, id])?;
            }
            FieldWrite::Meta { .. } => {
                conn.execute(
                    "UPDATE tasks SET meta = ?1 WHERE id = ?2",
                    params![serde_json::to_string(&updated.meta)?, id],
                )?;
            }
            FieldWrite::AddTag(_) | FieldWrite::RemoveTag(_) => {
                conn.execute(
                    "UPDATE tasks SET tags = ?1 WHERE id = ?2",
                    params![serde_json::to_string(&updated.tags)?, id],
                )?;
            }
        }

        Self::fetch(&conn, id)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.open()?;
        let rows = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn as_dependency_tracker(&self) -> Option<&dyn DependencyTracker> {
        Some(self)
    }
}

impl DependencyTracker for SqliteBackend {
    fn add_dependency(&self, blocker: &str, blocked: &str) -> Result<()> {
        let conn = self.open()?;
        if !Self::exists(&conn, blocker)? {
            return Err(Error::NotFound(blocker.to_string()));
        }
        if !Self::exists(&conn, blocked)? {
            return Err(Error::NotFound(blocked.to_string()));
        }

        let snapshot = GraphSnapshot { tasks: Vec::new(), edges: Self::edges(&conn)? };
        snapshot.check_new_edge(blocker, blocked)?;

        conn.execute(
            "INSERT OR IGNORE INTO task_deps (blocker_id, blocked_id) VALUES (?1, ?2)",
            params![blocker, blocked],
        )?;
        Ok(())
    }

    fn remove_dependency(&self, blocker: &str, blocked: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "DELETE FROM task_deps WHERE blocker_id = ?1 AND blocked_id = ?2",
            params![blocker, blocked],
        )?;
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
        let now = Utc::now();
        let selected: Vec<Task> =
            snapshot.tasks.iter().filter(|t| filter.matches(t, &now)).cloned().collect();
        Ok(annotate(selected, &snapshot.tasks, &snapshot.edges))
    }

    fn dependency_tree(&self, root: &str) -> Result<DepNode> {
        self.snapshot()?.tree(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::now_timestamp;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn create_test_backend() -> (TempDir, SqliteBackend) {
        let dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(dir.path().join("test.db")).unwrap();
        (dir, backend)
    }

    fn new_task(id: &str, text: &str) -> Task {
        Task {
            id: id.to_string(),
            text: text.to_string(),
            status: Status::Open,
            priority: Priority::Normal,
            project: None,
            tags: Default::default(),
            due: None,
            meta: BTreeMap::new(),
            created_at: now_timestamp(),
            done_at: None,
        }
    }

    #[test]
    fn test_create_and_get() {
        let (_dir, backend) = create_test_backend();
        let mut task = new_task("plan-trip-0000", "Plan trip");
        task.project = Some("travel".to_string());
        task.tags.insert("fun".to_string());
        task.due = Some("2026-12-01T00:00:00Z".to_string());
        task.meta.insert("budget".to_string(), "2000".to_string());

        let created = backend.create(task.clone()).unwrap();
        assert_eq!(created, task);
        assert_eq!(backend.get(&task.id).unwrap(), task);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (_dir, backend) = create_test_backend();
        assert!(matches!(backend.get("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_status() {
        let (_dir, backend) = create_test_backend();
        backend.create(new_task("t-0000", "task")).unwrap();
        let done_at = now_timestamp();
        let updated =
            backend.update_status("t-0000", Status::Done, Some(done_at.clone())).unwrap();
        assert_eq!(updated.status, Status::Done);
        assert_eq!(updated.done_at, Some(done_at));

        let reopened = backend.update_status("t-0000", Status::Open, None).unwrap();
        assert_eq!(reopened.status, Status::Open);
        assert!(reopened.done_at.is_none());

        assert!(matches!(
            backend.update_status("nope", Status::Done, None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_update_field_all_supported() {
        let (_dir, backend) = create_test_backend();
        backend.create(new_task("t-0000", "task")).unwrap();

        let t = backend.update_field("t-0000", &FieldWrite::Priority(Priority::High)).unwrap();
        assert_eq!(t.priority, Priority::High);

        let t = backend
            .update_field("t-0000", &FieldWrite::Due(Some("2026-10-01T00:00:00Z".to_string())))
            .unwrap();
        assert_eq!(t.due.as_deref(), Some("2026-10-01T00:00:00Z"));

        let t = backend.update_field("t-0000", &FieldWrite::Due(None)).unwrap();
        assert!(t.due.is_none());

        let t = backend
            .update_field(
                "t-0000",
                &FieldWrite::Meta { key: "ticket".to_string(), value: "X-1".to_string() },
            )
            .unwrap();
        assert_eq!(t.meta.get("ticket").map(String::as_str), Some("X-1"));

        let t = backend.update_field("t-0000", &FieldWrite::AddTag("home".to_string())).unwrap();
        assert!(t.tags.contains("home"));
        let t = backend.update_field("t-0000", &FieldWrite::RemoveTag("home".to_string())).unwrap();
        assert!(!t.tags.contains("home"));

        // Snapshot in storage agrees with the returned snapshot.
        assert_eq!(backend.get("t-0000").unwrap(), t);
    }

    #[test]
    fn test_delete() {
        let (_dir, backend) = create_test_backend();
        backend.create(new_task("t-0000", "task")).unwrap();
        backend.delete("t-0000").unwrap();
        assert!(matches!(backend.get("t-0000"), Err(Error::NotFound(_))));
        assert!(matches!(backend.delete("t-0000"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_orders_by_priority() {
        let (_dir, backend) = create_test_backend();
        let mut low = new_task("low-0000", "low prio");
        low.priority = Priority::Low;
        let mut critical = new_task("crit-0000", "critical prio");
        critical.priority = Priority::Critical;
        backend.create(low).unwrap();
        backend.create(critical).unwrap();

        let tasks = backend.list(&TaskFilter::default()).unwrap();
        assert_eq!(tasks[0].priority, Priority::Critical);
        assert_eq!(tasks[1].priority, Priority::Low);
    }

    #[test]
    fn test_list_filters() {
        let (_dir, backend) = create_test_backend();
        let mut a = new_task("a-0000", "Ship release");
        a.project = Some("work".to_string());
        a.tags.insert("release".to_string());
        let mut b = new_task("b-0000", "Water plants");
        b.due = Some("2020-01-01T00:00:00Z".to_string());
        backend.create(a).unwrap();
        backend.create(b).unwrap();

        let work = backend
            .list(&TaskFilter { project: Some("work".to_string()), ..Default::default() })
            .unwrap();
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].id, "a-0000");

        let tagged = backend
            .list(&TaskFilter { tag: Some("release".to_string()), ..Default::default() })
            .unwrap();
        assert_eq!(tagged.len(), 1);

        let overdue = backend.list(&TaskFilter { overdue: true, ..Default::default() }).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, "b-0000");
    }

    #[test]
    fn test_native_dependency_capability() {
        let (_dir, backend) = create_test_backend();
        assert!(backend.as_dependency_tracker().is_some());
    }

    #[test]
    fn test_add_dependency_checks_endpoints() {
        let (_dir, backend) = create_test_backend();
        backend.create(new_task("a-0000", "a")).unwrap();
        assert!(matches!(backend.add_dependency("a-0000", "nope"), Err(Error::NotFound(_))));
        assert!(matches!(backend.add_dependency("nope", "a-0000"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let (_dir, backend) = create_test_backend();
        backend.create(new_task("a-0000", "a")).unwrap();
        assert!(matches!(
            backend.add_dependency("a-0000", "a-0000"),
            Err(Error::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_cycle_rejected_before_insert() {
        let (_dir, backend) = create_test_backend();
        for id in ["a", "b", "c"] {
            backend.create(new_task(id, id)).unwrap();
        }
        backend.add_dependency("a", "b").unwrap();
        backend.add_dependency("b", "c").unwrap();
        assert!(matches!(backend.add_dependency("c", "a"), Err(Error::CycleDetected { .. })));

        // The failed insert left the relation unchanged.
        let conn = backend.open().unwrap();
        let edges = SqliteBackend::edges(&conn).unwrap();
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_remove_dependency_idempotent() {
        let (_dir, backend) = create_test_backend();
        backend.create(new_task("a", "a")).unwrap();
        backend.create(new_task("b", "b")).unwrap();
        backend.add_dependency("a", "b").unwrap();
        backend.remove_dependency("a", "b").unwrap();
        backend.remove_dependency("a", "b").unwrap();

        let conn = backend.open().unwrap();
        assert!(SqliteBackend::edges(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_readiness_chain() {
        let (_dir, backend) = create_test_backend();
        for id in ["a", "b", "c"] {
            backend.create(new_task(id, id)).unwrap();
        }
        backend.add_dependency("a", "b").unwrap();
        backend.add_dependency("b", "c").unwrap();
        backend.update_status("a", Status::Done, Some(now_timestamp())).unwrap();

        let ready: Vec<String> = backend.list_ready().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ready, vec!["b"]);

        let blocked = backend.list_blocked().unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].task.id, "c");
        assert_eq!(blocked[0].open_blockers, vec!["b"]);
    }

    #[test]
    fn test_delete_leaves_dangling_edge_inert() {
        let (_dir, backend) = create_test_backend();
        backend.create(new_task("a", "a")).unwrap();
        backend.create(new_task("b", "b")).unwrap();
        backend.add_dependency("a", "b").unwrap();
        backend.delete("a").unwrap();

        // No cascade: the edge row survives but no longer blocks anything.
        let conn = backend.open().unwrap();
        assert_eq!(SqliteBackend::edges(&conn).unwrap().len(), 1);
        assert!(backend.list_blocked().unwrap().is_empty());
        let tree = backend.dependency_tree("b").unwrap();
        assert!(tree.blocks.is_empty());
    }

    #[test]
    fn test_dependency_tree() {
        let (_dir, backend) = create_test_backend();
        for id in ["a", "b", "c"] {
            backend.create(new_task(id, id)).unwrap();
        }
        backend.add_dependency("a", "b").unwrap();
        backend.add_dependency("a", "c").unwrap();

        let tree = backend.dependency_tree("a").unwrap();
        assert_eq!(tree.task.id, "a");
        let children: Vec<&str> = tree.blocks.iter().map(|n| n.task.id.as_str()).collect();
        assert_eq!(children, vec!["b", "c"]);

        assert!(matches!(backend.dependency_tree("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_annotated_matches_filter() {
        let (_dir, backend) = create_test_backend();
        let mut a = new_task("a", "a");
        a.project = Some("work".to_string());
        let mut b = new_task("b", "b");
        b.project = Some("work".to_string());
        backend.create(a).unwrap();
        backend.create(b).unwrap();
        backend.create(new_task("c", "c")).unwrap();
        backend.add_dependency("a", "b").unwrap();

        let annotated = backend
            .list_annotated(&TaskFilter { project: Some("work".to_string()), ..Default::default() })
            .unwrap();
        assert_eq!(annotated.len(), 2);
        let b = annotated.iter().find(|t| t.task.id == "b").unwrap();
        assert_eq!(b.open_blockers, vec!["a"]);
    }
}

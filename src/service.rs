//! Task service: the single entry point used by all callers.
//!
//! The service owns exactly one backend (possibly graph-wrapped) for the
//! lifetime of one invocation. It generates ids, stamps timestamps, and
//! validates field values before delegating, so backends never repeat
//! validation. All backend error kinds propagate unchanged; in particular
//! [`crate::Error::Unsupported`] stays distinguishable so callers can
//! degrade their UI instead of failing outright.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::graph::DependencyTracker;
use crate::id::generate_id;
use crate::model::{now_timestamp, FieldWrite, Priority, Status, Task, TaskFilter};
use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Valid tag and project names: alphanumeric start, then `-`/`_` allowed.
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("static pattern"));

/// Attributes for a new task. Everything is optional.
#[derive(Debug, Default, Clone)]
pub struct NewTask {
    /// Owning project, or `None` for the global namespace.
    pub project: Option<String>,
    /// Priority (defaults to normal).
    pub priority: Priority,
    /// Initial tags.
    pub tags: Vec<String>,
    /// Due timestamp (RFC 3339).
    pub due: Option<String>,
    /// Initial metadata.
    pub meta: BTreeMap<String, String>,
}

/// Facade over one backend instance.
pub struct TaskService {
    backend: Box<dyn Backend>,
}

impl TaskService {
    /// Create a service over the given backend.
    #[must_use]
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The active backend.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    /// Runtime capability query: the dependency contract of the active
    /// backend, if it offers one.
    #[must_use]
    pub fn dependencies(&self) -> Option<&dyn DependencyTracker> {
        self.backend.as_dependency_tracker()
    }

    /// Create a task.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidInput`] for empty or control-character
    /// text, malformed tags/project names, or an unparseable due date;
    /// backend errors propagate unchanged.
    pub fn create(&self, text: &str, new: NewTask) -> Result<Task> {
        let text = validate_text(text)?;
        if let Some(ref project) = new.project {
            validate_name("project", project)?;
        }
        for tag in &new.tags {
            validate_name("tag", tag)?;
        }
        if let Some(ref due) = new.due {
            validate_timestamp(due)?;
        }
        for key in new.meta.keys() {
            validate_meta_key(key)?;
        }

        let task = Task {
            id: generate_id(&text),
            text,
            status: Status::Open,
            priority: new.priority,
            project: new.project,
            tags: new.tags.into_iter().collect(),
            due: new.due,
            meta: new.meta,
            created_at: now_timestamp(),
            done_at: None,
        };
        self.backend.create(task)
    }

    /// Fetch a task by id.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] if the id does not exist.
    pub fn get(&self, id: &str) -> Result<Task> {
        self.backend.get(id)
    }

    /// List tasks matching a filter.
    ///
    /// # Errors
    ///
    /// Backend errors propagate unchanged.
    pub fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.backend.list(filter)
    }

    /// Mark a task done, stamping the completion timestamp.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] if the id does not exist.
    pub fn complete(&self, id: &str) -> Result<Task> {
        self.backend.update_status(id, Status::Done, Some(now_timestamp()))
    }

    /// Reopen a done task, clearing the completion timestamp.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] if the id does not exist.
    pub fn reopen(&self, id: &str) -> Result<Task> {
        self.backend.update_status(id, Status::Open, None)
    }

    /// Set the priority.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] if the id does not exist.
    pub fn set_priority(&self, id: &str, priority: Priority) -> Result<Task> {
        self.backend.update_field(id, &FieldWrite::Priority(priority))
    }

    /// Set or clear the due timestamp.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidInput`] on an unparseable timestamp and
    /// [`Error::Unsupported`] if the backend has no due-date column.
    pub fn set_due(&self, id: &str, due: Option<&str>) -> Result<Task> {
        if let Some(due) = due {
            validate_timestamp(due)?;
        }
        self.backend.update_field(id, &FieldWrite::Due(due.map(str::to_string)))
    }

    /// Set a metadata key.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidInput`] on an empty key and
    /// [`Error::Unsupported`] if the backend cannot store metadata.
    pub fn set_meta(&self, id: &str, key: &str, value: &str) -> Result<Task> {
        validate_meta_key(key)?;
        self.backend.update_field(
            id,
            &FieldWrite::Meta { key: key.to_string(), value: value.to_string() },
        )
    }

    /// Add a tag.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidInput`] on a malformed tag.
    pub fn add_tag(&self, id: &str, tag: &str) -> Result<Task> {
        validate_name("tag", tag)?;
        self.backend.update_field(id, &FieldWrite::AddTag(tag.to_string()))
    }

    /// Remove a tag. Removing an absent tag succeeds.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] if the id does not exist.
    pub fn remove_tag(&self, id: &str, tag: &str) -> Result<Task> {
        self.backend.update_field(id, &FieldWrite::RemoveTag(tag.to_string()))
    }

    /// Delete a task.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] if the id does not exist.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.backend.delete(id)
    }
}

/// Validate task text: non-empty after trimming, no control characters
/// (the flat-file format is line- and tab-delimited).
fn validate_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("task text must not be empty".to_string()));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(Error::InvalidInput(
            "task text must not contain control characters".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate a tag or project name.
fn validate_name(kind: &str, name: &str) -> Result<()> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "invalid {kind} '{name}': must start alphanumeric and contain only alphanumerics, '-', '_'"
        )))
    }
}

/// Validate a metadata key.
fn validate_meta_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidInput("metadata key must not be empty".to_string()));
    }
    if key.chars().any(char::is_control) {
        return Err(Error::InvalidInput(
            "metadata key must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate an RFC 3339 timestamp string.
fn validate_timestamp(value: &str) -> Result<()> {
    DateTime::parse_from_rfc3339(value).map_err(|e| {
        Error::InvalidInput(format!("invalid timestamp '{value}': {e}"))
    })?;
    Ok(())
}

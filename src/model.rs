//! Task model types.
//!
//! Tasks are immutable value snapshots: every mutation constructs a new
//! `Task` rather than editing shared state in place. Backends persist the
//! snapshot they are handed and hand back the snapshot they persisted.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Task priority levels (higher number = more urgent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Priority {
    /// Low priority - can wait.
    Low = 0,
    /// Normal priority (default).
    #[default]
    Normal = 1,
    /// High priority.
    High = 2,
    /// Critical priority - blocking issues.
    Critical = 3,
}

impl Priority {
    /// Create a priority from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is greater than 3.
    pub const fn from_u8(value: u8) -> Result<Self, InvalidPriority> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::Normal),
            2 => Ok(Self::High),
            3 => Ok(Self::Critical),
            _ => Err(InvalidPriority(value)),
        }
    }

    /// Get the numeric value of the priority.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a priority from its lowercase name.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid priority name.
    pub fn from_name(s: &str) -> Result<Self, InvalidPriority> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(InvalidPriority(u8::MAX)),
        }
    }

    /// Get the lowercase name of the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid priority value is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPriority(pub u8);

impl std::fmt::Display for InvalidPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid priority (must be low, normal, high, or critical)")
    }
}

impl std::error::Error for InvalidPriority {}

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Task is open and available for work.
    #[default]
    Open,
    /// Task has been completed.
    Done,
}

impl Status {
    /// Parse a status from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidStatus> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "done" => Ok(Self::Done),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }

    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid status string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl std::fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid status: '{}' (must be open or done)", self.0)
    }
}

impl std::error::Error for InvalidStatus {}

/// A single todo item.
///
/// Invariant: `done_at` is `Some` exactly when `status` is [`Status::Done`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (slug from text + 4 random hex chars).
    pub id: String,
    /// The todo text. Never empty.
    pub text: String,
    /// Current status.
    pub status: Status,
    /// Priority level.
    #[serde(default)]
    pub priority: Priority,
    /// Owning project/namespace. `None` means the global namespace.
    #[serde(default)]
    pub project: Option<String>,
    /// Tags. Order is not significant; stored sorted for stable output.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Optional due timestamp (RFC 3339).
    #[serde(default)]
    pub due: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// RFC 3339 timestamp when the task was created.
    pub created_at: String,
    /// RFC 3339 timestamp when the task was completed, if it is done.
    #[serde(default)]
    pub done_at: Option<String>,
}

impl Task {
    /// Check if the task is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.status, Status::Open)
    }

    /// Return a new snapshot with the given status and completion timestamp.
    #[must_use]
    pub fn with_status(&self, status: Status, done_at: Option<String>) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.done_at = done_at;
        next
    }

    /// Return a new snapshot with a single field changed.
    #[must_use]
    pub fn with_field(&self, write: &FieldWrite) -> Self {
        let mut next = self.clone();
        match write {
            FieldWrite::Priority(priority) => next.priority = *priority,
            FieldWrite::Due(due) => next.due = due.clone(),
            FieldWrite::Meta { key, value } => {
                next.meta.insert(key.clone(), value.clone());
            }
            FieldWrite::AddTag(tag) => {
                next.tags.insert(tag.clone());
            }
            FieldWrite::RemoveTag(tag) => {
                next.tags.remove(tag);
            }
        }
        next
    }
}

/// An atomic single-field write against one task.
///
/// Backends that cannot represent a field reject the write with
/// [`crate::Error::Unsupported`] instead of discarding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWrite {
    /// Set the priority.
    Priority(Priority),
    /// Set or clear the due timestamp (RFC 3339).
    Due(Option<String>),
    /// Set a metadata key.
    Meta {
        /// Metadata key.
        key: String,
        /// Metadata value.
        value: String,
    },
    /// Add a tag.
    AddTag(String),
    /// Remove a tag. Removing an absent tag is a no-op.
    RemoveTag(String),
}

impl FieldWrite {
    /// Human-readable name of the field being written, for error messages.
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::Priority(_) => "priority",
            Self::Due(_) => "due date",
            Self::Meta { .. } => "metadata",
            Self::AddTag(_) | Self::RemoveTag(_) => "tag",
        }
    }
}

/// Filter predicates for listing tasks, combined with logical AND.
#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    /// Filter by status.
    pub status: Option<Status>,
    /// Filter by owning project.
    pub project: Option<String>,
    /// Filter by tag.
    pub tag: Option<String>,
    /// Include only open tasks whose due timestamp has passed.
    pub overdue: bool,
    /// Case-insensitive substring match against the task text.
    pub text: Option<String>,
}

impl TaskFilter {
    /// Check whether a task matches every predicate in this filter.
    ///
    /// Both backends route through this so filter semantics cannot drift.
    #[must_use]
    pub fn matches(&self, task: &Task, now: &DateTime<Utc>) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(ref project) = self.project {
            if task.project.as_deref() != Some(project.as_str()) {
                return false;
            }
        }
        if let Some(ref tag) = self.tag {
            if !task.tags.contains(tag) {
                return false;
            }
        }
        if self.overdue {
            let due_passed = task
                .due
                .as_deref()
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                .is_some_and(|d| d < *now);
            if task.status != Status::Open || !due_passed {
                return false;
            }
        }
        if let Some(ref text) = self.text {
            if !task.text.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Current time as an RFC 3339 timestamp (second precision, UTC).
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

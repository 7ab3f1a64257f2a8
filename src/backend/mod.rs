//! Storage backends.
//!
//! The [`Backend`] trait is the minimal contract every storage
//! implementation satisfies, independent of medium. Two implementations
//! ship with the crate: a human-editable flat file and an embedded
//! `SQLite` database.

pub mod file;
pub mod sqlite;

pub use file::FileBackend;
pub use sqlite::SqliteBackend;

use crate::error::Result;
use crate::graph::DependencyTracker;
use crate::model::{FieldWrite, Status, Task, TaskFilter};

/// The backend contract: create/read/update/delete/list over one store.
///
/// Every successful write returns the *new* persisted snapshot, never the
/// pre-update value, so callers can confirm the result without a second
/// read. `list` never mutates state.
#[allow(clippy::missing_errors_doc)]
pub trait Backend {
    /// Short name of this backend implementation (e.g. `"sqlite"`).
    fn name(&self) -> &'static str;

    /// Persist a new task snapshot and return the persisted value.
    fn create(&self, task: Task) -> Result<Task>;

    /// Fetch a task by id. Fails with [`crate::Error::NotFound`] on a miss.
    fn get(&self, id: &str) -> Result<Task>;

    /// List tasks matching the filter. Read-only.
    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// Set the status and completion timestamp, returning the new snapshot.
    fn update_status(&self, id: &str, status: Status, done_at: Option<String>) -> Result<Task>;

    /// Apply an atomic single-field write, returning the new snapshot.
    ///
    /// Backends that cannot represent the field fail with
    /// [`crate::Error::Unsupported`].
    fn update_field(&self, id: &str, write: &FieldWrite) -> Result<Task>;

    /// Delete a task by id. Fails with [`crate::Error::NotFound`] on a miss.
    fn delete(&self, id: &str) -> Result<()>;

    /// Runtime capability query for the dependency contract.
    ///
    /// Callers that want graph features branch on this rather than
    /// attempting an operation and catching the failure.
    fn as_dependency_tracker(&self) -> Option<&dyn DependencyTracker> {
        None
    }
}

//! Error types for `taskforge`.

/// Errors surfaced by backends, the graph wrapper, and the task service.
///
/// Every failure condition a caller might branch on has its own variant;
/// there is no generic catch-all. Nothing in the core retries or swallows
/// these - they propagate unchanged to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SQLite` database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The addressed id does not exist in the store.
    #[error("task not found: {0}")]
    NotFound(String),

    /// A caller supplied a malformed field value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The active backend lacks an optional field-level capability.
    ///
    /// Callers should degrade gracefully (e.g. hide the field) rather
    /// than treat this as a hard failure.
    #[error("backend '{backend}' does not support {field} writes")]
    Unsupported {
        /// Name of the backend that refused the write.
        backend: &'static str,
        /// The field that is not supported.
        field: String,
    },

    /// Inserting a dependency edge would create a directed cycle.
    #[error("dependency {blocker} -> {blocked} would create a cycle")]
    CycleDetected {
        /// The task that would block.
        blocker: String,
        /// The task that would be blocked.
        blocked: String,
    },

    /// No backend is registered under the requested name.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

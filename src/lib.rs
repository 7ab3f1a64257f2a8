//! # `taskforge`
//!
//! A todo tracker that routes operations through interchangeable storage
//! backends and can transparently layer dependency tracking onto any of
//! them.
//!
//! The pieces compose like this: a [`TaskService`] owns one [`Backend`]
//! resolved by name from a [`BackendRegistry`]; when dependency features
//! are wanted, the backend either offers them natively (the `SQLite`
//! backend) or is wrapped in a [`GraphBackend`]. Callers discover the
//! capability at runtime via [`Backend::as_dependency_tracker`] instead
//! of matching on backend names.
//!
//! # Example
//!
//! ```no_run
//! use taskforge::{BackendRegistry, NewTask, TaskService};
//! use std::path::Path;
//!
//! let registry = BackendRegistry::with_builtins();
//! let backend = registry
//!     .resolve_with_graph("sqlite", Path::new("/tmp/tasks.sqlite3"))
//!     .unwrap();
//! let service = TaskService::new(backend);
//!
//! let ship = service.create("Ship the release", NewTask::default()).unwrap();
//! let test = service.create("Run the test suite", NewTask::default()).unwrap();
//!
//! // Shipping waits for the tests.
//! let deps = service.dependencies().unwrap();
//! deps.add_dependency(&test.id, &ship.id).unwrap();
//! assert_eq!(deps.list_ready().unwrap().len(), 1);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod graph;
pub mod id;
pub mod model;
pub mod paths;
pub mod registry;
pub mod service;
pub mod store;

pub use backend::{Backend, FileBackend, SqliteBackend};
pub use error::{Error, Result};
pub use graph::{AnnotatedTask, DepNode, DependencyTracker, Edge, GraphBackend};
pub use model::{FieldWrite, Priority, Status, Task, TaskFilter};
pub use registry::BackendRegistry;
pub use service::{NewTask, TaskService};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Store lifecycle.
//!
//! A store is created explicitly and destroyed explicitly; between those
//! events it persists across process invocations. Multiple stores coexist
//! side by side, each resolved to its own location by [`StorePaths`].

use crate::backend::Backend;
use crate::error::Result;
use crate::graph::sidecar_path;
use crate::paths::StorePaths;
use crate::registry::BackendRegistry;
use std::path::Path;

/// Open (creating on first use) a named store with the given backend.
///
/// With `graph` set, the result is guaranteed to offer the dependency
/// contract - natively or via the graph wrapper.
///
/// # Errors
///
/// Fails with [`crate::Error::UnknownBackend`] for an unregistered backend
/// name, or with the backend's own construction error.
pub fn open_store(
    registry: &BackendRegistry,
    paths: &StorePaths,
    name: &str,
    backend: &str,
    graph: bool,
) -> Result<Box<dyn Backend>> {
    let store_path = paths.store_file(name, backend);
    if graph {
        registry.resolve_with_graph(backend, &store_path)
    } else {
        registry.resolve(backend, &store_path)
    }
}

/// Destroy a named store: remove its file or database plus any sidecar
/// edge file. Destroying an absent store succeeds.
///
/// # Errors
///
/// Returns an error if an existing file cannot be removed.
pub fn destroy_store(paths: &StorePaths, name: &str, backend: &str) -> Result<()> {
    let store_path = paths.store_file(name, backend);
    remove_if_present(&store_path)?;
    remove_if_present(&sidecar_path(&store_path))?;
    // SQLite WAL leftovers from an open-at-destroy-time store.
    for suffix in ["-wal", "-shm"] {
        let mut companion = store_path.clone().into_os_string();
        companion.push(suffix);
        remove_if_present(Path::new(&companion))?;
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::graph::DependencyTracker;
    use crate::model::TaskFilter;
    use crate::service::{NewTask, TaskService};
    use tempfile::TempDir;

    fn fixtures() -> (TempDir, BackendRegistry, StorePaths) {
        let dir = TempDir::new().unwrap();
        let paths = StorePaths::at(dir.path().to_path_buf());
        (dir, BackendRegistry::with_builtins(), paths)
    }

    #[test]
    fn test_stores_are_independent() {
        let (_dir, registry, paths) = fixtures();
        let work = open_store(&registry, &paths, "work", "sqlite", false).unwrap();
        let home = open_store(&registry, &paths, "home", "sqlite", false).unwrap();

        let service = TaskService::new(work);
        service.create("work item", NewTask::default()).unwrap();

        let home_service = TaskService::new(home);
        assert!(home_service.list(&TaskFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_store_persists_across_opens() {
        let (_dir, registry, paths) = fixtures();
        let id = {
            let backend = open_store(&registry, &paths, "work", "file", false).unwrap();
            TaskService::new(backend).create("survives reopen", NewTask::default()).unwrap().id
        };
        let backend = open_store(&registry, &paths, "work", "file", false).unwrap();
        assert_eq!(TaskService::new(backend).get(&id).unwrap().text, "survives reopen");
    }

    #[test]
    fn test_graph_flag_guarantees_capability() {
        let (_dir, registry, paths) = fixtures();
        for backend_name in ["file", "sqlite"] {
            let backend = open_store(&registry, &paths, "work", backend_name, true).unwrap();
            assert!(backend.as_dependency_tracker().is_some());
        }
    }

    #[test]
    fn test_destroy_removes_store_and_sidecar() {
        let (_dir, registry, paths) = fixtures();
        let backend = open_store(&registry, &paths, "work", "file", true).unwrap();
        let service = TaskService::new(backend);
        let a = service.create("first", NewTask::default()).unwrap();
        let b = service.create("second", NewTask::default()).unwrap();
        service.dependencies().unwrap().add_dependency(&a.id, &b.id).unwrap();

        let store_path = paths.store_file("work", "file");
        assert!(store_path.exists());
        assert!(sidecar_path(&store_path).exists());

        destroy_store(&paths, "work", "file").unwrap();
        assert!(!store_path.exists());
        assert!(!sidecar_path(&store_path).exists());

        // A fresh open sees an empty store.
        let backend = open_store(&registry, &paths, "work", "file", false).unwrap();
        assert!(matches!(backend.get(&a.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_destroy_absent_store_succeeds() {
        let (_dir, _registry, paths) = fixtures();
        destroy_store(&paths, "never-created", "sqlite").unwrap();
    }

    #[test]
    fn test_unknown_backend_name() {
        let (_dir, registry, paths) = fixtures();
        let result = open_store(&registry, &paths, "work", "redis", false);
        assert!(matches!(result, Err(Error::UnknownBackend(_))));
    }
}

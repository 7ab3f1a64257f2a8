//! Store location resolution.
//!
//! Stores live under a single data directory, `~/.taskforge/` by default:
//! the global store sits at the top level, named stores side by side under
//! `stores/`. The file extension follows the backend so the two media
//! never collide at the same path.

use std::path::{Path, PathBuf};

/// The base directory name for taskforge data.
const DATA_DIR_NAME: &str = ".taskforge";

/// Name of the implicit global store.
pub const GLOBAL_STORE: &str = "global";

/// Resolves store names to filesystem locations under one data directory.
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    /// Resolve against `~/.taskforge/`.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn from_home() -> Option<Self> {
        dirs::home_dir().map(|home| Self { root: home.join(DATA_DIR_NAME) })
    }

    /// Resolve against an explicit data directory.
    #[must_use]
    pub const fn at(root: PathBuf) -> Self {
        Self { root }
    }

    /// The data directory root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a store's file for a given backend.
    ///
    /// The global store lives at the root; named stores under `stores/`.
    #[must_use]
    pub fn store_file(&self, name: &str, backend: &str) -> PathBuf {
        let file = format!("{name}.{}", extension(backend));
        if name == GLOBAL_STORE {
            self.root.join(file)
        } else {
            self.root.join("stores").join(file)
        }
    }
}

/// File extension by backend name.
fn extension(backend: &str) -> &'static str {
    match backend {
        "file" => "todo",
        "sqlite" => "sqlite3",
        _ => "db",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_store_at_root() {
        let paths = StorePaths::at(PathBuf::from("/data"));
        assert_eq!(paths.store_file(GLOBAL_STORE, "sqlite"), Path::new("/data/global.sqlite3"));
        assert_eq!(paths.store_file(GLOBAL_STORE, "file"), Path::new("/data/global.todo"));
    }

    #[test]
    fn test_named_stores_nest_under_stores_dir() {
        let paths = StorePaths::at(PathBuf::from("/data"));
        assert_eq!(paths.store_file("work", "sqlite"), Path::new("/data/stores/work.sqlite3"));
        assert_eq!(paths.store_file("home", "file"), Path::new("/data/stores/home.todo"));
    }

    #[test]
    fn test_unknown_backend_gets_generic_extension() {
        let paths = StorePaths::at(PathBuf::from("/data"));
        assert_eq!(paths.store_file("work", "redis"), Path::new("/data/stores/work.db"));
    }

    #[test]
    fn test_same_name_different_backends_do_not_collide() {
        let paths = StorePaths::at(PathBuf::from("/data"));
        assert_ne!(paths.store_file("work", "file"), paths.store_file("work", "sqlite"));
    }
}

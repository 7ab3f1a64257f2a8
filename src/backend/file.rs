//! Flat-file backend: one tab-separated line per task.
//!
//! The file is meant to be human-readable and hand-editable, so the format
//! is deliberately plain: eight tab-separated fields per line, `#` lines
//! ignored, absent optional fields written as `-`. The whole file is parsed
//! on every read and rewritten on every write; concurrent external edits
//! are last-writer-wins at whole-file granularity.
//!
//! Due dates and metadata have no column in this format. Field-level writes
//! for them fail with [`Error::Unsupported`] so callers can degrade
//! gracefully instead of silently losing the write.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::model::{FieldWrite, Priority, Status, Task, TaskFilter};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Header written to the top of a fresh store file.
const HEADER: &str = "# taskforge store: id, status, priority, created, done, project, tags, text";

/// Placeholder for an absent optional field.
const EMPTY: &str = "-";

/// Flat-file task backend.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend over the given store file.
    ///
    /// The file itself is created on first write; a missing file reads as
    /// an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the whole store file. A missing file is an empty store.
    fn load(&self) -> Result<Vec<Task>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let mut tasks = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            tasks.push(parse_line(line).map_err(|reason| {
                Error::InvalidInput(format!(
                    "malformed task line {} in {}: {reason}",
                    lineno + 1,
                    self.path.display()
                ))
            })?);
        }
        Ok(tasks)
    }

    /// Rewrite the whole store file.
    fn save(&self, tasks: &[Task]) -> Result<()> {
        let mut out = String::from(HEADER);
        out.push('\n');
        for task in tasks {
            out.push_str(&format_line(task));
            out.push('\n');
        }
        std::fs::write(&self.path, out)?;
        Ok(())
    }

    /// Load, apply an in-place edit to the task with the given id, save,
    /// and return the new snapshot.
    fn modify(&self, id: &str, edit: impl FnOnce(&Task) -> Task) -> Result<Task> {
        let mut tasks = self.load()?;
        let slot = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let updated = edit(slot);
        *slot = updated.clone();
        self.save(&tasks)?;
        Ok(updated)
    }
}

impl Backend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn create(&self, task: Task) -> Result<Task> {
        if task.due.is_some() {
            return Err(Error::Unsupported { backend: self.name(), field: "due date".to_string() });
        }
        if !task.meta.is_empty() {
            return Err(Error::Unsupported { backend: self.name(), field: "metadata".to_string() });
        }
        let mut tasks = self.load()?;
        if tasks.iter().any(|t| t.id == task.id) {
            return Err(Error::InvalidInput(format!("duplicate task id: {}", task.id)));
        }
        tasks.push(task.clone());
        self.save(&tasks)?;
        Ok(task)
    }

    fn get(&self, id: &str) -> Result<Task> {
        self.load()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let now = Utc::now();
        Ok(self.load()?.into_iter().filter(|t| filter.matches(t, &now)).collect())
    }

    fn update_status(&self, id: &str, status: Status, done_at: Option<String>) -> Result<Task> {
        self.modify(id, |task| task.with_status(status, done_at))
    }

    fn update_field(&self, id: &str, write: &FieldWrite) -> Result<Task> {
        match write {
            FieldWrite::Due(_) | FieldWrite::Meta { .. } => Err(Error::Unsupported {
                backend: self.name(),
                field: write.field_name().to_string(),
            }),
            FieldWrite::Priority(_) | FieldWrite::AddTag(_) | FieldWrite::RemoveTag(_) => {
                self.modify(id, |task| task.with_field(write))
            }
        }
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut tasks = self.load()?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        self.save(&tasks)?;
        Ok(())
    }
}

/// Serialize a task to one store line.
fn format_line(task: &Task) -> String {
    let tags = if task.tags.is_empty() {
        EMPTY.to_string()
    } else {
        task.tags.iter().cloned().collect::<Vec<_>>().join(",")
    };
    [
        task.id.as_str(),
        task.status.as_str(),
        task.priority.as_str(),
        task.created_at.as_str(),
        task.done_at.as_deref().unwrap_or(EMPTY),
        task.project.as_deref().unwrap_or(EMPTY),
        tags.as_str(),
        task.text.as_str(),
    ]
    .join("\t")
}

/// Parse one store line back into a task.
fn parse_line(line: &str) -> std::result::Result<Task, String> {
    let fields: Vec<&str> = line.splitn(8, '\t').collect();
    if fields.len() != 8 {
        return Err(format!("expected 8 tab-separated fields, found {}", fields.len()));
    }
    let status = Status::from_str(fields[1]).map_err(|e| e.to_string())?;
    let priority = Priority::from_name(fields[2]).map_err(|e| e.to_string())?;
    let done_at = optional(fields[4]);
    if done_at.is_some() != (status == Status::Done) {
        return Err("done timestamp must be present exactly for done tasks".to_string());
    }
    let tags = optional(fields[6])
        .map(|t| t.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    Ok(Task {
        id: fields[0].to_string(),
        text: fields[7].to_string(),
        status,
        priority,
        project: optional(fields[5]),
        tags,
        due: None,
        meta: BTreeMap::new(),
        created_at: fields[3].to_string(),
        done_at,
    })
}

/// Map the `-` placeholder back to `None`.
fn optional(field: &str) -> Option<String> {
    if field == EMPTY {
        None
    } else {
        Some(field.to_string())
    }
}

//! Tasks and their on-disk run collection.
//!
//! File layout under the task's directory:
//! - `task.json`: the task itself
//! - `runs/<run id>/task_run.json`: one file per recorded run
//!
//! Runs are never edited in place, only added or deleted. Writes assume a single writer per file; there is no
//! cross-process locking.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::run::{RecordMeta, TaskRun};
use crate::error::{Error, Result};
use crate::json_schema;
use crate::utils;

/// File name of a serialized task.
pub const TASK_FILENAME: &str = "task.json";
/// File name of a serialized run, inside its own directory.
pub const RUN_FILENAME: &str = "task_run.json";
const RUNS_DIR: &str = "runs";

/// A unit of work with optional structured input and output.
///
/// A missing schema means the task accepts or produces plain text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Instructions given to the model for every run.
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_json_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_json_schema: Option<String>,
    /// Location of `task.json`. Autosave only happens when this is set.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Task {
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::new(),
            name: name.into(),
            description: String::new(),
            instruction: instruction.into(),
            input_json_schema: None,
            output_json_schema: None,
            path: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the input schema, rejecting anything that is not an object schema.
    pub fn with_input_schema(mut self, schema: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        json_schema::check_schema_str(&schema)?;
        self.input_json_schema = Some(schema);
        Ok(self)
    }

    /// Set the output schema, rejecting anything that is not an object schema.
    pub fn with_output_schema(mut self, schema: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        json_schema::check_schema_str(&schema)?;
        self.output_json_schema = Some(schema);
        Ok(self)
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Check both schemas, if present.
    pub fn validate(&self) -> Result<()> {
        if let Some(schema) = &self.input_json_schema {
            json_schema::check_schema_str(schema)?;
        }
        if let Some(schema) = &self.output_json_schema {
            json_schema::check_schema_str(schema)?;
        }
        Ok(())
    }

    pub fn input_schema(&self) -> Result<Option<Value>> {
        self.input_json_schema
            .as_deref()
            .map(json_schema::parse_and_check)
            .transpose()
    }

    pub fn output_schema(&self) -> Result<Option<Value>> {
        self.output_json_schema
            .as_deref()
            .map(json_schema::parse_and_check)
            .transpose()
    }

    /// Directory holding `task.json` and `runs/`.
    pub fn dir(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    // ─────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────

    /// Load a task from a `task.json` file (or a directory containing one).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = if path.is_dir() {
            path.join(TASK_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&file)?;
        let mut task: Task = serde_json::from_str(&content)?;
        task.validate()?;
        task.path = Some(file);
        debug!(task = %task.meta.id, path = %task.path_display(), "Loaded task");
        Ok(task)
    }

    /// Write the task to its path as pretty JSON.
    pub fn save_to_file(&self) -> Result<PathBuf> {
        let path = self.require_path()?;
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(task = %self.meta.id, path = %path.display(), "Saved task");
        Ok(path.to_path_buf())
    }

    /// All runs recorded for this task, oldest first.
    ///
    /// A task without a path has no persisted runs. Run files that cannot be
    /// read or parsed are skipped.
    pub fn runs(&self) -> Result<Vec<TaskRun>> {
        let Some(runs_dir) = self.runs_dir() else {
            return Ok(Vec::new());
        };
        if !runs_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in std::fs::read_dir(&runs_dir)? {
            let run_file = entry?.path().join(RUN_FILENAME);
            if !run_file.is_file() {
                continue;
            }
            let content = match std::fs::read_to_string(&run_file) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Failed to read run file {}: {}", run_file.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<TaskRun>(&content) {
                Ok(run) => runs.push(run),
                Err(e) => warn!("Skipping unparseable run file {}: {}", run_file.display(), e),
            }
        }

        runs.sort_by(|a, b| {
            a.meta
                .created_at
                .cmp(&b.meta.created_at)
                .then_with(|| a.meta.id.cmp(&b.meta.id))
        });
        Ok(runs)
    }

    /// Persist a run under this task. Returns the written file path.
    pub fn save_run(&self, run: &TaskRun) -> Result<PathBuf> {
        self.require_path()?;
        let runs_dir = self.runs_dir().unwrap_or_else(|| PathBuf::from(RUNS_DIR));
        let run_dir = runs_dir.join(utils::safe_filename(run.id()));
        std::fs::create_dir_all(&run_dir)?;

        let file = run_dir.join(RUN_FILENAME);
        std::fs::write(&file, serde_json::to_string_pretty(run)?)?;
        info!(task = %self.meta.id, run = %run.id(), "Saved run to {}", file.display());
        Ok(file)
    }

    /// Load one run by id. `Ok(None)` when no run with that id is recorded.
    pub fn run_from_id(&self, run_id: &str) -> Result<Option<TaskRun>> {
        let Some(run_file) = self.run_file(run_id) else {
            return Ok(None);
        };
        if !run_file.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&run_file)?;
        let run: TaskRun = serde_json::from_str(&content)?;
        Ok(Some(run))
    }

    /// Remove a recorded run and its directory.
    pub fn delete_run(&self, run_id: &str) -> Result<()> {
        self.require_path()?;
        let run_dir = self
            .run_file(run_id)
            .and_then(|file| file.parent().map(Path::to_path_buf))
            .filter(|dir| dir.join(RUN_FILENAME).is_file())
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("run {run_id} not found in task '{}'", self.name),
                ))
            })?;

        std::fs::remove_dir_all(&run_dir)?;
        info!(task = %self.meta.id, run = run_id, "Deleted run");
        Ok(())
    }

    fn run_file(&self, run_id: &str) -> Option<PathBuf> {
        self.runs_dir()
            .map(|dir| dir.join(utils::safe_filename(run_id)).join(RUN_FILENAME))
    }

    fn runs_dir(&self) -> Option<PathBuf> {
        self.dir().map(|dir| dir.join(RUNS_DIR))
    }

    fn require_path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("task '{}' has no path to save to", self.name),
            ))
        })
    }

    fn path_display(&self) -> String {
        self.path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::{DataSource, TaskOutput};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    const OUTPUT_SCHEMA: &str =
        r#"{"type":"object","properties":{"x":{"type":"integer"}},"required":["x"]}"#;

    fn make_run(input: &str) -> TaskRun {
        TaskRun::new(
            input,
            DataSource::human("tester"),
            TaskOutput::new("out", DataSource::synthetic(BTreeMap::new())),
        )
    }

    #[test]
    fn test_with_schema_validates() {
        let task = Task::new("t", "do it").with_output_schema(OUTPUT_SCHEMA).unwrap();
        assert!(task.output_schema().unwrap().is_some());
        assert!(task.input_schema().unwrap().is_none());

        let err = Task::new("t", "do it").with_input_schema(r#"{"type":"array"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_validate_catches_hand_edited_schema() {
        let mut task = Task::new("t", "do it");
        task.output_json_schema = Some("[]".to_string());
        assert!(matches!(task.validate(), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_runs_without_path_is_empty() {
        let task = Task::new("t", "do it");
        assert!(task.runs().unwrap().is_empty());
        assert!(task.save_run(&make_run("x")).is_err());
        assert!(task.save_to_file().is_err());
    }

    #[test]
    fn test_save_and_load_task() {
        let dir = tempdir().unwrap();
        let task = Task::new("Summarize", "Summarize the text")
            .with_description("short summaries")
            .with_output_schema(OUTPUT_SCHEMA)
            .unwrap()
            .with_path(dir.path().join("task.json"));
        task.save_to_file().unwrap();

        let loaded = Task::load_from_file(dir.path()).unwrap();
        assert_eq!(loaded.meta.id, task.meta.id);
        assert_eq!(loaded.name, "Summarize");
        assert_eq!(loaded.output_json_schema.as_deref(), Some(OUTPUT_SCHEMA));
        assert_eq!(loaded.path.as_deref(), Some(dir.path().join("task.json").as_path()));
    }

    #[test]
    fn test_load_rejects_invalid_schema_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("task.json");
        std::fs::write(
            &path,
            r#"{"id":"abc","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z",
                "name":"t","instruction":"i","output_json_schema":"{\"type\":\"string\"}"}"#,
        )
        .unwrap();
        assert!(matches!(Task::load_from_file(&path), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_save_run_and_list() {
        let dir = tempdir().unwrap();
        let task = Task::new("t", "i").with_path(dir.path().join("task.json"));
        task.save_to_file().unwrap();

        let first = make_run("one");
        let second = make_run("two");
        let path = task.save_run(&first).unwrap();
        task.save_run(&second).unwrap();

        assert!(path.ends_with(format!("runs/{}/task_run.json", first.id())));
        let runs = task.runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.contains(&first));
        assert!(runs.contains(&second));
    }

    #[test]
    fn test_runs_skips_corrupt_files() {
        let dir = tempdir().unwrap();
        let task = Task::new("t", "i").with_path(dir.path().join("task.json"));
        task.save_run(&make_run("good")).unwrap();

        let bad_dir = dir.path().join("runs").join("broken");
        std::fs::create_dir_all(&bad_dir).unwrap();
        std::fs::write(bad_dir.join(RUN_FILENAME), "{ nope").unwrap();
        std::fs::create_dir_all(dir.path().join("runs").join("empty")).unwrap();

        let runs = task.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].input, "good");
    }

    #[test]
    fn test_run_from_id() {
        let dir = tempdir().unwrap();
        let task = Task::new("t", "i").with_path(dir.path().join("task.json"));
        let run = make_run("find me");
        task.save_run(&run).unwrap();

        assert_eq!(task.run_from_id(run.id()).unwrap(), Some(run));
        assert_eq!(task.run_from_id("missing").unwrap(), None);
        assert_eq!(Task::new("t", "i").run_from_id("any").unwrap(), None);
    }

    #[test]
    fn test_run_from_id_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let task = Task::new("t", "i").with_path(dir.path().join("task.json"));
        let run_dir = dir.path().join("runs").join("broken");
        std::fs::create_dir_all(&run_dir).unwrap();
        std::fs::write(run_dir.join(RUN_FILENAME), "{ nope").unwrap();

        assert!(matches!(task.run_from_id("broken"), Err(Error::Json(_))));
    }

    #[test]
    fn test_delete_run() {
        let dir = tempdir().unwrap();
        let task = Task::new("t", "i").with_path(dir.path().join("task.json"));
        let keep = make_run("keep");
        let gone = make_run("gone");
        task.save_run(&keep).unwrap();
        task.save_run(&gone).unwrap();

        task.delete_run(gone.id()).unwrap();
        assert!(!dir.path().join("runs").join(gone.id()).exists());
        assert_eq!(task.runs().unwrap(), vec![keep]);
        assert_eq!(task.run_from_id(gone.id()).unwrap(), None);
    }

    #[test]
    fn test_delete_run_not_found() {
        let dir = tempdir().unwrap();
        let task = Task::new("t", "i").with_path(dir.path().join("task.json"));
        let Err(Error::Io(err)) = task.delete_run("missing") else {
            panic!("expected NotFound");
        };
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);

        assert!(Task::new("t", "i").delete_run("missing").is_err());
    }

    #[test]
    fn test_path_is_not_serialized() {
        let task = Task::new("t", "i").with_path("/tmp/x/task.json");
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("path").is_none());
        assert!(json.get("input_json_schema").is_none());
    }
}

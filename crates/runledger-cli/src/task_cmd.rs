//! Task commands: `check-schema`, `create-task`, `show-task`, `run`, `runs`,
//! `show-run` and `delete-run`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tracing::info;

use runledger_adapters::provider::ModelProviderName;
use runledger_adapters::registry::adapter_for_task;
use runledger_core::config::load_config;
use runledger_core::datamodel::task::TASK_FILENAME;
use runledger_core::datamodel::{Task, TaskIo};
use runledger_core::json_schema::{parse_and_check, string_to_json_key};

use crate::helpers::{expand_tilde, format_output, print_heading, run_summary};

/// Check a schema file and print the result.
pub fn check_schema(file: &str) -> Result<()> {
    let path = expand_tilde(file);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read schema file {}", path.display()))?;

    let schema = parse_and_check(&text)?;
    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .map_or(0, |p| p.len());

    println!(
        "  {} {} is a valid task schema ({} properties)",
        "✓".green(),
        path.display(),
        properties
    );
    Ok(())
}

/// Create a task directory under `parent` and write its `task.json`.
///
/// The directory is named after the task, falling back to its id when the
/// name has no usable characters.
pub fn create_task(
    parent: &str,
    name: &str,
    instruction: &str,
    description: Option<&str>,
    input_schema: Option<&str>,
    output_schema: Option<&str>,
) -> Result<Task> {
    let mut task = Task::new(name, instruction);
    if let Some(description) = description {
        task = task.with_description(description);
    }
    if let Some(file) = input_schema {
        task = task.with_input_schema(read_schema_file(file)?)?;
    }
    if let Some(file) = output_schema {
        task = task.with_output_schema(read_schema_file(file)?)?;
    }

    let key = string_to_json_key(name);
    let dir_name = if key.is_empty() { task.meta.id.clone() } else { key };
    let path = expand_tilde(parent).join(dir_name).join(TASK_FILENAME);
    if path.exists() {
        bail!("a task already exists at {}", path.display());
    }

    let task = task.with_path(path);
    let written = task.save_to_file()?;
    info!(task = %task.meta.id, "Created task");

    println!("  {} Created task {} at {}", "✓".green(), task.meta.id, written.display());
    Ok(task)
}

/// Print a task and how many runs it has.
pub fn show_task(task_path: &str) -> Result<()> {
    let task = load_task(task_path)?;
    let run_count = task.runs()?.len();

    print_heading(&task.name);
    println!("{}", serde_json::to_string_pretty(&task)?);
    println!();
    println!("{}", format!("{run_count} runs recorded").dimmed());
    println!();
    Ok(())
}

/// Build the task input from `--input` / `--input-json`.
pub fn parse_input(input: Option<String>, input_json: Option<String>) -> Result<TaskIo> {
    match (input, input_json) {
        (_, Some(json)) => TaskIo::parse_structured(&json).context("--input-json must be a JSON object"),
        (Some(text), None) => Ok(TaskIo::Plaintext(text)),
        (None, None) => bail!("one of --input or --input-json is required"),
    }
}

/// Run a task once, printing the output and the recorded run id.
pub async fn run_task(
    config_path: Option<&Path>,
    task_path: &str,
    model: &str,
    provider: &str,
    input: TaskIo,
) -> Result<()> {
    let config = Arc::new(load_config(config_path));
    let task = Arc::new(load_task(task_path)?);
    let provider: ModelProviderName = provider.parse()?;

    let adapter = adapter_for_task(task.clone(), model, provider, config)
        .with_context(|| format!("failed to build adapter for {provider}/{model}"))?;

    info!(task = %task.meta.id, model, provider = %provider, "Running task");
    let result = adapter
        .invoke_returning_run(&input, None)
        .await
        .with_context(|| format!("task '{}' failed", task.name))?;

    print_heading(&task.name);
    println!("{}", format_output(&result.output));
    println!();
    let note = if result.deduplicated {
        " (identical run already recorded)"
    } else {
        ""
    };
    println!("{}", format!("run {}{}", result.run.id(), note).dimmed());
    println!();

    Ok(())
}

/// List recorded runs for a task, oldest first.
pub fn list_runs(task_path: &str) -> Result<()> {
    let task = load_task(task_path)?;
    let runs = task.runs()?;

    print_heading(&format!("{} · {} runs", task.name, runs.len()));
    if runs.is_empty() {
        println!("  {}", "(no runs recorded)".dimmed());
    }
    for run in &runs {
        println!("  {}", run_summary(run));
    }
    println!();

    Ok(())
}

/// Print one recorded run as JSON.
pub fn show_run(task_path: &str, run_id: &str) -> Result<()> {
    let task = load_task(task_path)?;
    let Some(run) = task.run_from_id(run_id)? else {
        bail!("run {run_id} not found in task '{}'", task.name);
    };

    print_heading(&format!("{} · run {}", task.name, run.id()));
    println!("{}", serde_json::to_string_pretty(&run)?);
    println!();
    Ok(())
}

/// Delete one recorded run.
pub fn delete_run(task_path: &str, run_id: &str) -> Result<()> {
    let task = load_task(task_path)?;
    task.delete_run(run_id)
        .with_context(|| format!("failed to delete run {run_id}"))?;

    println!("  {} Deleted run {}", "✓".green(), run_id);
    Ok(())
}

fn read_schema_file(file: &str) -> Result<String> {
    let path = expand_tilde(file);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read schema file {}", path.display()))?;
    parse_and_check(&text).with_context(|| format!("{} is not a usable task schema", path.display()))?;
    Ok(text)
}

fn load_task(task_path: &str) -> Result<Task> {
    let path = expand_tilde(task_path);
    Task::load_from_file(&path).with_context(|| format!("failed to load task from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use runledger_core::datamodel::{DataSource, TaskOutput, TaskRun};
    use serde_json::json;
    use std::collections::BTreeMap;

    const X_SCHEMA: &str = r#"{"type":"object","properties":{"x":{"type":"integer"}}}"#;

    fn saved_task_with_run(dir: &Path) -> (Task, TaskRun) {
        let task = Task::new("t", "i").with_path(dir.join("task.json"));
        task.save_to_file().unwrap();
        let run = TaskRun::new(
            "in",
            DataSource::human("me"),
            TaskOutput::new("out", DataSource::synthetic(BTreeMap::new())),
        );
        task.save_run(&run).unwrap();
        (task, run)
    }

    #[test]
    fn create_task_writes_named_directory() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("out.json");
        std::fs::write(&schema, X_SCHEMA).unwrap();
        let parent = dir.path().to_str().unwrap();

        let task = create_task(
            parent,
            "Extract X!",
            "Find x.",
            Some("pulls x out"),
            None,
            Some(schema.to_str().unwrap()),
        )
        .unwrap();

        let path = dir.path().join("extract_x").join("task.json");
        assert_eq!(task.path.as_deref(), Some(path.as_path()));
        let loaded = Task::load_from_file(&path).unwrap();
        assert_eq!(loaded.meta.id, task.meta.id);
        assert_eq!(loaded.description, "pulls x out");
        assert_eq!(loaded.output_json_schema.as_deref(), Some(X_SCHEMA));
        assert!(loaded.input_json_schema.is_none());

        // Same name again collides with the existing task.
        assert!(create_task(parent, "Extract X!", "Find x.", None, None, None).is_err());
        show_task(path.to_str().unwrap()).unwrap();
    }

    #[test]
    fn create_task_falls_back_to_id_directory() {
        let dir = tempfile::tempdir().unwrap();
        let task = create_task(dir.path().to_str().unwrap(), "???", "i", None, None, None).unwrap();
        assert!(dir.path().join(&task.meta.id).join("task.json").is_file());
    }

    #[test]
    fn create_task_rejects_bad_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("in.json");
        std::fs::write(&schema, r#"{"type":"array"}"#).unwrap();
        let parent = dir.path().to_str().unwrap();

        assert!(create_task(parent, "t", "i", None, Some(schema.to_str().unwrap()), None).is_err());
        assert!(create_task(parent, "t", "i", None, Some("missing.json"), None).is_err());
        assert!(!dir.path().join("t").exists());
    }

    #[test]
    fn show_and_delete_run() {
        let dir = tempfile::tempdir().unwrap();
        let (task, run) = saved_task_with_run(dir.path());
        let task_path = dir.path().to_str().unwrap();

        show_run(task_path, run.id()).unwrap();
        assert!(show_run(task_path, "missing").is_err());

        delete_run(task_path, run.id()).unwrap();
        assert!(task.runs().unwrap().is_empty());
        assert!(show_run(task_path, run.id()).is_err());
        assert!(delete_run(task_path, run.id()).is_err());
    }

    #[test]
    fn parse_input_plaintext() {
        let input = parse_input(Some("hello".into()), None).unwrap();
        assert_eq!(input, TaskIo::from("hello"));
    }

    #[test]
    fn parse_input_json_object() {
        let input = parse_input(None, Some(r#"{"x": 1}"#.into())).unwrap();
        assert_eq!(input, TaskIo::try_from(json!({"x": 1})).unwrap());
    }

    #[test]
    fn parse_input_rejects_non_object_json() {
        assert!(parse_input(None, Some("[1, 2]".into())).is_err());
        assert!(parse_input(None, Some("not json".into())).is_err());
        assert!(parse_input(None, None).is_err());
    }

    #[test]
    fn check_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"type":"object","properties":{"x":{"type":"integer"}}}"#).unwrap();
        check_schema(good.to_str().unwrap()).unwrap();

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"type":"array"}"#).unwrap();
        assert!(check_schema(bad.to_str().unwrap()).is_err());

        assert!(check_schema(dir.path().join("missing.json").to_str().unwrap()).is_err());
    }

    #[test]
    fn list_runs_for_saved_task() {
        let dir = tempfile::tempdir().unwrap();
        let task = Task::new("t", "i").with_path(dir.path().join("task.json"));
        task.save_to_file().unwrap();

        list_runs(dir.path().to_str().unwrap()).unwrap();
        assert!(list_runs(dir.path().join("nope").to_str().unwrap()).is_err());
    }
}

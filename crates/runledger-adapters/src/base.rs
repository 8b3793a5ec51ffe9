//! Base adapter protocol: validation, dispatch, run recording.
//!
//! Every backend implements [`Dispatcher`]; [`TaskAdapter`] wraps one and
//! enforces the same contract for all of them:
//!
//! 1. validate the input against the task's input schema
//! 2. dispatch to the backend
//! 3. validate the output against the task's output schema (or require plain text)
//! 4. build a [`TaskRun`], reusing an existing run with identical content
//! 5. persist new runs when autosave is on and the task has a path
//!
//! A `TaskAdapter` holds no mutable state. Concurrent invocations are
//! independent; two identical invocations finishing at the same time may both
//! persist a run, since the scan-then-save step is not locked.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use runledger_core::config::Config;
use runledger_core::datamodel::{DataSource, Task, TaskIo, TaskOutput, TaskRun};
use runledger_core::json_schema::validate_instance;
use runledger_core::{Error, Result};

// ─────────────────────────────────────────────
// Dispatcher trait
// ─────────────────────────────────────────────

/// Descriptive metadata about an adapter, attached to every synthetic output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterInfo {
    pub adapter_name: String,
    pub model_name: String,
    pub model_provider: String,
    pub prompt_builder_name: String,
}

/// The capability a concrete backend supplies: turn a task input into a raw output.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Send `input` to the backend and return its raw output.
    ///
    /// Structured tasks should return [`TaskIo::Structured`], plaintext tasks
    /// [`TaskIo::Plaintext`]; the adapter rejects anything else. Failures talking
    /// to the backend are reported as [`Error::Dispatch`]. Any retry policy
    /// belongs in here, not in the adapter.
    async fn run(&self, input: &TaskIo) -> Result<TaskIo>;

    /// Identity used to tag synthetic outputs.
    fn adapter_info(&self) -> AdapterInfo;

    /// Backend-specific guidance to add to the prompt (e.g. JSON formatting rules).
    fn adapter_specific_instructions(&self) -> Option<String> {
        None
    }
}

// ─────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────

/// Outcome of the run recorder.
#[derive(Clone, Debug, PartialEq)]
pub enum RunRecord {
    /// No run with the same content exists; the caller may persist this one.
    New(TaskRun),
    /// An identical run was already recorded and is returned unchanged.
    Existing(TaskRun),
}

impl RunRecord {
    pub fn run(&self) -> &TaskRun {
        match self {
            RunRecord::New(run) | RunRecord::Existing(run) => run,
        }
    }

    pub fn into_run(self) -> TaskRun {
        match self {
            RunRecord::New(run) | RunRecord::Existing(run) => run,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, RunRecord::New(_))
    }
}

/// What `invoke_returning_run` hands back.
#[derive(Clone, Debug)]
pub struct AdapterRun {
    pub run: TaskRun,
    pub output: TaskIo,
    /// True when `run` is a previously recorded duplicate.
    pub deduplicated: bool,
}

// ─────────────────────────────────────────────
// TaskAdapter
// ─────────────────────────────────────────────

/// Runs one task through one dispatcher.
pub struct TaskAdapter {
    task: Arc<Task>,
    config: Arc<Config>,
    dispatcher: Arc<dyn Dispatcher>,
    input_schema: Option<String>,
    output_schema: Option<String>,
}

impl std::fmt::Debug for TaskAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskAdapter")
            .field("task", &self.task.name)
            .field("adapter", &self.dispatcher.adapter_info().adapter_name)
            .field("structured_input", &self.input_schema.is_some())
            .field("structured_output", &self.output_schema.is_some())
            .finish()
    }
}

impl TaskAdapter {
    /// Create an adapter. Fails with [`Error::InvalidSchema`] if either of the
    /// task's schemas is malformed.
    pub fn new(task: Arc<Task>, config: Arc<Config>, dispatcher: Arc<dyn Dispatcher>) -> Result<Self> {
        task.validate()?;
        let input_schema = task.input_json_schema.clone();
        let output_schema = task.output_json_schema.clone();
        Ok(Self {
            task,
            config,
            dispatcher,
            input_schema,
            output_schema,
        })
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn has_structured_output(&self) -> bool {
        self.output_schema.is_some()
    }

    pub fn adapter_info(&self) -> AdapterInfo {
        self.dispatcher.adapter_info()
    }

    pub fn adapter_specific_instructions(&self) -> Option<String> {
        self.dispatcher.adapter_specific_instructions()
    }

    /// Run the task and return only the output.
    pub async fn invoke(&self, input: &TaskIo, input_source: Option<DataSource>) -> Result<TaskIo> {
        Ok(self.invoke_returning_run(input, input_source).await?.output)
    }

    /// Run the task and return both the recorded run and the output.
    pub async fn invoke_returning_run(
        &self,
        input: &TaskIo,
        input_source: Option<DataSource>,
    ) -> Result<AdapterRun> {
        if let Some(schema) = &self.input_schema {
            let Some(fields) = input.as_structured() else {
                return Err(Error::InvalidInput(format!(
                    "structured input is not a JSON object: {input}"
                )));
            };
            validate_instance(&Value::Object(fields.clone()), schema)?;
        }

        debug!(task = %self.task.meta.id, "Dispatching task input");
        let output = self.dispatcher.run(input).await?;

        match (&self.output_schema, &output) {
            (Some(schema), TaskIo::Structured(fields)) => {
                validate_instance(&Value::Object(fields.clone()), schema)?;
            }
            (Some(_), TaskIo::Plaintext(text)) => {
                return Err(Error::UnexpectedOutputShape(format!(
                    "structured response is not a JSON object: {text}"
                )));
            }
            (None, TaskIo::Structured(_)) => {
                return Err(Error::UnexpectedOutputShape(format!(
                    "response is not a string for non-structured task: {output}"
                )));
            }
            (None, TaskIo::Plaintext(_)) => {}
        }

        let record = self.generate_run(input, input_source, &output)?;
        let deduplicated = !record.is_new();

        if record.is_new() && self.config.autosave_runs && self.task.path.is_some() {
            self.task.save_run(record.run())?;
        }

        Ok(AdapterRun {
            run: record.into_run(),
            output,
            deduplicated,
        })
    }

    /// Build the run for an invocation, or find an identical one already recorded.
    ///
    /// Structured values are stored as compact JSON. A missing `input_source`
    /// defaults to a human source created by the configured user. The output
    /// source is always synthetic and tagged with this adapter's info.
    pub fn generate_run(
        &self,
        input: &TaskIo,
        input_source: Option<DataSource>,
        output: &TaskIo,
    ) -> Result<RunRecord> {
        let input_source =
            input_source.unwrap_or_else(|| DataSource::human(self.config.user_id.clone()));

        let candidate = TaskRun::new(
            input.to_record_string()?,
            input_source,
            TaskOutput::new(
                output.to_record_string()?,
                DataSource::synthetic(self.properties_for_task_output()),
            ),
        );

        // TODO: index fingerprints per task once run histories get large; this is a full scan.
        let fingerprint = candidate.fingerprint();
        if let Some(existing) = self
            .task
            .runs()?
            .into_iter()
            .find(|run| run.fingerprint() == fingerprint)
        {
            debug!(task = %self.task.meta.id, run = %existing.id(), "Reusing identical run");
            return Ok(RunRecord::Existing(existing));
        }

        debug!(task = %self.task.meta.id, run = %candidate.id(), "No identical run found");
        Ok(RunRecord::New(candidate))
    }

    fn properties_for_task_output(&self) -> BTreeMap<String, Value> {
        let info = self.adapter_info();
        BTreeMap::from([
            ("adapter_name".to_string(), Value::String(info.adapter_name)),
            ("model_name".to_string(), Value::String(info.model_name)),
            ("model_provider".to_string(), Value::String(info.model_provider)),
            (
                "prompt_builder_name".to_string(),
                Value::String(info.prompt_builder_name),
            ),
        ])
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

//! Task runs: immutable records of one invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::io::{canonical_string, TaskIo};
use super::source::DataSource;
use crate::error::Result;
use crate::utils;

// ─────────────────────────────────────────────
// RecordMeta: auto-generated fields
// ─────────────────────────────────────────────

/// Auto-generated identity fields carried by every persisted record.
///
/// These are the only non-deterministic fields of a run, so they are exactly
/// what the dedup fingerprint leaves out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecordMeta {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: utils::new_id(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────
// TaskOutput
// ─────────────────────────────────────────────

/// The output half of a run: the produced text plus its provenance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Plain text, or compact JSON for structured tasks.
    pub output: String,
    pub source: DataSource,
}

impl TaskOutput {
    pub fn new(output: impl Into<String>, source: DataSource) -> Self {
        Self {
            meta: RecordMeta::new(),
            output: output.into(),
            source,
        }
    }

    /// Parse the output string back into a structured value.
    pub fn structured(&self) -> Result<TaskIo> {
        TaskIo::parse_structured(&self.output)
    }
}

// ─────────────────────────────────────────────
// TaskRun
// ─────────────────────────────────────────────

/// An immutable record of one task invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Plain text, or compact JSON for structured tasks.
    pub input: String,
    pub input_source: DataSource,
    pub output: TaskOutput,
}

/// Content key for run deduplication.
///
/// Canonical JSON of everything in a run except ids and timestamps.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RunFingerprint(String);

impl RunFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TaskRun {
    pub fn new(input: impl Into<String>, input_source: DataSource, output: TaskOutput) -> Self {
        Self {
            meta: RecordMeta::new(),
            input: input.into(),
            input_source,
            output,
        }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Fingerprint over the run's content, excluding `id`, `created_at` and
    /// `updated_at` on both the run and its output.
    pub fn fingerprint(&self) -> RunFingerprint {
        let projection = json!({
            "input": self.input,
            "input_source": self.input_source,
            "output": {
                "output": self.output.output,
                "source": self.output.source,
            },
        });
        RunFingerprint(canonical_string(&projection))
    }

    /// Parse the input string back into a structured value.
    pub fn structured_input(&self) -> Result<TaskIo> {
        TaskIo::parse_structured(&self.input)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

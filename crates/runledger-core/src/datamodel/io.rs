//! Task input/output values.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A task input or output: a JSON object for structured tasks, plain text otherwise.
///
/// Serialized untagged, so it reads and writes as either a JSON object or a JSON string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskIo {
    Structured(Map<String, Value>),
    Plaintext(String),
}

impl TaskIo {
    pub fn is_structured(&self) -> bool {
        matches!(self, TaskIo::Structured(_))
    }

    pub fn as_structured(&self) -> Option<&Map<String, Value>> {
        match self {
            TaskIo::Structured(map) => Some(map),
            TaskIo::Plaintext(_) => None,
        }
    }

    pub fn as_plaintext(&self) -> Option<&str> {
        match self {
            TaskIo::Plaintext(text) => Some(text),
            TaskIo::Structured(_) => None,
        }
    }

    /// The string stored in a run record: compact JSON with sorted keys for
    /// structured values, the text itself otherwise.
    pub fn to_record_string(&self) -> Result<String> {
        match self {
            TaskIo::Structured(map) => Ok(serde_json::to_string(&CanonicalMap(map))?),
            TaskIo::Plaintext(text) => Ok(text.clone()),
        }
    }

    /// Parse a structured record string back into a `TaskIo`.
    pub fn parse_structured(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(TaskIo::Structured(map)),
            other => Err(Error::InvalidInput(format!(
                "expected a JSON object, got: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TaskIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskIo::Structured(map) => write!(f, "{}", Value::Object(map.clone())),
            TaskIo::Plaintext(text) => f.write_str(text),
        }
    }
}

impl From<String> for TaskIo {
    fn from(text: String) -> Self {
        TaskIo::Plaintext(text)
    }
}

impl From<&str> for TaskIo {
    fn from(text: &str) -> Self {
        TaskIo::Plaintext(text.to_string())
    }
}

impl From<Map<String, Value>> for TaskIo {
    fn from(map: Map<String, Value>) -> Self {
        TaskIo::Structured(map)
    }
}

impl TryFrom<Value> for TaskIo {
    type Error = Error;

    /// Objects become structured values and strings become plain text.
    /// Arrays and scalars are never valid task I/O.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(TaskIo::Structured(map)),
            Value::String(text) => Ok(TaskIo::Plaintext(text)),
            other => Err(Error::InvalidInput(format!(
                "task input must be a JSON object or a string, got: {other}"
            ))),
        }
    }
}

// ─────────────────────────────────────────────
// Canonical JSON
// ─────────────────────────────────────────────

/// Compact JSON with object keys sorted at every depth, independent of the
/// map's insertion order.
pub(crate) fn canonical_string(value: &Value) -> String {
    serde_json::to_string(&Canonical(value)).unwrap_or_else(|_| value.to_string())
}

struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => CanonicalMap(map).serialize(serializer),
            Value::Array(items) => serializer.collect_seq(items.iter().map(Canonical)),
            other => other.serialize(serializer),
        }
    }
}

struct CanonicalMap<'a>(&'a Map<String, Value>);

impl Serialize for CanonicalMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        serializer.collect_map(entries.into_iter().map(|(k, v)| (k, Canonical(v))))
    }
}

//! JSON Schema checking and validation.
//!
//! Task schemas are stored as strings. Before one is used it must parse as JSON,
//! pass draft 2020-12 meta-validation, and describe an object with `properties`.
//! Top-level array or scalar schemas are legal JSON Schema but are rejected here:
//! a structured task always exchanges a JSON object.

use serde_json::Value;

use crate::error::{Error, Result};

/// Parse a schema string and check that it is a usable task schema.
///
/// Fails with [`Error::InvalidSchema`] when the text is not JSON, fails
/// draft 2020-12 meta-validation, is not an object, or lacks
/// `"type": "object"` / `"properties"`.
pub fn parse_and_check(schema_text: &str) -> Result<Value> {
    let parsed: Value = serde_json::from_str(schema_text)
        .map_err(|e| Error::InvalidSchema(format!("invalid JSON: {schema_text}\n{e}")))?;

    // Building a validator runs meta-validation against the draft's meta-schema.
    jsonschema::draft202012::new(&parsed)
        .map_err(|e| Error::InvalidSchema(format!("{schema_text}\n{e}")))?;

    let Some(object) = parsed.as_object() else {
        return Err(Error::InvalidSchema(format!(
            "JSON schema must be an object, got: {schema_text}"
        )));
    };

    let is_object_type = object.get("type").and_then(Value::as_str) == Some("object");
    if !is_object_type || !object.contains_key("properties") {
        return Err(Error::InvalidSchema(format!(
            "JSON schema must be an object with properties: {schema_text}"
        )));
    }

    Ok(parsed)
}

/// Check a schema string, returning it unchanged when valid.
pub fn check_schema_str(schema_text: &str) -> Result<&str> {
    parse_and_check(schema_text)?;
    Ok(schema_text)
}

/// Validate `instance` against the schema in `schema_text`.
///
/// The schema is re-checked on every call. A mismatch becomes
/// [`Error::SchemaViolation`] carrying the validator's own message.
pub fn validate_instance(instance: &Value, schema_text: &str) -> Result<()> {
    let schema = parse_and_check(schema_text)?;
    let validator = jsonschema::draft202012::new(&schema)
        .map_err(|e| Error::InvalidSchema(format!("{schema_text}\n{e}")))?;

    validator.validate(instance).map_err(|e| {
        Error::SchemaViolation(format!(
            "This task requires a specific output schema. While the model produced JSON, \
             that JSON didn't meet the schema. Try a model with stronger structured output \
             support, or adjust the task instructions so the model follows the schema. \
             The error from the schema check was: {e}"
        ))
    })
}

/// Convert a free-form label into a JSON property key.
///
/// Lowercases, turns spaces into underscores and drops anything outside `[a-z0-9_]`.
pub fn string_to_json_key(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

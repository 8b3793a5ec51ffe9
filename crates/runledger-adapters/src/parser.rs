//! Parsing model text into structured output.

use serde_json::{Map, Value};

use runledger_core::{Error, Result};

/// Parse a model reply as a JSON object.
///
/// Surrounding whitespace and a Markdown code fence (```` ```json ````, any
/// other info string, or bare ```` ``` ````) are stripped first. Text that is not JSON is a
/// [`Error::Dispatch`]; JSON that is not an object is an
/// [`Error::UnexpectedOutputShape`].
pub fn parse_json_string(text: &str) -> Result<Map<String, Value>> {
    let body = strip_code_fence(text.trim());

    let value: Value = serde_json::from_str(body).map_err(|e| {
        Error::Dispatch(format!("model response is not valid JSON: {e}\n{text}"))
    })?;

    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::UnexpectedOutputShape(format!(
            "structured response is not a JSON object: {other}"
        ))),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // The info string runs to the end of the opening line.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

//! Prompt building for chat-style backends.

use std::sync::Arc;

use runledger_core::datamodel::{Task, TaskIo};

/// Turns a task and its input into the system prompt and user message.
pub trait PromptBuilder: Send + Sync {
    /// System prompt for every run of the task.
    fn build_prompt(&self, adapter_instructions: Option<&str>) -> String;

    /// User message carrying one input.
    fn build_user_message(&self, input: &TaskIo) -> String {
        match input {
            TaskIo::Structured(fields) => {
                let pretty = serde_json::to_string_pretty(fields)
                    .unwrap_or_else(|_| input.to_string());
                format!("The input is:\n{pretty}")
            }
            TaskIo::Plaintext(text) => format!("The input is:\n{text}"),
        }
    }

    /// Name recorded in run provenance.
    fn prompt_builder_name(&self) -> &'static str;
}

/// Task instruction, the output schema when there is one, then any
/// adapter-specific instructions.
#[derive(Clone, Debug)]
pub struct SimplePromptBuilder {
    task: Arc<Task>,
}

impl SimplePromptBuilder {
    pub fn new(task: Arc<Task>) -> Self {
        Self { task }
    }
}

impl PromptBuilder for SimplePromptBuilder {
    fn build_prompt(&self, adapter_instructions: Option<&str>) -> String {
        let mut prompt = self.task.instruction.trim().to_string();

        if let Some(schema) = &self.task.output_json_schema {
            prompt.push_str("\n\nYour response must be a JSON object conforming to this schema:\n");
            prompt.push_str(schema);
        }

        if let Some(extra) = adapter_instructions.map(str::trim).filter(|s| !s.is_empty()) {
            prompt.push_str("\n\n");
            prompt.push_str(extra);
        }

        prompt
    }

    fn prompt_builder_name(&self) -> &'static str {
        "simple_prompt_builder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r#"{"type":"object","properties":{"x":{"type":"integer"}}}"#;

    #[test]
    fn test_plaintext_prompt_is_instruction() {
        let builder = SimplePromptBuilder::new(Arc::new(Task::new("t", "  Summarize the text. ")));
        assert_eq!(builder.build_prompt(None), "Summarize the text.");
        assert_eq!(builder.build_prompt(Some("   ")), "Summarize the text.");
        assert_eq!(builder.prompt_builder_name(), "simple_prompt_builder");
    }

    #[test]
    fn test_structured_prompt_includes_schema_and_extras() {
        let task = Task::new("t", "Extract x.").with_output_schema(SCHEMA).unwrap();
        let builder = SimplePromptBuilder::new(Arc::new(task));

        let prompt = builder.build_prompt(Some("Reply with JSON only."));
        assert!(prompt.starts_with("Extract x."));
        assert!(prompt.contains(SCHEMA));
        assert!(prompt.ends_with("Reply with JSON only."));
    }

    #[test]
    fn test_user_message() {
        let builder = SimplePromptBuilder::new(Arc::new(Task::new("t", "i")));
        assert_eq!(
            builder.build_user_message(&TaskIo::from("hello")),
            "The input is:\nhello"
        );

        let input = TaskIo::try_from(json!({"x": 1})).unwrap();
        assert_eq!(
            builder.build_user_message(&input),
            "The input is:\n{\n  \"x\": 1\n}"
        );
    }
}

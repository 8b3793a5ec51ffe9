//! Dispatcher for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Every concrete provider is reached this way; only the connection settings
//! from [`ResolvedProvider`] differ.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use runledger_core::datamodel::{Task, TaskIo};
use runledger_core::{Error, Result};

use crate::base::{AdapterInfo, Dispatcher};
use crate::parser::parse_json_string;
use crate::prompt::PromptBuilder;
use crate::provider::{ModelProviderName, ResolvedProvider, StructuredOutputMode};

/// Name recorded in run provenance.
pub const ADAPTER_NAME: &str = "runledger_openai_compatible_adapter";

/// Name of the structured response format and of the fallback tool call.
const TASK_RESPONSE: &str = "task_response";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Request fields that ask for structured output. All empty for plaintext tasks.
#[derive(Debug, Default, Serialize)]
struct StructuredOutputParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(flatten)]
    structured: StructuredOutputParams,
    #[serde(flatten)]
    extra_body: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

// ─────────────────────────────────────────────
// OpenAiCompatibleDispatcher
// ─────────────────────────────────────────────

/// Sends task inputs to a chat completions endpoint.
pub struct OpenAiCompatibleDispatcher {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    connection: ResolvedProvider,
    /// Model and provider the caller asked for, before virtual providers were resolved.
    requested_model: String,
    requested_provider: ModelProviderName,
    extra_headers: HeaderMap,
    task: Arc<Task>,
    output_schema: Option<Value>,
    prompt_builder: Box<dyn PromptBuilder>,
}

impl std::fmt::Debug for OpenAiCompatibleDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleDispatcher")
            .field("base_url", &self.connection.base_url)
            .field("model", &self.connection.model_name)
            .field("provider", &self.connection.provider)
            .finish()
    }
}

impl OpenAiCompatibleDispatcher {
    pub fn new(
        connection: ResolvedProvider,
        requested_model: impl Into<String>,
        requested_provider: ModelProviderName,
        task: Arc<Task>,
        prompt_builder: Box<dyn PromptBuilder>,
    ) -> Result<Self> {
        let mut extra_headers = HeaderMap::new();
        for (key, value) in &connection.default_headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(val)) => {
                    extra_headers.insert(name, val);
                }
                _ => warn!("Invalid header: {}={}", key, value),
            }
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Dispatch(format!("failed to build HTTP client: {e}")))?;

        let output_schema = task.output_schema()?;

        Ok(Self {
            client,
            connection,
            requested_model: requested_model.into(),
            requested_provider,
            extra_headers,
            task,
            output_schema,
            prompt_builder,
        })
    }

    fn completions_url(&self) -> String {
        let base = self.connection.base_url.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    fn uses_tool_call(&self) -> bool {
        matches!(
            self.connection.structured_output_mode,
            StructuredOutputMode::FunctionCalling | StructuredOutputMode::Default
        )
    }

    fn structured_output_params(&self) -> StructuredOutputParams {
        let Some(schema) = &self.output_schema else {
            return StructuredOutputParams::default();
        };

        match self.connection.structured_output_mode {
            StructuredOutputMode::JsonSchema => StructuredOutputParams {
                response_format: Some(json!({
                    "type": "json_schema",
                    "json_schema": { "name": TASK_RESPONSE, "schema": schema }
                })),
                ..Default::default()
            },
            StructuredOutputMode::JsonMode | StructuredOutputMode::JsonInstructionAndObject => {
                StructuredOutputParams {
                    response_format: Some(json!({ "type": "json_object" })),
                    ..Default::default()
                }
            }
            StructuredOutputMode::JsonInstructions => StructuredOutputParams::default(),
            StructuredOutputMode::FunctionCalling | StructuredOutputMode::Default => {
                // Strict tool schemas must forbid extra keys.
                let mut parameters = schema.clone();
                if let Value::Object(fields) = &mut parameters {
                    fields.insert("additionalProperties".into(), Value::Bool(false));
                }
                StructuredOutputParams {
                    tools: Some(json!([{
                        "type": "function",
                        "function": {
                            "name": TASK_RESPONSE,
                            "parameters": parameters,
                            "strict": true
                        }
                    }])),
                    tool_choice: Some(json!({
                        "type": "function",
                        "function": { "name": TASK_RESPONSE }
                    })),
                    ..Default::default()
                }
            }
        }
    }

    /// First choice's text. When that is empty, the arguments of a
    /// `task_response` tool call are used instead if one exists.
    fn extract_text(response: ChatCompletionResponse) -> Result<String> {
        if let Some(err) = response.error {
            return Err(Error::Dispatch(format!("API returned an error: {err}")));
        }

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| Error::Dispatch("No message content returned in the response".into()))?;

        let content_empty = message.content.as_deref().map_or(true, str::is_empty);
        let tool_arguments = if content_empty {
            message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .find(|call| call.function.name == TASK_RESPONSE)
                .map(|call| call.function.arguments)
        } else {
            None
        };

        tool_arguments
            .or(message.content)
            .ok_or_else(|| Error::Dispatch("Response has no content and no task_response tool call".into()))
    }
}

#[async_trait]
impl Dispatcher for OpenAiCompatibleDispatcher {
    async fn run(&self, input: &TaskIo) -> Result<TaskIo> {
        let instructions = self.adapter_specific_instructions();
        let system_prompt = self.prompt_builder.build_prompt(instructions.as_deref());
        let user_message = self.prompt_builder.build_user_message(input);
        let provider = self.connection.provider.as_str();

        debug!(
            provider,
            model = %self.connection.model_name,
            task = %self.task.meta.id,
            structured = self.output_schema.is_some(),
            mode = ?self.connection.structured_output_mode,
            "Calling chat completions"
        );

        let request_body = ChatCompletionRequest {
            model: &self.connection.model_name,
            messages: vec![
                ChatMessage { role: "system", content: &system_prompt },
                ChatMessage { role: "user", content: &user_message },
            ],
            structured: self.structured_output_params(),
            extra_body: &self.connection.extra_body,
        };

        let mut request = self
            .client
            .post(self.completions_url())
            .headers(self.extra_headers.clone())
            .json(&request_body);
        if let Some(key) = &self.connection.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider, error = %e, "HTTP request failed");
            Error::Dispatch(format!("Error calling model: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(provider, status = %status, body = %error_text, "API error");
            return Err(Error::Dispatch(format!(
                "Error calling model: {}: {}",
                status, error_text
            )));
        }

        let chat_resp = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(provider, error = %e, "Failed to parse model response");
            Error::Dispatch(format!("Error parsing model response: {e}"))
        })?;

        let text = Self::extract_text(chat_resp)?;
        debug!(provider, chars = text.len(), "Model response received");

        if self.output_schema.is_some() {
            Ok(TaskIo::Structured(parse_json_string(&text)?))
        } else {
            Ok(TaskIo::Plaintext(text))
        }
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            adapter_name: ADAPTER_NAME.to_string(),
            model_name: self.requested_model.clone(),
            model_provider: self.requested_provider.as_str().to_string(),
            prompt_builder_name: self.prompt_builder.prompt_builder_name().to_string(),
        }
    }

    fn adapter_specific_instructions(&self) -> Option<String> {
        if self.output_schema.is_none() {
            return None;
        }
        let instructions = if self.uses_tool_call() {
            "Always respond with a tool call. Never respond with a human readable message."
        } else {
            "Always respond with a single JSON object matching the schema, with no surrounding text."
        };
        Some(instructions.to_string())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

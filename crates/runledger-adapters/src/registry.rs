//! Adapter registry: builds a [`TaskAdapter`] for a task, model and provider.

use std::sync::Arc;

use tracing::debug;

use runledger_core::config::Config;
use runledger_core::datamodel::Task;
use runledger_core::{Error, Result};

use crate::base::{Dispatcher, TaskAdapter};
use crate::openai_compatible::OpenAiCompatibleDispatcher;
use crate::prompt::SimplePromptBuilder;
use crate::provider::{core_provider, provider_config, ModelProviderName};

/// Resolve `provider` (following virtual providers) and build an adapter.
///
/// Fails with [`Error::ProviderResolution`] when the provider cannot be mapped
/// to a concrete backend, including when resolution lands on another virtual
/// provider.
pub fn adapter_for_task(
    task: Arc<Task>,
    model_id: &str,
    provider: ModelProviderName,
    config: Arc<Config>,
) -> Result<TaskAdapter> {
    let core = core_provider(model_id, provider, &config)?;

    let dispatcher: Arc<dyn Dispatcher> = match core.provider {
        ModelProviderName::OpenAi
        | ModelProviderName::Groq
        | ModelProviderName::AmazonBedrock
        | ModelProviderName::Ollama
        | ModelProviderName::OpenRouter
        | ModelProviderName::FireworksAi
        | ModelProviderName::Anthropic
        | ModelProviderName::GeminiApi
        | ModelProviderName::AzureOpenAi
        | ModelProviderName::OpenAiCompatible => {
            let connection = provider_config(&core, &config)?;
            debug!(
                provider = %connection.provider,
                model = %connection.model_name,
                base_url = %connection.base_url,
                "Creating adapter"
            );
            Arc::new(OpenAiCompatibleDispatcher::new(
                connection,
                model_id,
                provider,
                task.clone(),
                Box::new(SimplePromptBuilder::new(task.clone())),
            )?)
        }
        ModelProviderName::KilnFineTune | ModelProviderName::KilnCustomRegistry => {
            return Err(Error::ProviderResolution(format!(
                "{} resolved to virtual provider {}; it must resolve to a concrete provider",
                provider, core.provider
            )));
        }
    };

    TaskAdapter::new(task, config, dispatcher)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use runledger_core::config::FineTuneModel;
    use runledger_core::datamodel::TaskIo;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_adapter_for_concrete_provider() {
        let task = Arc::new(Task::new("t", "i"));
        let adapter = adapter_for_task(
            task,
            "llama-3.3-70b",
            ModelProviderName::Groq,
            Arc::new(Config::default()),
        )
        .unwrap();

        let info = adapter.adapter_info();
        assert_eq!(info.adapter_name, "runledger_openai_compatible_adapter");
        assert_eq!(info.model_name, "llama-3.3-70b");
        assert_eq!(info.model_provider, "groq");
        assert!(!adapter.has_structured_output());
    }

    #[test]
    fn test_virtual_after_resolution_is_fatal() {
        let err = adapter_for_task(
            Arc::new(Task::new("t", "i")),
            "kiln_custom_registry::m",
            ModelProviderName::KilnCustomRegistry,
            Arc::new(Config::default()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ProviderResolution(_)));
    }

    #[test]
    fn test_unknown_fine_tune_is_resolution_error() {
        let err = adapter_for_task(
            Arc::new(Task::new("t", "i")),
            "missing",
            ModelProviderName::KilnFineTune,
            Arc::new(Config::default()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ProviderResolution(_)));
    }

    #[tokio::test]
    async fn test_fine_tune_end_to_end() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "accounts/me/models/ft1",
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "{\"x\": 9}" } }]
            })))
            .mount(&mock_server)
            .await;

        let mut config = Config::default();
        config.autosave_runs = false;
        config.providers.fireworks_ai.api_key = "fw".into();
        config.providers.fireworks_ai.api_base = Some(mock_server.uri());
        config.fine_tunes.insert(
            "ft1".into(),
            FineTuneModel {
                provider: "fireworks_ai".into(),
                model_id: "accounts/me/models/ft1".into(),
            },
        );

        let task = Task::new("t", "Extract x.")
            .with_output_schema(r#"{"type":"object","properties":{"x":{"type":"integer"}}}"#)
            .unwrap();
        let adapter = adapter_for_task(
            Arc::new(task),
            "ft1",
            ModelProviderName::KilnFineTune,
            Arc::new(config),
        )
        .unwrap();

        let result = adapter
            .invoke_returning_run(&TaskIo::from("x is nine"), None)
            .await
            .unwrap();
        assert_eq!(result.output, TaskIo::try_from(json!({"x": 9})).unwrap());
        let source = &result.run.output.source;
        assert_eq!(source.property("model_name"), Some("ft1"));
        assert_eq!(source.property("model_provider"), Some("kiln_fine_tune"));
    }
}

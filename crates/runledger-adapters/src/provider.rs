//! Provider registry: provider identifiers, static specs, and resolution of
//! a `(model id, provider)` pair to a concrete connection.
//!
//! Two providers are *virtual*: `kiln_fine_tune` and `kiln_custom_registry`.
//! They only name where the real model lives and must be resolved through
//! [`core_provider`] before anything can be dispatched.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use runledger_core::config::Config;
use runledger_core::{Error, Result};

/// Separator inside composite model ids (`"<provider>::<model>"`).
const ID_SEPARATOR: &str = "::";

/// Azure OpenAI API version sent with every request.
pub const AZURE_API_VERSION: &str = "2025-02-01-preview";

/// Attribution headers sent to OpenRouter.
const OPENROUTER_HEADERS: &[(&str, &str)] = &[
    ("HTTP-Referer", "https://github.com/runledger/runledger"),
    ("X-Title", "Runledger"),
];

// ─────────────────────────────────────────────
// ModelProviderName
// ─────────────────────────────────────────────

/// Every provider identifier a model can be requested with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelProviderName {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "groq")]
    Groq,
    #[serde(rename = "amazon_bedrock")]
    AmazonBedrock,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "fireworks_ai")]
    FireworksAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini_api")]
    GeminiApi,
    #[serde(rename = "azure_openai")]
    AzureOpenAi,
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    #[serde(rename = "kiln_fine_tune")]
    KilnFineTune,
    #[serde(rename = "kiln_custom_registry")]
    KilnCustomRegistry,
}

impl ModelProviderName {
    pub const ALL: &'static [ModelProviderName] = &[
        ModelProviderName::OpenAi,
        ModelProviderName::Groq,
        ModelProviderName::AmazonBedrock,
        ModelProviderName::Ollama,
        ModelProviderName::OpenRouter,
        ModelProviderName::FireworksAi,
        ModelProviderName::Anthropic,
        ModelProviderName::GeminiApi,
        ModelProviderName::AzureOpenAi,
        ModelProviderName::OpenAiCompatible,
        ModelProviderName::KilnFineTune,
        ModelProviderName::KilnCustomRegistry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProviderName::OpenAi => "openai",
            ModelProviderName::Groq => "groq",
            ModelProviderName::AmazonBedrock => "amazon_bedrock",
            ModelProviderName::Ollama => "ollama",
            ModelProviderName::OpenRouter => "openrouter",
            ModelProviderName::FireworksAi => "fireworks_ai",
            ModelProviderName::Anthropic => "anthropic",
            ModelProviderName::GeminiApi => "gemini_api",
            ModelProviderName::AzureOpenAi => "azure_openai",
            ModelProviderName::OpenAiCompatible => "openai_compatible",
            ModelProviderName::KilnFineTune => "kiln_fine_tune",
            ModelProviderName::KilnCustomRegistry => "kiln_custom_registry",
        }
    }

    /// Virtual providers only point at another provider.
    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            ModelProviderName::KilnFineTune | ModelProviderName::KilnCustomRegistry
        )
    }
}

impl fmt::Display for ModelProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProviderName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ModelProviderName::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::ProviderResolution(format!("Unknown provider: {s}")))
    }
}

// ─────────────────────────────────────────────
// StructuredOutputMode
// ─────────────────────────────────────────────

/// How a structured task asks the backend for JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredOutputMode {
    /// Treated as `FunctionCalling`, the most widely supported mode.
    #[default]
    Default,
    /// `response_format: json_schema` with the task's output schema.
    JsonSchema,
    /// A forced `task_response` tool call whose parameters are the output schema.
    FunctionCalling,
    /// `response_format: json_object`.
    JsonMode,
    /// Nothing in the request; the prompt alone asks for JSON.
    JsonInstructions,
    /// Prompt instructions plus `response_format: json_object`.
    JsonInstructionAndObject,
}

// ─────────────────────────────────────────────
// ProviderSpec: static metadata for one concrete provider
// ─────────────────────────────────────────────

/// Static description of a concrete provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    pub provider: ModelProviderName,
    /// Human-readable name for logs and status output.
    pub display_name: &'static str,
    /// Environment variable that overrides the API key.
    pub env_key: &'static str,
    /// Default API base. `None` means the base must come from config.
    pub default_api_base: Option<&'static str>,
    /// How structured output is requested from this provider.
    pub structured_output_mode: StructuredOutputMode,
    /// Whether requests are sent without an API key.
    pub is_local: bool,
}

/// Every concrete provider with a fixed config slot.
///
/// `openai_compatible` is absent: its endpoints are user-registered entries.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        provider: ModelProviderName::OpenAi,
        display_name: "OpenAI",
        env_key: "RUNLEDGER_PROVIDERS__OPENAI__API_KEY",
        default_api_base: Some("https://api.openai.com/v1"),
        structured_output_mode: StructuredOutputMode::JsonSchema,
        is_local: false,
    },
    ProviderSpec {
        provider: ModelProviderName::OpenRouter,
        display_name: "OpenRouter",
        env_key: "RUNLEDGER_PROVIDERS__OPENROUTER__API_KEY",
        default_api_base: Some("https://openrouter.ai/api/v1"),
        structured_output_mode: StructuredOutputMode::FunctionCalling,
        is_local: false,
    },
    ProviderSpec {
        provider: ModelProviderName::Groq,
        display_name: "Groq",
        env_key: "RUNLEDGER_PROVIDERS__GROQ__API_KEY",
        default_api_base: Some("https://api.groq.com/openai/v1"),
        structured_output_mode: StructuredOutputMode::Default,
        is_local: false,
    },
    ProviderSpec {
        provider: ModelProviderName::Ollama,
        display_name: "Ollama",
        env_key: "RUNLEDGER_PROVIDERS__OLLAMA__API_BASE",
        default_api_base: Some("http://localhost:11434"),
        structured_output_mode: StructuredOutputMode::JsonSchema,
        is_local: true,
    },
    ProviderSpec {
        provider: ModelProviderName::FireworksAi,
        display_name: "Fireworks AI",
        env_key: "RUNLEDGER_PROVIDERS__FIREWORKS_AI__API_KEY",
        default_api_base: Some("https://api.fireworks.ai/inference/v1"),
        structured_output_mode: StructuredOutputMode::JsonMode,
        is_local: false,
    },
    ProviderSpec {
        provider: ModelProviderName::Anthropic,
        display_name: "Anthropic",
        env_key: "RUNLEDGER_PROVIDERS__ANTHROPIC__API_KEY",
        default_api_base: Some("https://api.anthropic.com/v1"),
        structured_output_mode: StructuredOutputMode::FunctionCalling,
        is_local: false,
    },
    ProviderSpec {
        provider: ModelProviderName::GeminiApi,
        display_name: "Gemini API",
        env_key: "RUNLEDGER_PROVIDERS__GEMINI_API__API_KEY",
        default_api_base: Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        structured_output_mode: StructuredOutputMode::JsonSchema,
        is_local: false,
    },
    ProviderSpec {
        provider: ModelProviderName::AzureOpenAi,
        display_name: "Azure OpenAI",
        env_key: "RUNLEDGER_PROVIDERS__AZURE_OPENAI__API_KEY",
        default_api_base: None,
        structured_output_mode: StructuredOutputMode::JsonSchema,
        is_local: false,
    },
    ProviderSpec {
        provider: ModelProviderName::AmazonBedrock,
        display_name: "Amazon Bedrock",
        env_key: "RUNLEDGER_PROVIDERS__AMAZON_BEDROCK__ACCESS_KEY",
        default_api_base: None,
        structured_output_mode: StructuredOutputMode::JsonInstructions,
        is_local: false,
    },
];

/// Look up a provider spec.
pub fn find_spec(provider: ModelProviderName) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|s| s.provider == provider)
}

// ─────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────

/// A model on a provider, after virtual providers have been followed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreModel {
    pub provider: ModelProviderName,
    pub model_id: String,
}

/// Everything needed to talk to a concrete backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedProvider {
    /// The concrete provider requests go to.
    pub provider: ModelProviderName,
    /// Model name sent in the request body.
    pub model_name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_headers: HashMap<String, String>,
    /// Provider-specific fields merged into the request body.
    pub extra_body: Map<String, Value>,
    pub structured_output_mode: StructuredOutputMode,
}

/// Follow a virtual provider to the concrete one.
///
/// Concrete providers come back unchanged. The result may still be virtual if
/// an id points at another virtual provider; callers must treat that as fatal.
pub fn core_provider(model_id: &str, provider: ModelProviderName, config: &Config) -> Result<CoreModel> {
    match provider {
        ModelProviderName::KilnCustomRegistry => {
            let (provider_id, model) = split_composite_id(model_id)?;
            Ok(CoreModel {
                provider: provider_id.parse()?,
                model_id: model.to_string(),
            })
        }
        ModelProviderName::KilnFineTune => {
            let fine_tune = config.fine_tunes.get(model_id).ok_or_else(|| {
                Error::ProviderResolution(format!("Fine tune {model_id} not found"))
            })?;
            if fine_tune.model_id.is_empty() {
                return Err(Error::ProviderResolution(format!(
                    "Fine tune {model_id} not completed. Refresh its status to get the model id."
                )));
            }
            debug!(fine_tune = model_id, provider = %fine_tune.provider, "Resolved fine-tune");
            Ok(CoreModel {
                provider: fine_tune.provider.parse()?,
                model_id: fine_tune.model_id.clone(),
            })
        }
        concrete => Ok(CoreModel {
            provider: concrete,
            model_id: model_id.to_string(),
        }),
    }
}

/// Build connection settings for a concrete model.
pub fn provider_config(core: &CoreModel, config: &Config) -> Result<ResolvedProvider> {
    let providers = &config.providers;
    let mut resolved = ResolvedProvider {
        provider: core.provider,
        model_name: core.model_id.clone(),
        base_url: String::new(),
        api_key: None,
        default_headers: HashMap::new(),
        extra_body: Map::new(),
        structured_output_mode: find_spec(core.provider)
            .map(|s| s.structured_output_mode)
            .unwrap_or_default(),
    };

    match core.provider {
        ModelProviderName::OpenAi
        | ModelProviderName::Groq
        | ModelProviderName::FireworksAi
        | ModelProviderName::Anthropic
        | ModelProviderName::GeminiApi
        | ModelProviderName::OpenRouter => {
            let slot = providers.get_by_name(core.provider.as_str()).ok_or_else(|| {
                Error::ProviderResolution(format!("No config slot for {}", core.provider))
            })?;
            resolved.base_url = base_url_for(core.provider, slot.api_base.as_deref())?;
            resolved.api_key = non_empty(&slot.api_key);
            if core.provider == ModelProviderName::OpenRouter {
                for (name, value) in OPENROUTER_HEADERS {
                    resolved.default_headers.insert(name.to_string(), value.to_string());
                }
            }
            if let Some(headers) = &slot.extra_headers {
                resolved.default_headers.extend(headers.clone());
            }
        }
        ModelProviderName::Ollama => {
            let base = base_url_for(core.provider, providers.ollama.api_base.as_deref())?;
            resolved.base_url = format!("{}/v1", base.trim_end_matches('/'));
            resolved.api_key = non_empty(&providers.ollama.api_key);
        }
        ModelProviderName::AzureOpenAi => {
            let azure = &providers.azure_openai;
            resolved.base_url = azure.api_base.clone().filter(|b| !b.is_empty()).ok_or_else(|| {
                Error::ProviderResolution("Azure OpenAI endpoint is not configured".into())
            })?;
            resolved.api_key = non_empty(&azure.api_key);
            resolved
                .extra_body
                .insert("api_version".into(), Value::String(AZURE_API_VERSION.into()));
        }
        ModelProviderName::AmazonBedrock => {
            let bedrock = &providers.amazon_bedrock;
            resolved.base_url = bedrock.api_base.clone().unwrap_or_else(|| {
                format!("https://bedrock-runtime.{}.amazonaws.com/openai/v1", bedrock.region)
            });
            resolved.extra_body.insert(
                "aws_access_key_id".into(),
                Value::String(bedrock.access_key.clone()),
            );
            resolved.extra_body.insert(
                "aws_secret_access_key".into(),
                Value::String(bedrock.secret_key.clone()),
            );
            resolved
                .extra_body
                .insert("aws_region_name".into(), Value::String(bedrock.region.clone()));
        }
        ModelProviderName::OpenAiCompatible => {
            let (entry_name, model) = split_composite_id(&core.model_id)?;
            let entry = config.openai_compatible_provider(entry_name).ok_or_else(|| {
                Error::ProviderResolution(format!(
                    "OpenAI compatible provider {entry_name} not found"
                ))
            })?;
            if entry.base_url.is_empty() {
                return Err(Error::ProviderResolution(format!(
                    "OpenAI compatible provider {entry_name} has no base URL"
                )));
            }
            resolved.base_url = entry.base_url.clone();
            resolved.api_key = entry.api_key.as_deref().and_then(non_empty);
            resolved.model_name = model.to_string();
        }
        ModelProviderName::KilnFineTune | ModelProviderName::KilnCustomRegistry => {
            return Err(Error::ProviderResolution(format!(
                "Virtual provider {} should have been resolved to a concrete provider",
                core.provider
            )));
        }
    }

    let keyless = find_spec(core.provider).map_or(true, |s| s.is_local)
        || core.provider == ModelProviderName::AmazonBedrock;
    if resolved.api_key.is_none() && !keyless {
        warn!(provider = %core.provider, "No API key configured");
    }

    Ok(resolved)
}

/// Resolve `(model id, provider)` all the way to connection settings.
pub fn resolve(model_id: &str, provider: ModelProviderName, config: &Config) -> Result<ResolvedProvider> {
    let core = core_provider(model_id, provider, config)?;
    provider_config(&core, config)
}

fn base_url_for(provider: ModelProviderName, configured: Option<&str>) -> Result<String> {
    configured
        .filter(|b| !b.is_empty())
        .map(String::from)
        .or_else(|| find_spec(provider).and_then(|s| s.default_api_base).map(String::from))
        .ok_or_else(|| Error::ProviderResolution(format!("No API base for {provider}")))
}

fn split_composite_id(model_id: &str) -> Result<(&str, &str)> {
    match model_id.split_once(ID_SEPARATOR) {
        Some((head, tail)) if !head.is_empty() && !tail.is_empty() => Ok((head, tail)),
        _ => Err(Error::ProviderResolution(format!(
            "Invalid model id {model_id:?}, expected \"<provider>::<model>\""
        ))),
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

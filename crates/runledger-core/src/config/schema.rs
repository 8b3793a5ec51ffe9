//! Configuration schema.
//!
//! Hierarchy: `Config` → `ProvidersConfig` (one `ProviderConfig` per backend),
//! `openai_compatible_providers`, `fine_tunes`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded once at startup from `~/.runledger/config.json`
/// plus env vars, then shared read-only (usually as `Arc<Config>`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Identity stamped on human-sourced inputs.
    pub user_id: String,
    /// Persist every new run of a task that has a path.
    pub autosave_runs: bool,
    pub providers: ProvidersConfig,
    /// User-registered OpenAI-compatible endpoints, addressed as `"<name>::<model>"`.
    pub openai_compatible_providers: Vec<OpenAiCompatibleProvider>,
    /// Fine-tuned models keyed by fine-tune id, used to resolve the
    /// `kiln_fine_tune` virtual provider.
    pub fine_tunes: HashMap<String, FineTuneModel>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: utils::system_user(),
            autosave_runs: true,
            providers: ProvidersConfig::default(),
            openai_compatible_providers: Vec::new(),
            fine_tunes: HashMap::new(),
        }
    }
}

impl Config {
    /// Find a registered OpenAI-compatible endpoint by name.
    pub fn openai_compatible_provider(&self, name: &str) -> Option<&OpenAiCompatibleProvider> {
        self.openai_compatible_providers.iter().find(|p| p.name == name)
    }
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Credentials and endpoint for a single LLM provider.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    /// Custom API base URL (overrides the provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Amazon Bedrock credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BedrockConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            region: "us-west-2".to_string(),
            api_base: None,
        }
    }
}

impl BedrockConfig {
    pub fn is_configured(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

/// All provider configurations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub groq: ProviderConfig,
    /// Ollama needs no key; only `api_base` is meaningful.
    #[serde(default)]
    pub ollama: ProviderConfig,
    #[serde(default)]
    pub fireworks_ai: ProviderConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub gemini_api: ProviderConfig,
    /// Azure OpenAI: `api_base` is the resource endpoint.
    #[serde(default)]
    pub azure_openai: ProviderConfig,
    #[serde(default)]
    pub amazon_bedrock: BedrockConfig,
}

impl ProvidersConfig {
    /// Get a key-based provider config by name (e.g. `"openai"`).
    ///
    /// Bedrock is not key-based and is not returned here.
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "openai" => Some(&self.openai),
            "openrouter" => Some(&self.openrouter),
            "groq" => Some(&self.groq),
            "ollama" => Some(&self.ollama),
            "fireworks_ai" => Some(&self.fireworks_ai),
            "anthropic" => Some(&self.anthropic),
            "gemini_api" => Some(&self.gemini_api),
            "azure_openai" => Some(&self.azure_openai),
            _ => None,
        }
    }

    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut ProviderConfig> {
        match name {
            "openai" => Some(&mut self.openai),
            "openrouter" => Some(&mut self.openrouter),
            "groq" => Some(&mut self.groq),
            "ollama" => Some(&mut self.ollama),
            "fireworks_ai" => Some(&mut self.fireworks_ai),
            "anthropic" => Some(&mut self.anthropic),
            "gemini_api" => Some(&mut self.gemini_api),
            "azure_openai" => Some(&mut self.azure_openai),
            _ => None,
        }
    }
}

/// A user-registered OpenAI-compatible endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenAiCompatibleProvider {
    pub name: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// A deployed fine-tune: the concrete provider it runs on and its model id there.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FineTuneModel {
    /// Provider identifier, e.g. `"fireworks_ai"` or `"openai"`.
    pub provider: String,
    /// Model id on that provider. Empty until the fine-tune is deployed.
    pub model_id: String,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.autosave_runs);
        assert!(!config.user_id.is_empty());
        assert!(!config.providers.openai.is_configured());
        assert_eq!(config.providers.amazon_bedrock.region, "us-west-2");
    }

    #[test]
    fn test_config_from_json_camel_case() {
        let json = serde_json::json!({
            "userId": "alice",
            "autosaveRuns": false,
            "providers": {
                "openai": { "apiKey": "sk-123" },
                "fireworksAi": { "apiKey": "fw-456" },
                "amazonBedrock": { "accessKey": "AK", "secretKey": "SK" }
            },
            "openaiCompatibleProviders": [
                { "name": "lab", "baseUrl": "http://lab:8000/v1" }
            ],
            "fineTunes": {
                "p1::t1::ft1": { "provider": "fireworks_ai", "modelId": "accounts/a/models/m" }
            }
        });

        let config: Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.user_id, "alice");
        assert!(!config.autosave_runs);
        assert!(config.providers.openai.is_configured());
        assert!(config.providers.fireworks_ai.is_configured());
        assert!(config.providers.amazon_bedrock.is_configured());
        assert_eq!(config.providers.amazon_bedrock.region, "us-west-2");
        assert_eq!(
            config.openai_compatible_provider("lab").unwrap().base_url,
            "http://lab:8000/v1"
        );
        assert!(config.openai_compatible_provider("other").is_none());
        assert_eq!(config.fine_tunes["p1::t1::ft1"].provider, "fireworks_ai");
    }

    #[test]
    fn test_config_json_uses_camel_case() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json.get("autosaveRuns").is_some());
        assert!(json["providers"].get("geminiApi").is_some());
        assert!(json.get("autosave_runs").is_none());
    }

    #[test]
    fn test_providers_get_by_name() {
        let mut providers = ProvidersConfig::default();
        providers.groq.api_key = "gsk".to_string();

        assert!(providers.get_by_name("groq").unwrap().is_configured());
        assert!(!providers.get_by_name("openai").unwrap().is_configured());
        assert!(providers.get_by_name("amazon_bedrock").is_none());
        assert!(providers.get_by_name("nonexistent").is_none());

        providers.get_by_name_mut("openai").unwrap().api_key = "sk".to_string();
        assert!(providers.openai.is_configured());
    }

    #[test]
    fn test_empty_json_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.autosave_runs);
        assert!(config.fine_tunes.is_empty());
    }
}

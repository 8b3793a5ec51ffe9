//! Config loader: reads `~/.runledger/config.json`, migrates legacy keys,
//! and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.runledger/config.json`
//! 3. Environment variables `RUNLEDGER_<FIELD>` / `RUNLEDGER_PROVIDERS__<NAME>__<FIELD>`

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Provider names that accept `RUNLEDGER_PROVIDERS__<NAME>__*` overrides.
const ENV_PROVIDERS: &[&str] = &[
    "openai",
    "openrouter",
    "groq",
    "ollama",
    "fireworks_ai",
    "anthropic",
    "gemini_api",
    "azure_openai",
];

/// Flat snake_case keys from older config files → (provider, field) in the nested layout.
const LEGACY_PROVIDER_KEYS: &[(&str, &str, &str)] = &[
    ("open_ai_api_key", "openai", "apiKey"),
    ("open_router_api_key", "openrouter", "apiKey"),
    ("groq_api_key", "groq", "apiKey"),
    ("ollama_base_url", "ollama", "apiBase"),
    ("fireworks_api_key", "fireworksAi", "apiKey"),
    ("anthropic_api_key", "anthropic", "apiKey"),
    ("gemini_api_key", "geminiApi", "apiKey"),
    ("azure_openai_api_key", "azureOpenai", "apiKey"),
    ("azure_openai_endpoint", "azureOpenai", "apiBase"),
    ("bedrock_access_key", "amazonBedrock", "accessKey"),
    ("bedrock_secret_key", "amazonBedrock", "secretKey"),
];

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from `path` (or the default path) + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    apply_env_overrides(load_config_from_path(&config_path))
}

/// Load config from a specific file path, without env overrides.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return Config::default();
        }
    };

    migrate_config(&mut raw);

    match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to deserialize config: {}", e);
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply legacy config migrations.
///
/// Older files are flat snake_case (`user_id`, `autosave_runs`, `open_ai_api_key`, ...).
/// Each legacy key is moved into the nested camelCase layout unless the new
/// location is already set.
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(root) = raw.as_object_mut() else {
        return;
    };

    for (legacy, current) in [("user_id", "userId"), ("autosave_runs", "autosaveRuns")] {
        if let Some(val) = root.remove(legacy) {
            if !root.contains_key(current) {
                root.insert(current.to_string(), val);
                debug!("Migrated {} → {}", legacy, current);
            }
        }
    }

    for (legacy, provider, field) in LEGACY_PROVIDER_KEYS {
        let Some(val) = root.remove(*legacy) else {
            continue;
        };
        if val.is_null() {
            continue;
        }

        let providers = root
            .entry("providers")
            .or_insert_with(|| serde_json::json!({}));
        let Some(providers) = providers.as_object_mut() else {
            continue;
        };
        let entry = providers
            .entry(provider.to_string())
            .or_insert_with(|| serde_json::json!({}));
        if let Some(entry) = entry.as_object_mut() {
            if !entry.contains_key(*field) {
                entry.insert(field.to_string(), val);
                debug!("Migrated {} → providers.{}.{}", legacy, provider, field);
            }
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Supported overrides:
/// - `RUNLEDGER_USER_ID` → `user_id`
/// - `RUNLEDGER_AUTOSAVE_RUNS` → `autosave_runs` (`true`/`1` enable)
/// - `RUNLEDGER_PROVIDERS__<NAME>__API_KEY` → `providers.<name>.api_key`
/// - `RUNLEDGER_PROVIDERS__<NAME>__API_BASE` → `providers.<name>.api_base`
/// - `RUNLEDGER_PROVIDERS__AMAZON_BEDROCK__ACCESS_KEY` / `__SECRET_KEY`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("RUNLEDGER_USER_ID") {
        config.user_id = val;
    }
    if let Ok(val) = std::env::var("RUNLEDGER_AUTOSAVE_RUNS") {
        config.autosave_runs = val == "true" || val == "1";
    }

    for name in ENV_PROVIDERS {
        let upper = name.to_uppercase();
        let Some(provider) = config.providers.get_by_name_mut(name) else {
            continue;
        };
        if let Ok(val) = std::env::var(format!("RUNLEDGER_PROVIDERS__{upper}__API_KEY")) {
            provider.api_key = val;
        }
        if let Ok(val) = std::env::var(format!("RUNLEDGER_PROVIDERS__{upper}__API_BASE")) {
            provider.api_base = Some(val);
        }
    }

    let bedrock = &mut config.providers.amazon_bedrock;
    if let Ok(val) = std::env::var("RUNLEDGER_PROVIDERS__AMAZON_BEDROCK__ACCESS_KEY") {
        bedrock.access_key = val;
    }
    if let Ok(val) = std::env::var("RUNLEDGER_PROVIDERS__AMAZON_BEDROCK__SECRET_KEY") {
        bedrock.secret_key = val;
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json"));
        assert!(config.autosave_runs);
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(r#"{
            "userId": "alice",
            "providers": { "openai": { "apiKey": "sk-123" } }
        }"#);

        let config = load_config_from_path(file.path());
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.providers.openai.api_key, "sk-123");
        assert!(config.autosave_runs);
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let file = write_temp_json("not valid json {{{");
        let config = load_config_from_path(file.path());
        assert!(config.autosave_runs);
        assert!(!config.providers.openai.is_configured());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.user_id = "bob".to_string();
        config.autosave_runs = false;
        config.providers.groq.api_key = "gsk-test".to_string();

        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_from_path(&path);
        assert_eq!(reloaded.user_id, "bob");
        assert!(!reloaded.autosave_runs);
        assert_eq!(reloaded.providers.groq.api_key, "gsk-test");
    }

    #[test]
    fn test_migrate_flat_legacy_keys() {
        let file = write_temp_json(r#"{
            "user_id": "legacy-user",
            "autosave_runs": false,
            "open_ai_api_key": "sk-legacy",
            "ollama_base_url": "http://gpu-box:11434",
            "azure_openai_endpoint": "https://res.openai.azure.com",
            "bedrock_access_key": "AK",
            "fireworks_api_key": null
        }"#);

        let config = load_config_from_path(file.path());
        assert_eq!(config.user_id, "legacy-user");
        assert!(!config.autosave_runs);
        assert_eq!(config.providers.openai.api_key, "sk-legacy");
        assert_eq!(
            config.providers.ollama.api_base.as_deref(),
            Some("http://gpu-box:11434")
        );
        assert_eq!(
            config.providers.azure_openai.api_base.as_deref(),
            Some("https://res.openai.azure.com")
        );
        assert_eq!(config.providers.amazon_bedrock.access_key, "AK");
        assert!(!config.providers.fireworks_ai.is_configured());
    }

    #[test]
    fn test_migrate_no_overwrite() {
        let file = write_temp_json(r#"{
            "open_ai_api_key": "sk-old",
            "providers": { "openai": { "apiKey": "sk-new" } }
        }"#);

        let config = load_config_from_path(file.path());
        assert_eq!(config.providers.openai.api_key, "sk-new");
    }

    #[test]
    fn test_env_override_user_and_autosave() {
        std::env::set_var("RUNLEDGER_USER_ID", "env-user");
        std::env::set_var("RUNLEDGER_AUTOSAVE_RUNS", "0");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.user_id, "env-user");
        assert!(!config.autosave_runs);
        std::env::remove_var("RUNLEDGER_USER_ID");
        std::env::remove_var("RUNLEDGER_AUTOSAVE_RUNS");
    }

    #[test]
    fn test_env_override_provider_key() {
        std::env::set_var("RUNLEDGER_PROVIDERS__FIREWORKS_AI__API_KEY", "fw-env");
        std::env::set_var("RUNLEDGER_PROVIDERS__FIREWORKS_AI__API_BASE", "http://fw.local/v1");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.providers.fireworks_ai.api_key, "fw-env");
        assert_eq!(
            config.providers.fireworks_ai.api_base.as_deref(),
            Some("http://fw.local/v1")
        );
        std::env::remove_var("RUNLEDGER_PROVIDERS__FIREWORKS_AI__API_KEY");
        std::env::remove_var("RUNLEDGER_PROVIDERS__FIREWORKS_AI__API_BASE");
    }

    #[test]
    fn test_saved_json_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        save_config(&Config::default(), Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(raw.get("autosaveRuns").is_some());
        assert!(raw.get("autosave_runs").is_none());
    }
}

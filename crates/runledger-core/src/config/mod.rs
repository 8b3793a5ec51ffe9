//! Configuration system: schema, loading, legacy migration and env var overrides.
//!
//! # Usage
//! ```no_run
//! use runledger_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Autosave: {}", cfg.autosave_runs);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config, save_config};
pub use schema::{
    BedrockConfig, Config, FineTuneModel, OpenAiCompatibleProvider, ProviderConfig,
    ProvidersConfig,
};

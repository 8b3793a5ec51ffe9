//! Adapter layer for Runledger.
//!
//! # Architecture
//!
//! - [`base::Dispatcher`]: trait every backend implements
//! - [`base::TaskAdapter`]: validation, dispatch and run recording around a dispatcher
//! - [`provider`]: provider identifiers, static specs, virtual provider resolution
//! - [`openai_compatible::OpenAiCompatibleDispatcher`]: chat completions HTTP client
//! - [`registry::adapter_for_task`]: builds an adapter from a model id and provider

pub mod base;
pub mod openai_compatible;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod registry;

pub use base::{AdapterInfo, AdapterRun, Dispatcher, RunRecord, TaskAdapter};
pub use openai_compatible::OpenAiCompatibleDispatcher;
pub use prompt::{PromptBuilder, SimplePromptBuilder};
pub use provider::{ModelProviderName, ProviderSpec, ResolvedProvider, StructuredOutputMode, PROVIDERS};
pub use registry::adapter_for_task;

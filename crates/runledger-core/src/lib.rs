//! Runledger core: the pieces every adapter builds on.
//!
//! - [`json_schema`]: JSON Schema checking and instance validation
//! - [`datamodel`]: `Task`, `TaskRun`, `TaskOutput`, `DataSource` and their on-disk form
//! - [`config`]: configuration schema, loading and env var overrides
//! - [`error`]: the error taxonomy shared by the whole workspace

pub mod config;
pub mod datamodel;
pub mod error;
pub mod json_schema;
pub mod utils;

pub use error::{Error, Result};

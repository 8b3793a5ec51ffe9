//! Data model: tasks, runs and provenance.
//!
//! These are typed replacements for loosely shaped JSON records:
//! - [`Task`]: a unit of work with optional input/output JSON schemas
//! - [`TaskRun`]: an immutable record of one invocation
//! - [`DataSource`]: where a piece of data came from (human or synthetic)
//! - [`TaskIo`]: a task input or output, either structured or plain text
//!
//! # Disk format
//!
//! ```text
//! <task dir>/task.json
//! <task dir>/runs/<run id>/task_run.json
//! ```

pub mod io;
pub mod run;
pub mod source;
pub mod task;

pub use io::TaskIo;
pub use run::{RecordMeta, RunFingerprint, TaskOutput, TaskRun};
pub use source::{DataSource, DataSourceType};
pub use task::Task;

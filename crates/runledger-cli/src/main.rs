//! Runledger CLI: entry point.
//!
//! # Commands
//!
//! - `runledger init`: write a default config file
//! - `runledger status`: show configuration and provider status
//! - `runledger check-schema <FILE>`: check a task JSON schema
//! - `runledger create-task --name <NAME> --instruction <TEXT> [--dir <DIR>]`: create a task
//! - `runledger show-task --task <PATH>`: print a task
//! - `runledger run --task <PATH> --model <ID> --provider <NAME> (--input <TEXT> | --input-json <JSON>)`
//! - `runledger runs --task <PATH>`: list recorded runs
//! - `runledger show-run --task <PATH> --run <ID>` / `delete-run`: inspect or remove one run

mod helpers;
mod init;
mod status;
mod task_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Runledger: run tasks against LLM providers and keep a ledger of every run
#[derive(Parser)]
#[command(name = "runledger", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.runledger/config.json)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Show configuration and provider status
    Status,

    /// Check that a file holds a usable task JSON schema
    CheckSchema {
        /// Path to the schema file
        file: String,
    },

    /// Create a new task directory with its task.json
    CreateTask {
        /// Task name; also names the task directory
        #[arg(short, long)]
        name: String,

        /// Instructions given to the model on every run
        #[arg(short, long)]
        instruction: String,

        /// Optional description
        #[arg(long)]
        description: Option<String>,

        /// JSON schema file for structured input
        #[arg(long)]
        input_schema: Option<String>,

        /// JSON schema file for structured output
        #[arg(long)]
        output_schema: Option<String>,

        /// Parent directory for the task
        #[arg(short, long, default_value = ".")]
        dir: String,
    },

    /// Print a task
    ShowTask {
        /// Path to task.json (or its directory)
        #[arg(short, long)]
        task: String,
    },

    /// Run a task once and record the run
    Run {
        /// Path to task.json (or its directory)
        #[arg(short, long)]
        task: String,

        /// Model id, e.g. "gpt-4o-mini" or "groq::llama-3.3-70b"
        #[arg(short, long)]
        model: String,

        /// Provider name, e.g. "openai", "ollama", "kiln_fine_tune"
        #[arg(short, long)]
        provider: String,

        /// Plain text input
        #[arg(short, long, conflicts_with = "input_json", required_unless_present = "input_json")]
        input: Option<String>,

        /// Structured input as a JSON object
        #[arg(long)]
        input_json: Option<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// List the runs recorded for a task
    Runs {
        /// Path to task.json (or its directory)
        #[arg(short, long)]
        task: String,
    },

    /// Print one recorded run
    ShowRun {
        /// Path to task.json (or its directory)
        #[arg(short, long)]
        task: String,

        /// Run id
        #[arg(short, long)]
        run: String,
    },

    /// Delete one recorded run
    DeleteRun {
        /// Path to task.json (or its directory)
        #[arg(short, long)]
        task: String,

        /// Run id
        #[arg(short, long)]
        run: String,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path: Option<PathBuf> = cli.config.as_deref().map(helpers::expand_tilde);

    match cli.command {
        Commands::Init => init::run(config_path.as_deref()),
        Commands::Status => status::run(config_path.as_deref()),
        Commands::CheckSchema { file } => task_cmd::check_schema(&file),
        Commands::CreateTask {
            name,
            instruction,
            description,
            input_schema,
            output_schema,
            dir,
        } => {
            init_logging(false);
            task_cmd::create_task(
                &dir,
                &name,
                &instruction,
                description.as_deref(),
                input_schema.as_deref(),
                output_schema.as_deref(),
            )
            .map(|_| ())
        }
        Commands::ShowTask { task } => task_cmd::show_task(&task),
        Commands::Run {
            task,
            model,
            provider,
            input,
            input_json,
            logs,
        } => {
            init_logging(logs);
            let input = task_cmd::parse_input(input, input_json)?;
            task_cmd::run_task(config_path.as_deref(), &task, &model, &provider, input).await
        }
        Commands::Runs { task } => {
            init_logging(false);
            task_cmd::list_runs(&task)
        }
        Commands::ShowRun { task, run } => task_cmd::show_run(&task, &run),
        Commands::DeleteRun { task, run } => {
            init_logging(false);
            task_cmd::delete_run(&task, &run)
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("runledger=debug,runledger_core=debug,runledger_adapters=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

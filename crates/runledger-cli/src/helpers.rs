//! Shared CLI helpers: path expansion and output formatting.

use std::path::PathBuf;

use colored::Colorize;

use runledger_core::datamodel::{TaskIo, TaskRun};

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Render a task output for the terminal: pretty JSON or the text itself.
pub fn format_output(output: &TaskIo) -> String {
    match output {
        TaskIo::Structured(fields) => {
            serde_json::to_string_pretty(fields).unwrap_or_else(|_| output.to_string())
        }
        TaskIo::Plaintext(text) => text.clone(),
    }
}

/// One line summarizing a run, for `runledger runs`.
pub fn run_summary(run: &TaskRun) -> String {
    let created = run
        .meta
        .created_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S");
    let model = run.output.source.property("model_name").unwrap_or("?");
    format!(
        "{}  {}  {:<24} {}",
        run.id(),
        created,
        model,
        truncate(&run.input, 48)
    )
}

/// Print a heading line in the CLI's style.
pub fn print_heading(title: &str) {
    println!();
    println!("{}", format!("📒 {title}").cyan().bold());
    println!();
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let cut: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{cut}…")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

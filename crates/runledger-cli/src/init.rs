//! `runledger init`: write a default configuration file.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use runledger_core::config::{get_config_path, load_config, save_config};

/// Run the init command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    println!();
    println!("{}", "📒 Runledger Setup".cyan().bold());
    println!();

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    if write_default_config(&path)? {
        println!("  {} created config at {}", "✓".green(), path.display());
    } else {
        println!("  {} config already exists at {}", "✓".green(), path.display());
    }

    println!();
    println!(
        "{}",
        "Add a provider key to the config (or set RUNLEDGER_PROVIDERS__<NAME>__API_KEY), then try:"
            .dimmed()
    );
    println!(
        "  runledger run --task ./my-task --model gpt-4o-mini --provider openai --input \"hello\""
    );
    println!();

    Ok(())
}

/// Write defaults to `path` unless a file is already there. Returns whether it wrote.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let config = load_config(Some(path));
    save_config(&config, Some(path))
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    Ok(true)
}

//! `runledger status`: show configuration and provider status.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use runledger_adapters::provider::{ModelProviderName, PROVIDERS};
use runledger_core::config::{get_config_path, load_config, Config};

/// Run the status command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);
    let config = load_config(Some(&path));

    crate::helpers::print_heading("Runledger Status");

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        path.display(),
        if path.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );
    println!("  {:<18} {}", "User:".bold(), config.user_id);
    println!(
        "  {:<18} {}",
        "Autosave runs:".bold(),
        if config.autosave_runs { "on" } else { "off" }
    );

    println!();
    println!("  {}", "Providers:".bold());
    for spec in PROVIDERS {
        let status = if provider_configured(&config, spec.provider) {
            format!("{} (configured)", "✓".green())
        } else if spec.is_local {
            format!("{}", "· default endpoint".dimmed())
        } else {
            format!("{} {}", "· not configured".dimmed(), spec.env_key.dimmed())
        };
        println!("    {:<20} {}", spec.display_name, status);
    }

    if !config.openai_compatible_providers.is_empty() {
        println!();
        println!("  {}", "OpenAI compatible:".bold());
        for entry in &config.openai_compatible_providers {
            println!("    {:<20} {}", entry.name, entry.base_url.dimmed());
        }
    }

    if !config.fine_tunes.is_empty() {
        println!();
        println!("  {:<18} {}", "Fine-tunes:".bold(), config.fine_tunes.len());
    }

    println!();

    Ok(())
}

fn provider_configured(config: &Config, provider: ModelProviderName) -> bool {
    let providers = &config.providers;
    match provider {
        ModelProviderName::AmazonBedrock => providers.amazon_bedrock.is_configured(),
        ModelProviderName::Ollama => providers.ollama.api_base.is_some(),
        ModelProviderName::AzureOpenAi => {
            providers.azure_openai.is_configured() && providers.azure_openai.api_base.is_some()
        }
        other => providers
            .get_by_name(other.as_str())
            .is_some_and(|p| p.is_configured()),
    }
}

//! Configuration Validation Binary
//!
//! Validates a search_fundings YAML configuration:
//! - Parses the file with the same defaults the pipeline uses
//! - Reports every invalid value at once
//! - Warns about settings that are valid but probably unintended

use anyhow::{Context, Result};
use std::path::PathBuf;

use search_fundings::config::{Config, Renderer};
use search_fundings::error::ConfigError;

fn warnings(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.discovery.max_documents == 0 {
        warnings.push("discovery.max_documents is 0: every issue in the window will be processed".to_string());
    }
    if config.discovery.lookback_days == 0 {
        warnings.push(
            "discovery.lookback_days is 0: the window starts now, so only undated issues are kept".to_string(),
        );
    }
    if config.fetch.renderer == Renderer::WebDriver && !config.fetch.webdriver_url.starts_with("http") {
        warnings.push(format!(
            "fetch.webdriver_url '{}' does not look like a WebDriver endpoint",
            config.fetch.webdriver_url
        ));
    }
    if config.filter.include_internships && config.filter.internship_keywords.is_empty() {
        warnings.push("filter.include_internships is set but filter.internship_keywords is empty".to_string());
    }
    if config.filter.remote_keywords.is_empty() {
        warnings.push("filter.remote_keywords is empty: remote postings will be excluded".to_string());
    }

    warnings
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SEARCH_FUNDINGS_CONFIG").ok())
        .map(PathBuf::from);

    println!("=== Configuration Validator ===");

    let config = match &path {
        Some(path) => {
            println!("Config: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            Config::from_yaml(&content).context("Failed to parse config YAML")?
        }
        None => {
            println!("Config: built-in defaults");
            Config::default()
        }
    };

    let errors = match config.validate() {
        Ok(()) => Vec::new(),
        Err(ConfigError::Invalid(problems)) => problems,
        Err(other) => return Err(other.into()),
    };
    let warnings = warnings(&config);

    if errors.is_empty() && warnings.is_empty() {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    if !errors.is_empty() {
        println!("\n❌ ERRORS (must fix):");
        for error in &errors {
            println!("  - {}", error);
        }
    }

    if !warnings.is_empty() {
        println!("\n⚠️  WARNINGS:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    if !errors.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

//! CLI command definitions

use clap::Args;

/// Drive a tag configuration through a dry-run ad network
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the tag configuration (YAML or JSON)
    #[arg(short, long)]
    pub file: String,

    /// Location of the simulated page
    #[arg(long, default_value = "https://localhost/")]
    pub href: String,

    /// Refresh a slot after the first cycle (repeatable)
    #[arg(long)]
    pub refresh: Vec<String>,

    /// Refresh a bucket after the first cycle (repeatable)
    #[arg(long)]
    pub refresh_bucket: Vec<String>,

    /// Navigate to this location and request ads again (repeatable)
    #[arg(long)]
    pub navigate: Vec<String>,

    /// Output the final state in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a tag configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the tag configuration (YAML or JSON)
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Resolve an ad unit path template
#[derive(Debug, Args, Clone)]
pub struct ResolvePathCommand {
    /// Ad unit path with `{name}` placeholders
    #[arg(short, long)]
    pub path: String,

    /// Tag configuration providing static path variables
    #[arg(short, long)]
    pub file: Option<String>,

    /// Location of the simulated page
    #[arg(long, default_value = "https://localhost/")]
    pub href: String,

    /// Runtime path variables (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}

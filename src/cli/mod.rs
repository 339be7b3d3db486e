//! Command-line interface

pub mod commands;
pub mod dry_run;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ResolvePathCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Ad request orchestration for a single page
#[derive(Debug, Parser, Clone)]
#[command(name = "adtag")]
#[command(version = "0.1.0")]
#[command(about = "Ad request orchestration engine with a dry-run ad network", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run requestAds cycles against a dry-run ad network
    Run(RunCommand),

    /// Validate a tag configuration
    Validate(ValidateCommand),

    /// Resolve an ad unit path template
    ResolvePath(ResolvePathCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

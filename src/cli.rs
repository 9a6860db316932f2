//! CLI argument parser for the fabrication harness.
//!
//! Loads a catalog and a chain from JSON, fabricates consecutive segments in
//! an in-memory store and prints the results.

use std::path::PathBuf;

use clap::Parser;

use crate::config::FabricatorConfig;
use crate::error::{FabricationError, Result};

/// Default number of segments fabricated per run.
pub const DEFAULT_SEGMENTS: usize = 4;

/// lofi-fabricator: fabricate segments of a chain from a program catalog
#[derive(Parser, Debug)]
#[command(name = "lofi-fabricator")]
#[command(about = "Fabricate consecutive segments of a chain from a program catalog")]
#[command(version)]
pub struct Cli {
    /// Catalog JSON file (meme taxonomy and programs)
    #[arg(short, long)]
    pub catalog: PathBuf,

    /// Chain JSON file
    #[arg(long)]
    pub chain: PathBuf,

    /// Number of segments to fabricate
    #[arg(short = 'n', long, default_value_t = DEFAULT_SEGMENTS)]
    pub segments: usize,

    /// Base seed for reproducible fabrication (overrides config and environment)
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Fabricator config JSON file; environment variables are used if omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the fabricated segments to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Builds the effective fabricator configuration.
    ///
    /// Starts from the config file if given, else from the environment, then
    /// applies `--seed`.
    pub fn fabricator_config(&self) -> Result<FabricatorConfig> {
        let mut config = match &self.config {
            Some(path) => FabricatorConfig::from_json_file(path)?,
            None => FabricatorConfig::from_env(),
        };
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(reason) = config.validate() {
            return Err(FabricationError::invalid_config(reason));
        }
        Ok(config)
    }
}

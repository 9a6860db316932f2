//! lofi-fabricator: developer harness for the segment fabrication engine.
//!
//! Loads a catalog and a chain, fabricates segments into an in-memory store
//! and prints them as JSON. Logs go to stderr so stdout stays parseable.

use std::time::Instant;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lofi_fabricator::catalog::ContentStore;
use lofi_fabricator::cli::Cli;
use lofi_fabricator::store::MemorySegmentStore;
use lofi_fabricator::types::Chain;
use lofi_fabricator::work::extend_chain;

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Installs the stderr subscriber, honouring `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    let config = cli.fabricator_config().context("invalid fabricator configuration")?;
    let catalog = ContentStore::from_json_file(&cli.catalog)
        .with_context(|| format!("loading catalog {}", cli.catalog.display()))?;
    let chain = Chain::from_json_file(&cli.chain)
        .with_context(|| format!("loading chain {}", cli.chain.display()))?;

    info!(
        chain_id = %chain.id,
        segments = cli.segments,
        seed = ?config.seed,
        "Fabricating chain"
    );
    let start_time = Instant::now();
    let mut store = MemorySegmentStore::new();
    let fabricated = extend_chain(&mut store, &catalog, &chain, &config, cli.segments)
        .with_context(|| format!("fabricating chain {}", chain.id))?;
    info!(
        crafted = fabricated.len(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Fabrication complete"
    );

    let json = if cli.pretty {
        serde_json::to_string_pretty(&fabricated)?
    } else {
        serde_json::to_string(&fabricated)?
    };
    match &cli.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Saved fabricated segments");
        }
        None => println!("{}", json),
    }
    Ok(())
}

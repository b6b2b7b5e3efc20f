//! Entry point for the dwattach tool.
//!
//! This file handles high-level application flow:
//! 1. Parse command-line arguments using `clap`.
//! 2. Initialize `tracing` logging.
//! 3. Run the build: clone the input and finalize the output.
//!
//! The debug-info encoder is an external collaborator wired in by library
//! callers through `builder::build`; the CLI performs the layout-preserving
//! clone on its own.
//!
//! Error handling is done via `anyhow`.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dwattach::builder;
use dwattach::config::Config;

fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    builder::build(
        &config.input,
        &config.output,
        config.processor.as_deref(),
        None,
    )?;

    println!("Wrote {}", config.output.display());
    Ok(())
}

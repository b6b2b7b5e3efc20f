//! Configuration module.
//!
//! This module defines the command-line interface (CLI) for the tool using `clap`.
//! It handles parsing arguments like the input binary and the output file path.

use clap::Parser;
use std::path::PathBuf;

/// Clone an ELF binary and append generated debug-information sections.
///
/// The cloned output preserves the exact layout of the input: header,
/// program headers and all sections keep their original file offsets.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Input ELF file
    pub input: PathBuf,

    /// Output file
    #[arg(short, long, default_value = "a.dbg", help = "Path to the output file")]
    pub output: PathBuf,

    /// Processor family reported by the host analysis environment, used to
    /// pick a machine type when the input leaves it unset
    #[arg(long)]
    pub processor: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", help = "Set the logging level")]
    pub log_level: String,
}

//! CLI argument definitions using clap
//!
//! Commands:
//! - aerostruct check --type <name> [--input <file>]
//! - aerostruct describe --type <name>
//! - aerostruct list

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerostruct - typed record construction from JSON definitions
#[derive(Parser, Debug)]
#[command(name = "aerostruct")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file; defaults apply when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a record from a JSON document
    Check {
        /// Name of the record type or union
        #[arg(long = "type")]
        type_name: String,

        /// JSON input file (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Print a type's policy, flags and keys
    Describe {
        /// Name of the record type
        #[arg(long = "type")]
        type_name: String,
    },

    /// List loaded types and unions
    List,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

//! CLI module for aerostruct
//!
//! Provides command-line interface for:
//! - check: Build a record from a JSON document
//! - describe: Print a type's schema
//! - list: Print loaded type and union names

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{boot, build, check, describe, describe_type, list, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_input, write_error, write_response};

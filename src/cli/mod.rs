//! CLI module for opguard
//!
//! Provides command-line access to the engine over a JSON snapshot:
//! - read: execute a read plan
//! - write: execute a write plan
//! - converse: slot-filling turns, one per line
//! - audit: list audit records
//! - registry: print the schema registry

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, LogFormatArg};
pub use commands::{run, run_command, Session};
pub use errors::{CliError, CliResult};
pub use io::{read_request, read_requests, write_error, write_response};

//! CLI argument definitions using clap
//!
//! Commands:
//! - opguard read      plan on stdin
//! - opguard write     write plan on stdin
//! - opguard converse  one turn per stdin line
//! - opguard audit     query the audit trail
//! - opguard registry  print the schema registry

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::observability::LogFormat;

/// opguard - guarded execution of untrusted operation plans
#[derive(Parser, Debug)]
#[command(name = "opguard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file; defaults plus environment when absent
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON snapshot holding the collections
    #[arg(long, global = true, default_value = "./opguard-data.json")]
    pub data: PathBuf,

    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Json)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a read plan
    Read,

    /// Execute a write plan directly, without slot-filling
    Write {
        /// Return the sanitized plan without executing it
        #[arg(long)]
        dry_run: bool,

        /// Skip the bulk-mutation guard
        #[arg(long)]
        force: bool,

        /// Request text recorded in the audit trail
        #[arg(long, default_value = "")]
        text: String,
    },

    /// Handle turns of one conversation, one JSON turn per line
    Converse {
        /// Conversation id used for turns that carry none
        #[arg(long)]
        conversation: String,

        /// Confirm every turn
        #[arg(long)]
        confirm: bool,
    },

    /// List audit records
    Audit {
        #[arg(long)]
        collection: Option<String>,

        /// Write action, e.g. insertOne
        #[arg(long)]
        action: Option<String>,

        /// Inclusive lower bound (RFC 3339)
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Exclusive upper bound (RFC 3339)
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },

    /// Print the schema registry
    Registry,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Pretty => LogFormat::Pretty,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

//! opguard CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Errors have
//! already been reported on stdout as JSON; stderr gets a one-line copy
//! and the process exits non-zero.

use opguard::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

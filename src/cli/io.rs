//! JSON I/O handling for CLI
//!
//! - Input: one JSON object on stdin, or one per line for `converse`
//! - Output: one JSON object per response on stdout

use std::io::{self, BufRead, Read, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Read a single JSON request from stdin
///
/// The whole of stdin is read, so a pretty-printed plan is accepted.
pub fn read_request() -> CliResult<Value> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;

    if input.trim().is_empty() {
        return Err(CliError::Io("Empty input".into()));
    }
    Ok(serde_json::from_str(&input)?)
}

/// Read JSON requests from stdin, one per line; blank lines are skipped.
pub fn read_requests() -> impl Iterator<Item = CliResult<Value>> {
    io::stdin().lock().lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(serde_json::from_str(&line).map_err(CliError::from)),
        Err(e) => Some(Err(CliError::from(e))),
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    emit(&json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    emit(&json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}

fn emit(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

//! CLI error types
//!
//! Errors from the layers below keep their own codes. CLI codes:
//! - OPG_CLI_IO: stdin/stdout failure or malformed input JSON
//! - OPG_CLI_INPUT: well-formed input the command cannot use

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::schema::SchemaError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid input: {0}")]
    Input(String),
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.code(),
            Self::Schema(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Engine(e) => e.code(),
            Self::Io(_) => "OPG_CLI_IO",
            Self::Input(_) => "OPG_CLI_INPUT",
        }
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(format!("JSON error: {}", e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through() {
        let err: CliError = EngineError::NoPlan.into();
        assert_eq!(err.code(), "OPG_ENGINE_NO_PLAN");

        let err: CliError = io::Error::new(io::ErrorKind::BrokenPipe, "closed").into();
        assert_eq!(err.code(), "OPG_CLI_IO");
    }
}

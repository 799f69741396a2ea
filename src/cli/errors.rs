//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero status.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::schema::StructError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout/input file)
    IoError,
    /// Definition files could not be loaded
    DefinitionError,
    /// No loaded type or union has the requested name
    UnknownType,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::DefinitionError => "AERO_CLI_DEFINITION_ERROR",
            Self::UnknownType => "AERO_CLI_UNKNOWN_TYPE",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn definition_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::DefinitionError, msg)
    }

    pub fn unknown_type(name: &str) -> Self {
        Self::new(
            CliErrorCode::UnknownType,
            format!("No type or union named '{}' is defined", name),
        )
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<StructError> for CliError {
    fn from(e: StructError) -> Self {
        Self::definition_error(format!("{}: {}", e.code(), e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::unknown_type("Ghost");
        assert_eq!(err.code_str(), "AERO_CLI_UNKNOWN_TYPE");
        assert!(err.to_string().starts_with("AERO_CLI_UNKNOWN_TYPE: "));
    }

    #[test]
    fn test_from_struct_error() {
        let err: CliError = StructError::invalid_definition("a.json", "bad").into();
        assert_eq!(err.code(), &CliErrorCode::DefinitionError);
        assert!(err.message().contains("AERO_STRUCT_INVALID_DEFINITION"));
    }
}

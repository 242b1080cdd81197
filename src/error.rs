//! Structured error handling
//!
//! The reasoner treats only parse failures as fatal; everything else is
//! reported locally on stderr and execution continues. The error type here
//! therefore carries the fatal class plus the handful of load-time
//! failures (duplicate rule names, unusable configuration) that abort a
//! run, with error codes for programmatic handling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Syntax error in the input program
    ParseError = 1000,
    /// Malformed directive
    DirectiveError = 1001,
    /// Duplicate rule name across strata
    DuplicateRule = 2000,
    /// Inference failure
    ReasoningError = 2001,
    /// Cycle limit exceeded without convergence
    CycleLimitExceeded = 2002,
    /// Retraction refused or impossible
    RetractionError = 2003,
    /// Configuration problem
    ConfigError = 7000,
    /// Chat backend failure
    ChatError = 8000,
    /// I/O failure
    IoError = 9000,
    /// Internal invariant violation
    InternalError = 9001,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a short description of the error code
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::DirectiveError => "Malformed directive",
            ErrorCode::DuplicateRule => "Duplicate rule name",
            ErrorCode::ReasoningError => "Reasoning error",
            ErrorCode::CycleLimitExceeded => "Cycle limit exceeded",
            ErrorCode::RetractionError => "Retraction error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::ChatError => "Chat backend error",
            ErrorCode::IoError => "I/O error",
            ErrorCode::InternalError => "Internal error",
        }
    }

    /// Whether errors of this code abort execution.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorCode::ParseError | ErrorCode::DuplicateRule | ErrorCode::IoError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// The main error type for tenet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenetError {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Hint for resolving the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl TenetError {
    /// Create a new error with a code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    /// Create a malformed-directive error
    pub fn directive(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DirectiveError, message)
    }

    /// Create a duplicate rule name error
    pub fn duplicate_rule(name: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateRule,
            format!("rule `{}` is already declared", name),
        )
        .with_hint("rule names must be unique across all strata")
    }

    /// Create a reasoning error
    pub fn reasoning(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ReasoningError, message)
    }

    /// Create a cycle limit error
    pub fn cycle_limit(cycles: usize) -> Self {
        Self::new(
            ErrorCode::CycleLimitExceeded,
            format!("no fixed point after {} cycles", cycles),
        )
    }

    /// Create a retraction error
    pub fn retraction(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RetractionError, message)
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Create a chat backend error
    pub fn chat(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ChatError, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Add a hint for resolving the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Whether this error aborts execution.
    pub fn is_fatal(&self) -> bool {
        self.code.is_fatal()
    }
}

impl fmt::Display for TenetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)?;
        if let Some(ref hint) = self.hint {
            write!(f, "\nHint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for TenetError {}

impl From<std::io::Error> for TenetError {
    fn from(err: std::io::Error) -> Self {
        TenetError::new(ErrorCode::IoError, err.to_string())
    }
}

impl From<toml::de::Error> for TenetError {
    fn from(err: toml::de::Error) -> Self {
        TenetError::config(err.to_string())
    }
}

/// A Result type using TenetError
pub type TenetResult<T> = Result<T, TenetError>;

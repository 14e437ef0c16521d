//! Error results that can be returned from the scss compiler

use thiserror::Error;

/// Errors raised while compiling a stylesheet. Most parse-level problems are
/// logged and recovered from; these variants are the ones that escape to the
/// caller.
#[derive(Debug, Error)]
pub enum ScssError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("parse error: {message} ({source_line})")]
    Parse { message: String, source_line: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScssError {
    #[must_use]
    pub fn syntax(message: &str) -> Self {
        ScssError::Syntax(message.to_string())
    }

    #[must_use]
    pub fn parse(message: &str, source_line: &str) -> Self {
        ScssError::Parse {
            message: message.to_string(),
            source_line: source_line.to_string(),
        }
    }

    #[must_use]
    pub fn unsupported(message: &str) -> Self {
        ScssError::Unsupported(message.to_string())
    }
}

pub type ScssResult<T> = Result<T, ScssError>;

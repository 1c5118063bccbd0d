//! Error types shared by the HTTP provider crates

use thiserror::Error;

/// Errors raised while interpreting resource fields outside the engine
#[derive(Debug, Error)]
pub enum Error {
    /// A field value could not be interpreted
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

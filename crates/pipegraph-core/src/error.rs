//! Error types for pipegraph.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A descriptor field is missing, empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A build script document is missing or could not be parsed.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

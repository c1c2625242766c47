//! Error types for the engine.

use thiserror::Error;

/// Engine-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Renderer capacity cannot hold a single quad or overflows the index range
    #[error("Invalid capabilities: {0}")]
    InvalidCapabilities(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

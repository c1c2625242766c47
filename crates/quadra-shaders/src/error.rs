//! Shader error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading or compiling shaders.
#[derive(Error, Debug)]
pub enum ShaderError {
    /// A shader source file could not be read.
    #[error("Failed to read shader {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// GLSL compilation failed.
    #[error("Failed to compile {name}: {message}")]
    Compile { name: String, message: String },

    /// The bytes are not a SPIR-V module.
    #[error("Invalid SPIR-V: {0}")]
    InvalidSpirv(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, ShaderError>;

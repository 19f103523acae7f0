//! Error types for formic operations.

use crate::Path;
use thiserror::Error;

/// Result type alias for formic operations.
pub type FormResult<T> = Result<T, FormError>;

/// Errors that can occur at the engine's fallible seams.
///
/// The engine is exception-free by construction for ordinary misuse
/// (out-of-range structural operations are silent no-ops, invalid
/// writes are dropped with a warning); these variants cover the few
/// places where a caller explicitly asks for a checked result.
#[derive(Debug, Error)]
pub enum FormError {
    /// A path that must address a field was empty.
    #[error("empty path denotes no field")]
    EmptyPath,

    /// Path does not exist in the value tree.
    #[error("path not found: {path}")]
    PathNotFound {
        /// The path that was not found.
        path: Path,
    },

    /// A dependency pattern failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FormError {
    /// Create a path not found error.
    #[inline]
    pub fn path_not_found(path: Path) -> Self {
        FormError::PathNotFound { path }
    }
}

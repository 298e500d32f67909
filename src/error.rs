//! Error types for page operations.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while working with the host page.
#[derive(Debug, Error)]
pub enum LensError {
    /// A DOM call failed
    #[error("DOM error: {0}")]
    Dom(String),

    /// A browser global (window, document, body) is missing
    #[error("Missing browser global: {0}")]
    MissingGlobal(&'static str),

    /// Drawing or exporting through a canvas failed
    #[error("Canvas error: {0}")]
    Canvas(String),

    /// Configuration could not be loaded or saved
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LensError {
    /// Create a DOM error with a message.
    pub fn dom(message: impl Into<String>) -> Self {
        Self::Dom(message.into())
    }
}

//! Template engine error types

use thiserror::Error;

/// Template-specific errors
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template rendering error, with the full cause chain
    #[error("Template error: {0}")]
    Render(String),

    /// A template file could not be parsed or registered
    #[error("Invalid template {name}: {message}")]
    Invalid { name: String, message: String },

    /// Embedded template is not valid UTF-8
    #[error("Template {0} is not valid UTF-8")]
    Encoding(String),

    /// IO error while reading the override directory
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

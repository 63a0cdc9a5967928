//! Template engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// No template with this name is loaded
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Parsing or rendering failed
    #[error("Template error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Core error types for glossia.
//!
//! Provides the [`GlossiaError`] enum covering template errors, catalog
//! errors, configuration errors, and IO errors. Template-syntax and
//! template-missing conditions are distinct variants because callers recover
//! from a missing template (the `try_include` tag, the `template_exists`
//! filter) but never from a syntax error.

use thiserror::Error;

/// The primary error type for glossia.
#[derive(Error, Debug)]
pub enum GlossiaError {
    /// A template contains invalid syntax.
    #[error("Template syntax error: {0}")]
    TemplateSyntaxError(String),

    /// The requested template file was not found.
    #[error("Template does not exist: {0}")]
    TemplateDoesNotExist(String),

    /// A message catalog could not be parsed or is inconsistent.
    #[error("Catalog error: {0}")]
    CatalogError(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GlossiaError {
    /// Returns `true` if this error means a template could not be found.
    ///
    /// The `try_include` tag and the `template_exists` filter use this to
    /// tell a recoverable missing-template condition apart from real
    /// failures.
    pub const fn is_template_missing(&self) -> bool {
        matches!(self, Self::TemplateDoesNotExist(_))
    }
}

/// A convenience type alias for `Result<T, GlossiaError>`.
pub type GlossiaResult<T> = Result<T, GlossiaError>;

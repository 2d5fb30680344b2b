//! Settings for the glossia tool.
//!
//! Provides the [`Settings`] struct with sensible defaults and TOML loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GlossiaError, GlossiaResult};

/// The complete set of glossia settings.
///
/// # Examples
///
/// ```
/// use glossia_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.language_code, "en");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether debug mode is enabled.
    pub debug: bool,
    /// The log level filter (e.g. "debug", "info", "warn").
    pub log_level: String,
    /// The default source language code.
    pub language_code: String,
    /// Directories to search for template files, in order.
    pub template_dirs: Vec<PathBuf>,
    /// Whether HTML auto-escaping is enabled by default.
    pub auto_escape: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            language_code: "en".to_string(),
            template_dirs: Vec::new(),
            auto_escape: true,
        }
    }
}

impl Settings {
    /// Parses settings from a TOML string.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the TOML is invalid.
    pub fn from_toml_str(source: &str) -> GlossiaResult<Self> {
        toml::from_str(source)
            .map_err(|e| GlossiaError::ConfigurationError(format!("Invalid settings TOML: {e}")))
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or
    /// `ConfigurationError` if its contents are not valid TOML.
    pub fn load(path: &Path) -> GlossiaResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.debug);
        assert!(settings.auto_escape);
        assert_eq!(settings.log_level, "info");
        assert!(settings.template_dirs.is_empty());
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
            debug = false
            log_level = "warn"
            language_code = "de"
            template_dirs = ["templates", "shared/templates"]
            auto_escape = true
        "#;
        let settings = Settings::from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.language_code, "de");
        assert_eq!(settings.template_dirs.len(), 2);
    }

    #[test]
    fn test_from_toml_partial() {
        let settings = Settings::from_toml_str(r#"language_code = "fr""#).unwrap();
        assert_eq!(settings.language_code, "fr");
        // Unspecified keys keep their defaults.
        assert!(settings.debug);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = Settings::from_toml_str("debug = [not toml");
        assert!(matches!(result, Err(GlossiaError::ConfigurationError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Settings::load(Path::new("/nonexistent/glossia.toml"));
        assert!(matches!(result, Err(GlossiaError::IoError(_))));
    }
}

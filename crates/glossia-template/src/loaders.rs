//! Template loaders.
//!
//! A [`TemplateLoader`] turns a template name into source text. The engine
//! consults its loaders in order, so a [`StringLoader`] of in-memory
//! templates can sit in front of a [`FileSystemLoader`] over template
//! directories.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use glossia_core::error::GlossiaError;

/// Loads template source by name.
pub trait TemplateLoader: Send + Sync {
    /// Loads the named template's source.
    ///
    /// # Errors
    ///
    /// Returns `TemplateDoesNotExist` when this loader has no template
    /// with that name.
    fn load(&self, name: &str) -> Result<String, GlossiaError>;

    /// Returns whether this loader can supply the named template.
    fn exists(&self, name: &str) -> bool;
}

/// Loads templates from a list of directories, first match wins.
pub struct FileSystemLoader {
    dirs: Vec<PathBuf>,
}

impl FileSystemLoader {
    /// Creates a loader over the given directories.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        // Template names must stay inside the configured directories.
        let relative = Path::new(name);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return None;
        }

        self.dirs
            .iter()
            .map(|dir| dir.join(relative))
            .find(|path| path.is_file())
    }
}

impl TemplateLoader for FileSystemLoader {
    fn load(&self, name: &str) -> Result<String, GlossiaError> {
        let path = self
            .resolve(name)
            .ok_or_else(|| GlossiaError::TemplateDoesNotExist(name.to_string()))?;
        Ok(std::fs::read_to_string(path)?)
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

/// Holds templates in memory, keyed by name.
pub struct StringLoader {
    templates: RwLock<HashMap<String, String>>,
}

impl StringLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// Adds or replaces a template.
    pub fn add(&self, name: impl Into<String>, source: impl Into<String>) {
        if let Ok(mut templates) = self.templates.write() {
            templates.insert(name.into(), source.into());
        }
    }
}

impl TemplateLoader for StringLoader {
    fn load(&self, name: &str) -> Result<String, GlossiaError> {
        self.templates
            .read()
            .ok()
            .and_then(|templates| templates.get(name).cloned())
            .ok_or_else(|| GlossiaError::TemplateDoesNotExist(name.to_string()))
    }

    fn exists(&self, name: &str) -> bool {
        self.templates
            .read()
            .is_ok_and(|templates| templates.contains_key(name))
    }
}

impl Default for StringLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_loader_roundtrip() {
        let loader = StringLoader::new();
        loader.add("row.html", "{{ text }}");

        assert!(loader.exists("row.html"));
        assert_eq!(loader.load("row.html").unwrap(), "{{ text }}");
        assert!(!loader.exists("missing.html"));
        assert!(matches!(
            loader.load("missing.html"),
            Err(GlossiaError::TemplateDoesNotExist(_))
        ));
    }

    #[test]
    fn test_string_loader_replaces() {
        let loader = StringLoader::new();
        loader.add("a.html", "one");
        loader.add("a.html", "two");
        assert_eq!(loader.load("a.html").unwrap(), "two");
    }

    #[test]
    fn test_filesystem_loader() {
        let dir = std::env::temp_dir().join("glossia-loader-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("page.html"), "hello").unwrap();

        let loader = FileSystemLoader::new(vec![dir.clone()]);
        assert!(loader.exists("page.html"));
        assert_eq!(loader.load("page.html").unwrap(), "hello");
        assert!(!loader.exists("missing.html"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_filesystem_loader_rejects_traversal() {
        let loader = FileSystemLoader::new(vec![std::env::temp_dir()]);
        assert!(!loader.exists("../etc/passwd"));
        assert!(!loader.exists("/etc/passwd"));
    }
}

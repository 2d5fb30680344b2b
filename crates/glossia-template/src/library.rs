//! Tag and filter libraries.
//!
//! A [`Library`] bundles custom filters and simple tags under a name that
//! templates reference with `{% load name %}`. The engine owns a
//! [`LibraryRegistry`] of installed libraries; registering a library makes
//! its filters available to the engine's filter registry and its simple
//! tags resolvable by the parser.

use std::collections::HashMap;
use std::sync::Arc;

use glossia_core::error::GlossiaError;

use crate::context::ContextValue;
use crate::filters::{Filter, FilterRegistry};

/// A simple tag: resolved argument values in, one value out.
pub type SimpleTagFn = fn(&[ContextValue]) -> Result<ContextValue, GlossiaError>;

/// A named bundle of filters and simple tags.
pub struct Library {
    name: String,
    filters: Vec<Arc<dyn Filter>>,
    simple_tags: HashMap<String, SimpleTagFn>,
}

impl Library {
    /// Creates an empty library with the given load name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filters: Vec::new(),
            simple_tags: HashMap::new(),
        }
    }

    /// Returns the library's load name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a filter to this library.
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a simple tag to this library.
    #[must_use]
    pub fn with_simple_tag(mut self, name: impl Into<String>, tag: SimpleTagFn) -> Self {
        self.simple_tags.insert(name.into(), tag);
        self
    }

    /// Returns the filters this library provides.
    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    /// Looks up a simple tag by name.
    pub fn simple_tag(&self, name: &str) -> Option<SimpleTagFn> {
        self.simple_tags.get(name).copied()
    }
}

/// The set of libraries installed on an engine.
pub struct LibraryRegistry {
    libraries: HashMap<String, Library>,
}

impl LibraryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            libraries: HashMap::new(),
        }
    }

    /// Installs a library, making its filters available through `filters`
    /// and its simple tags resolvable by name.
    pub fn install(&mut self, library: Library, filters: &mut FilterRegistry) {
        for filter in library.filters() {
            filters.register(Arc::clone(filter));
        }
        self.libraries.insert(library.name().to_string(), library);
    }

    /// Returns whether a library with this load name is installed.
    pub fn has(&self, name: &str) -> bool {
        self.libraries.contains_key(name)
    }

    /// Finds a simple tag by name across all installed libraries.
    pub fn find_simple_tag(&self, name: &str) -> Option<SimpleTagFn> {
        self.libraries
            .values()
            .find_map(|library| library.simple_tag(name))
    }
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterEnv;

    fn shout(args: &[ContextValue]) -> Result<ContextValue, GlossiaError> {
        let text = args
            .first()
            .map(ContextValue::to_display_string)
            .unwrap_or_default();
        Ok(ContextValue::String(text.to_uppercase()))
    }

    struct ReverseFilter;
    impl Filter for ReverseFilter {
        fn name(&self) -> &'static str {
            "reverse"
        }
        fn apply(
            &self,
            value: &ContextValue,
            _args: &[ContextValue],
            _env: &FilterEnv<'_>,
        ) -> Result<ContextValue, GlossiaError> {
            Ok(ContextValue::String(
                value.to_display_string().chars().rev().collect(),
            ))
        }
    }

    #[test]
    fn test_install_makes_filters_and_tags_visible() {
        let mut filters = FilterRegistry::new();
        let mut registry = LibraryRegistry::new();
        let library = Library::new("demo")
            .with_filter(Arc::new(ReverseFilter))
            .with_simple_tag("shout", shout);

        registry.install(library, &mut filters);

        assert!(registry.has("demo"));
        assert!(!registry.has("other"));
        assert!(filters.contains("reverse"));
        assert!(registry.find_simple_tag("shout").is_some());
        assert!(registry.find_simple_tag("whisper").is_none());
    }

    #[test]
    fn test_simple_tag_invocation() {
        let registry = {
            let mut filters = FilterRegistry::new();
            let mut registry = LibraryRegistry::new();
            registry.install(Library::new("demo").with_simple_tag("shout", shout), &mut filters);
            registry
        };
        let tag = registry.find_simple_tag("shout").unwrap();
        let out = tag(&[ContextValue::from("hey")]).unwrap();
        assert_eq!(out.to_display_string(), "HEY");
    }
}

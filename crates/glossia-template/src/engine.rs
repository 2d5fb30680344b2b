//! Template engine.
//!
//! [`Engine`] ties the pieces together: loaders supply template source, the
//! lexer and parser turn it into a node tree, and rendering walks that tree
//! against a [`Context`]. The engine owns its filter and library registries,
//! so two engines can carry different filter sets side by side. The review
//! library ships installed on every engine.

use std::collections::HashMap;
use std::path::PathBuf;

use glossia_core::error::GlossiaError;
use glossia_core::settings::Settings;

use crate::context::{Context, ContextValue};
use crate::filters::FilterRegistry;
use crate::lexer;
use crate::library::{Library, LibraryRegistry};
use crate::loaders::{FileSystemLoader, StringLoader, TemplateLoader};
use crate::parser::{self, Node, Template};
use crate::reviewtags;

/// The engine surface the renderer and filters see.
///
/// Breaks the dependency cycle between the parser, which needs to render
/// includes and apply filters, and the engine that owns the registries.
pub trait TemplateHost: Send + Sync {
    /// Renders a named template with the given context.
    fn render_template(&self, name: &str, context: &mut Context)
        -> Result<String, GlossiaError>;

    /// Returns whether a template with this name can be loaded.
    fn has_template(&self, name: &str) -> bool;

    /// The host's filter registry.
    fn filters(&self) -> &FilterRegistry;

    /// The host's library registry.
    fn libraries(&self) -> &LibraryRegistry;
}

/// The template engine.
///
/// # Examples
///
/// ```
/// use glossia_template::engine::Engine;
/// use glossia_template::context::{Context, ContextValue};
///
/// let engine = Engine::new();
/// engine.add_string_template("row.html", "{% increment row %}: {{ text }}");
///
/// let mut ctx = Context::new();
/// ctx.set("text", ContextValue::from("Hello"));
///
/// let result = engine.render_to_string("row.html", &mut ctx).unwrap();
/// assert_eq!(result, "1: Hello");
/// ```
pub struct Engine {
    loaders: Vec<Box<dyn TemplateLoader>>,
    string_loader: StringLoader,
    auto_escape: bool,
    filters: FilterRegistry,
    libraries: LibraryRegistry,
}

impl Engine {
    /// Creates an engine with built-in filters and the review library.
    pub fn new() -> Self {
        let mut filters = FilterRegistry::with_builtins();
        let mut libraries = LibraryRegistry::new();
        libraries.install(reviewtags::library(), &mut filters);

        Self {
            loaders: Vec::new(),
            string_loader: StringLoader::new(),
            auto_escape: true,
            filters,
            libraries,
        }
    }

    /// Creates an engine configured from settings: template directories
    /// become a filesystem loader and the auto-escape default is applied.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut engine = Self::new();
        if !settings.template_dirs.is_empty() {
            engine.set_dirs(settings.template_dirs.clone());
        }
        engine.auto_escape = settings.auto_escape;
        engine
    }

    /// Sets the template search directories.
    pub fn set_dirs(&mut self, dirs: Vec<PathBuf>) {
        self.loaders
            .insert(0, Box::new(FileSystemLoader::new(dirs)));
    }

    /// Appends a template loader.
    pub fn add_loader(&mut self, loader: Box<dyn TemplateLoader>) {
        self.loaders.push(loader);
    }

    /// Sets the auto-escape default for rendered templates.
    pub fn set_auto_escape(&mut self, enabled: bool) {
        self.auto_escape = enabled;
    }

    /// Installs a tag library on this engine.
    pub fn install_library(&mut self, library: Library) {
        self.libraries.install(library, &mut self.filters);
    }

    /// Adds an in-memory template.
    pub fn add_string_template(&self, name: &str, source: &str) {
        self.string_loader.add(name, source);
    }

    fn load_source(&self, name: &str) -> Result<String, GlossiaError> {
        if let Ok(source) = self.string_loader.load(name) {
            return Ok(source);
        }
        for loader in &self.loaders {
            if let Ok(source) = loader.load(name) {
                return Ok(source);
            }
        }
        Err(GlossiaError::TemplateDoesNotExist(name.to_string()))
    }

    /// Loads and parses a template by name.
    ///
    /// # Errors
    ///
    /// Returns `TemplateDoesNotExist` when no loader has the template and
    /// `TemplateSyntaxError` when its source does not parse.
    pub fn get_template(&self, name: &str) -> Result<Template, GlossiaError> {
        let source = self.load_source(name)?;
        let tokens = lexer::tokenize(&source)?;
        parser::parse(name, &tokens, &self.libraries)
    }

    /// Renders a template by name with the given context.
    ///
    /// # Errors
    ///
    /// Propagates loading, parsing, and rendering failures.
    pub fn render_to_string(
        &self,
        name: &str,
        context: &mut Context,
    ) -> Result<String, GlossiaError> {
        let span = glossia_core::logging::render_span(name);
        let _guard = span.enter();

        context.set_auto_escape(self.auto_escape);
        let template = self.get_template(name)?;
        let output = self.render_parsed(&template, context)?;
        tracing::debug!(bytes = output.len(), "rendered template");
        Ok(output)
    }

    fn render_parsed(
        &self,
        template: &Template,
        context: &mut Context,
    ) -> Result<String, GlossiaError> {
        match &template.parent {
            Some(parent_name) => {
                let overrides = collect_blocks(&template.nodes);
                self.render_with_parent(parent_name, overrides, context)
            }
            None => parser::render_nodes(&template.nodes, context, self),
        }
    }

    /// Walks the inheritance chain upward, merging block overrides as it
    /// goes (nearest descendant wins), then renders the root template.
    fn render_with_parent(
        &self,
        parent_name: &str,
        overrides: HashMap<String, Vec<Node>>,
        context: &mut Context,
    ) -> Result<String, GlossiaError> {
        let parent = self.get_template(parent_name)?;

        match &parent.parent {
            Some(grandparent_name) => {
                let mut merged = collect_blocks(&parent.nodes);
                merged.extend(overrides);
                self.render_with_parent(grandparent_name, merged, context)
            }
            None => self.render_blocks(&parent.nodes, &overrides, context),
        }
    }

    fn render_blocks(
        &self,
        nodes: &[Node],
        overrides: &HashMap<String, Vec<Node>>,
        context: &mut Context,
    ) -> Result<String, GlossiaError> {
        let mut output = String::new();

        for node in nodes {
            match node {
                Node::BlockDef { name, content } => {
                    if let Some(replacement) = overrides.get(name) {
                        let parent_rendered =
                            parser::render_nodes(content, context, self)?;
                        context.push();
                        let mut block = HashMap::new();
                        block.insert(
                            "super".to_string(),
                            ContextValue::SafeString(parent_rendered),
                        );
                        context.set("block", ContextValue::Dict(block));
                        let result = parser::render_nodes(replacement, context, self);
                        context.pop();
                        output.push_str(&result?);
                    } else {
                        output.push_str(&parser::render_nodes(content, context, self)?);
                    }
                }
                Node::Extends { .. } => {}
                other => {
                    output.push_str(&parser::render_nodes(
                        std::slice::from_ref(other),
                        context,
                        self,
                    )?);
                }
            }
        }

        Ok(output)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateHost for Engine {
    fn render_template(
        &self,
        name: &str,
        context: &mut Context,
    ) -> Result<String, GlossiaError> {
        let template = self.get_template(name)?;
        self.render_parsed(&template, context)
    }

    fn has_template(&self, name: &str) -> bool {
        self.string_loader.exists(name) || self.loaders.iter().any(|l| l.exists(name))
    }

    fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    fn libraries(&self) -> &LibraryRegistry {
        &self.libraries
    }
}

/// Collects block definitions into a name to content map. Blocks extracted
/// from an extending template become the overrides for its parent.
fn collect_blocks(nodes: &[Node]) -> HashMap<String, Vec<Node>> {
    let mut blocks = HashMap::new();
    for node in nodes {
        if let Node::BlockDef { name, content } = node {
            blocks.insert(name.clone(), clone_nodes(content));
        }
    }
    blocks
}

fn clone_nodes(nodes: &[Node]) -> Vec<Node> {
    // Node is not Clone because Counter slots must stay shared; rebuild the
    // tree reusing the same Arcs instead.
    nodes.iter().map(clone_node).collect()
}

fn clone_node(node: &Node) -> Node {
    match node {
        Node::Text(t) => Node::Text(t.clone()),
        Node::Variable {
            expression,
            filters,
        } => Node::Variable {
            expression: expression.clone(),
            filters: filters.clone(),
        },
        Node::Extends { parent } => Node::Extends {
            parent: parent.clone(),
        },
        Node::BlockDef { name, content } => Node::BlockDef {
            name: name.clone(),
            content: clone_nodes(content),
        },
        Node::If { branches } => Node::If {
            branches: branches
                .iter()
                .map(|(c, b)| (c.clone(), clone_nodes(b)))
                .collect(),
        },
        Node::For {
            loop_vars,
            iterable,
            body,
            empty_body,
        } => Node::For {
            loop_vars: loop_vars.clone(),
            iterable: iterable.clone(),
            body: clone_nodes(body),
            empty_body: clone_nodes(empty_body),
        },
        Node::With { assignments, body } => Node::With {
            assignments: assignments.clone(),
            body: clone_nodes(body),
        },
        Node::Include {
            template_name,
            extra_context,
            only,
        } => Node::Include {
            template_name: template_name.clone(),
            extra_context: extra_context.clone(),
            only: *only,
        },
        Node::TryInclude {
            template_name,
            extra_context,
            only,
        } => Node::TryInclude {
            template_name: template_name.clone(),
            extra_context: extra_context.clone(),
            only: *only,
        },
        Node::Counter { name, count } => Node::Counter {
            name: name.clone(),
            count: std::sync::Arc::clone(count),
        },
        Node::Comment => Node::Comment,
        Node::Autoescape { enabled, body } => Node::Autoescape {
            enabled: *enabled,
            body: clone_nodes(body),
        },
        Node::SimpleTag { name, args } => Node::SimpleTag {
            name: name.clone(),
            args: args.clone(),
        },
    }
}

//! # glossia-template
//!
//! Template engine for the glossia translation-review tool. Provides a
//! Django-style template language (variables, filter chains, block tags,
//! inheritance) together with the review-specific tags and filters: the
//! `increment` named counter tag, the `try_include` tag, and the `review`
//! filter library (`format_message`, `is_fuzzy`, `template_exists`, and the
//! numeric helpers).
//!
//! ## Quick start
//!
//! ```
//! use glossia_template::context::{Context, ContextValue};
//! use glossia_template::engine::Engine;
//!
//! let engine = Engine::new();
//! engine.add_string_template("row.html", "{% increment row %}: {{ text }}");
//!
//! let mut ctx = Context::new();
//! ctx.set("text", ContextValue::from("Hello"));
//! let out = engine.render_to_string("row.html", &mut ctx).unwrap();
//! assert_eq!(out, "1: Hello");
//! ```

pub mod context;
pub mod engine;
pub mod filters;
pub mod lexer;
pub mod library;
pub mod loaders;
pub mod parser;
pub mod reviewtags;

pub use context::{Context, ContextValue};
pub use engine::{Engine, TemplateHost};
pub use library::Library;

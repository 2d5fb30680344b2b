//! # glossia-core
//!
//! Core types for the glossia translation-review tool: error types, settings,
//! logging setup, and the translation message catalog.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Tool settings with TOML loading
//! - [`logging`] - Tracing-based logging integration
//! - [`catalog`] - Translation messages and review statistics

pub mod catalog;
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the most commonly used types at the crate root.
pub use catalog::{Message, MessageCatalog};
pub use error::{GlossiaError, GlossiaResult};
pub use settings::Settings;

//! The review tag library.
//!
//! Filters used by translation review templates: `format_message` renders a
//! catalog message for display with its placeholders highlighted,
//! `lines_count` sizes the edit box for it, `is_fuzzy` tests a message's
//! review state, `template_exists` probes the engine's loaders, and `mult`,
//! `minus`, and `gt` do arithmetic that degrades quietly on non-numeric
//! input instead of failing a whole page render.

use std::sync::{Arc, OnceLock};

use glossia_core::catalog::FUZZY_FLAG;
use glossia_core::error::GlossiaError;
use regex::Regex;

use crate::context::{escape_html, ContextValue};
use crate::filters::{Filter, FilterEnv};
use crate::library::Library;

/// Matches printf-style placeholders (`%s`, `%d`, `%(name)s`) and brace
/// placeholders (`{name}`).
fn placeholder_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(%(\([^\s\)]*\))?[sd]|\{[\w\d_]+?\})").unwrap())
}

/// Builds the review library. Installed on every [`Engine`] by default and
/// loadable in templates with `{% load review %}`.
///
/// [`Engine`]: crate::engine::Engine
pub fn library() -> Library {
    Library::new("review")
        .with_filter(Arc::new(FormatMessageFilter))
        .with_filter(Arc::new(LinesCountFilter))
        .with_filter(Arc::new(IsFuzzyFilter))
        .with_filter(Arc::new(TemplateExistsFilter))
        .with_filter(Arc::new(MultFilter))
        .with_filter(Arc::new(MinusFilter))
        .with_filter(Arc::new(GtFilter))
}

/// Prepares a message string for HTML display.
///
/// Escapes the text, turns literal `\n` sequences (as stored in catalog
/// files) into `<br />` line breaks, and wraps each placeholder in a
/// `<code>` element. The result is marked safe since the only markup in it
/// is the markup added here.
struct FormatMessageFilter;
impl Filter for FormatMessageFilter {
    fn name(&self) -> &'static str {
        "format_message"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let escaped = escape_html(&value.to_display_string()).replace("\\n", "<br />\n");
        let highlighted = placeholder_rx()
            .replace_all(&escaped, "<code>$1</code>")
            .into_owned();
        Ok(ContextValue::SafeString(highlighted))
    }
}

/// Estimates the number of edit-box rows a message needs: one, plus one
/// more per 50 characters of each line.
struct LinesCountFilter;
impl Filter for LinesCountFilter {
    fn name(&self) -> &'static str {
        "lines_count"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let text = value.to_display_string();
        let extra: i64 = text
            .split('\n')
            .map(|line| (line.chars().count() / 50) as i64)
            .sum();
        Ok(ContextValue::Integer(1 + extra))
    }
}

/// True when a message value carries the fuzzy flag.
///
/// Expects the dict shape produced by converting a catalog
/// [`Message`](glossia_core::catalog::Message) into a context value; any
/// other input is not fuzzy.
struct IsFuzzyFilter;
impl Filter for IsFuzzyFilter {
    fn name(&self) -> &'static str {
        "is_fuzzy"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let fuzzy = match value {
            ContextValue::Dict(map) => match map.get("flags") {
                Some(ContextValue::List(flags)) => flags
                    .iter()
                    .any(|flag| flag.as_str() == Some(FUZZY_FLAG)),
                _ => false,
            },
            _ => false,
        };
        Ok(ContextValue::Bool(fuzzy))
    }
}

/// True when the hosting engine can load the named template. False without
/// a host, so the filter stays usable in detached contexts.
struct TemplateExistsFilter;
impl Filter for TemplateExistsFilter {
    fn name(&self) -> &'static str {
        "template_exists"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let name = value.to_display_string();
        let exists = env.host().is_some_and(|host| host.has_template(&name));
        Ok(ContextValue::Bool(exists))
    }
}

/// Integer multiplication, yielding 0 when either side is not numeric.
struct MultFilter;
impl Filter for MultFilter {
    fn name(&self) -> &'static str {
        "mult"
    }
    fn apply(
        &self,
        value: &ContextValue,
        args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let result = match (value.as_integer(), args.first().and_then(ContextValue::as_integer)) {
            (Some(l), Some(r)) => l * r,
            _ => 0,
        };
        Ok(ContextValue::Integer(result))
    }
}

/// Integer subtraction, yielding 0 when either side is not numeric.
struct MinusFilter;
impl Filter for MinusFilter {
    fn name(&self) -> &'static str {
        "minus"
    }
    fn apply(
        &self,
        value: &ContextValue,
        args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let result = match (value.as_integer(), args.first().and_then(ContextValue::as_integer)) {
            (Some(l), Some(r)) => l - r,
            _ => 0,
        };
        Ok(ContextValue::Integer(result))
    }
}

/// Integer greater-than, false when either side is not numeric.
struct GtFilter;
impl Filter for GtFilter {
    fn name(&self) -> &'static str {
        "gt"
    }
    fn apply(
        &self,
        value: &ContextValue,
        args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let result = match (value.as_integer(), args.first().and_then(ContextValue::as_integer)) {
            (Some(l), Some(r)) => l > r,
            _ => false,
        };
        Ok(ContextValue::Bool(result))
    }
}

//! Built-in template filters.
//!
//! Each filter is a small struct implementing [`Filter`], registered by name
//! in a [`FilterRegistry`]. Filters receive a [`FilterEnv`] so the few that
//! need engine services (such as `template_exists`) can reach the hosting
//! engine without every filter carrying that dependency in its signature.

use std::collections::HashMap;
use std::sync::Arc;

use glossia_core::error::GlossiaError;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::context::{escape_html, ContextValue};
use crate::engine::TemplateHost;

/// The environment a filter runs in.
///
/// Carries an optional handle to the hosting engine. Filters that only
/// transform their input ignore it.
pub struct FilterEnv<'a> {
    host: Option<&'a dyn TemplateHost>,
}

impl<'a> FilterEnv<'a> {
    /// An environment bound to a hosting engine.
    pub fn with_host(host: &'a dyn TemplateHost) -> Self {
        Self { host: Some(host) }
    }

    /// An environment with no engine attached. Host-dependent filters
    /// return their fallback value under it.
    pub const fn detached() -> Self {
        Self { host: None }
    }

    /// Returns the hosting engine, if any.
    pub fn host(&self) -> Option<&'a dyn TemplateHost> {
        self.host
    }
}

/// A template filter.
pub trait Filter: Send + Sync {
    /// Returns the filter name.
    fn name(&self) -> &'static str;

    /// Applies the filter to a value with the given arguments.
    fn apply(
        &self,
        value: &ContextValue,
        args: &[ContextValue],
        env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError>;
}

/// A registry of template filters, owned by the engine.
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Creates a registry preloaded with the built-in filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LowerFilter));
        registry.register(Arc::new(UpperFilter));
        registry.register(Arc::new(CapfirstFilter));
        registry.register(Arc::new(EscapeFilter));
        registry.register(Arc::new(SafeFilter));
        registry.register(Arc::new(DefaultFilter));
        registry.register(Arc::new(LengthFilter));
        registry.register(Arc::new(JoinFilter));
        registry.register(Arc::new(TruncatecharsFilter));
        registry.register(Arc::new(PluralizeFilter));
        registry.register(Arc::new(YesnoFilter));
        registry.register(Arc::new(LinebreaksbrFilter));
        registry.register(Arc::new(UrlencodeFilter));
        registry.register(Arc::new(AddFilter));
        registry
    }

    /// Registers a filter under its own name.
    pub fn register(&mut self, filter: Arc<dyn Filter>) {
        self.filters.insert(filter.name().to_string(), filter);
    }

    /// Returns whether a filter with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Applies a named filter to a value.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSyntaxError` when the name is not registered.
    pub fn apply(
        &self,
        name: &str,
        value: &ContextValue,
        args: &[ContextValue],
        env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let filter = self.filters.get(name).ok_or_else(|| {
            GlossiaError::TemplateSyntaxError(format!("Unknown filter: '{name}'"))
        })?;
        filter.apply(value, args, env)
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

struct LowerFilter;
impl Filter for LowerFilter {
    fn name(&self) -> &'static str {
        "lower"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        Ok(ContextValue::String(
            value.to_display_string().to_lowercase(),
        ))
    }
}

struct UpperFilter;
impl Filter for UpperFilter {
    fn name(&self) -> &'static str {
        "upper"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        Ok(ContextValue::String(
            value.to_display_string().to_uppercase(),
        ))
    }
}

struct CapfirstFilter;
impl Filter for CapfirstFilter {
    fn name(&self) -> &'static str {
        "capfirst"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let s = value.to_display_string();
        let mut chars = s.chars();
        let result = match chars.next() {
            Some(c) => format!("{}{}", c.to_uppercase(), chars.as_str()),
            None => String::new(),
        };
        Ok(ContextValue::String(result))
    }
}

struct EscapeFilter;
impl Filter for EscapeFilter {
    fn name(&self) -> &'static str {
        "escape"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        Ok(ContextValue::String(escape_html(
            &value.to_display_string(),
        )))
    }
}

struct SafeFilter;
impl Filter for SafeFilter {
    fn name(&self) -> &'static str {
        "safe"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        Ok(ContextValue::SafeString(value.to_display_string()))
    }
}

struct DefaultFilter;
impl Filter for DefaultFilter {
    fn name(&self) -> &'static str {
        "default"
    }
    fn apply(
        &self,
        value: &ContextValue,
        args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        if value.is_truthy() {
            Ok(value.clone())
        } else {
            Ok(args.first().cloned().unwrap_or(ContextValue::None))
        }
    }
}

struct LengthFilter;
impl Filter for LengthFilter {
    fn name(&self) -> &'static str {
        "length"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let len = match value {
            ContextValue::String(s) | ContextValue::SafeString(s) => s.chars().count(),
            ContextValue::List(l) => l.len(),
            ContextValue::Dict(d) => d.len(),
            _ => 0,
        };
        Ok(ContextValue::Integer(len as i64))
    }
}

struct JoinFilter;
impl Filter for JoinFilter {
    fn name(&self) -> &'static str {
        "join"
    }
    fn apply(
        &self,
        value: &ContextValue,
        args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let sep = args
            .first()
            .map(ContextValue::to_display_string)
            .unwrap_or_default();
        match value {
            ContextValue::List(items) => {
                let parts: Vec<String> =
                    items.iter().map(ContextValue::to_display_string).collect();
                Ok(ContextValue::String(parts.join(&sep)))
            }
            other => Ok(other.clone()),
        }
    }
}

struct TruncatecharsFilter;
impl Filter for TruncatecharsFilter {
    fn name(&self) -> &'static str {
        "truncatechars"
    }
    fn apply(
        &self,
        value: &ContextValue,
        args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let s = value.to_display_string();
        let max_len = args.first().and_then(ContextValue::as_integer).unwrap_or(0) as usize;
        let chars: Vec<char> = s.chars().collect();
        if max_len == 0 || chars.len() <= max_len {
            return Ok(ContextValue::String(s));
        }
        if max_len <= 1 {
            return Ok(ContextValue::String("\u{2026}".to_string()));
        }
        let truncated: String = chars[..max_len - 1].iter().collect();
        Ok(ContextValue::String(format!("{truncated}\u{2026}")))
    }
}

struct PluralizeFilter;
impl Filter for PluralizeFilter {
    fn name(&self) -> &'static str {
        "pluralize"
    }
    fn apply(
        &self,
        value: &ContextValue,
        args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let count = value.as_integer().unwrap_or(0);
        let suffixes = args
            .first()
            .map(ContextValue::to_display_string)
            .unwrap_or_else(|| "s".to_string());
        let (singular, plural) = match suffixes.split_once(',') {
            Some((s, p)) => (s.to_string(), p.to_string()),
            None => (String::new(), suffixes),
        };
        Ok(ContextValue::String(if count == 1 {
            singular
        } else {
            plural
        }))
    }
}

struct YesnoFilter;
impl Filter for YesnoFilter {
    fn name(&self) -> &'static str {
        "yesno"
    }
    fn apply(
        &self,
        value: &ContextValue,
        args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let choices = args
            .first()
            .map(ContextValue::to_display_string)
            .unwrap_or_else(|| "yes,no".to_string());
        let parts: Vec<&str> = choices.split(',').collect();
        let yes = parts.first().copied().unwrap_or("yes");
        let no = parts.get(1).copied().unwrap_or("no");
        let maybe = parts.get(2).copied().unwrap_or(no);

        let chosen = match value {
            ContextValue::None => maybe,
            v if v.is_truthy() => yes,
            _ => no,
        };
        Ok(ContextValue::String(chosen.to_string()))
    }
}

struct LinebreaksbrFilter;
impl Filter for LinebreaksbrFilter {
    fn name(&self) -> &'static str {
        "linebreaksbr"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let s = value.to_display_string().replace('\n', "<br />\n");
        Ok(ContextValue::SafeString(s))
    }
}

struct UrlencodeFilter;
impl Filter for UrlencodeFilter {
    fn name(&self) -> &'static str {
        "urlencode"
    }
    fn apply(
        &self,
        value: &ContextValue,
        _args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let s = value.to_display_string();
        let encoded = utf8_percent_encode(&s, NON_ALPHANUMERIC).to_string();
        Ok(ContextValue::String(encoded))
    }
}

struct AddFilter;
impl Filter for AddFilter {
    fn name(&self) -> &'static str {
        "add"
    }
    fn apply(
        &self,
        value: &ContextValue,
        args: &[ContextValue],
        _env: &FilterEnv<'_>,
    ) -> Result<ContextValue, GlossiaError> {
        let arg = args.first().cloned().unwrap_or(ContextValue::Integer(0));
        if let (Some(l), Some(r)) = (value.as_integer(), arg.as_integer()) {
            return Ok(ContextValue::Integer(l + r));
        }
        Ok(ContextValue::String(format!(
            "{}{}",
            value.to_display_string(),
            arg.to_display_string()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, value: ContextValue, args: &[ContextValue]) -> ContextValue {
        FilterRegistry::with_builtins()
            .apply(name, &value, args, &FilterEnv::detached())
            .unwrap()
    }

    #[test]
    fn test_case_filters() {
        assert_eq!(
            apply("lower", ContextValue::from("HeLLo"), &[]).to_display_string(),
            "hello"
        );
        assert_eq!(
            apply("upper", ContextValue::from("hi"), &[]).to_display_string(),
            "HI"
        );
        assert_eq!(
            apply("capfirst", ContextValue::from("hello"), &[]).to_display_string(),
            "Hello"
        );
    }

    #[test]
    fn test_escape_and_safe() {
        assert_eq!(
            apply("escape", ContextValue::from("<b>"), &[]).to_display_string(),
            "&lt;b&gt;"
        );
        assert!(apply("safe", ContextValue::from("<b>"), &[]).is_safe());
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(
            apply(
                "default",
                ContextValue::from(""),
                &[ContextValue::from("fallback")]
            )
            .to_display_string(),
            "fallback"
        );
        assert_eq!(
            apply(
                "default",
                ContextValue::from("set"),
                &[ContextValue::from("fallback")]
            )
            .to_display_string(),
            "set"
        );
    }

    #[test]
    fn test_length_filter() {
        assert_eq!(
            apply("length", ContextValue::from("abcd"), &[]),
            ContextValue::Integer(4)
        );
        assert_eq!(
            apply("length", ContextValue::from(vec![1i64, 2]), &[]),
            ContextValue::Integer(2)
        );
    }

    #[test]
    fn test_join_filter() {
        let list = ContextValue::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            apply("join", list, &[ContextValue::from(", ")]).to_display_string(),
            "a, b"
        );
    }

    #[test]
    fn test_truncatechars() {
        assert_eq!(
            apply(
                "truncatechars",
                ContextValue::from("abcdef"),
                &[ContextValue::Integer(4)]
            )
            .to_display_string(),
            "abc\u{2026}"
        );
        assert_eq!(
            apply(
                "truncatechars",
                ContextValue::from("ab"),
                &[ContextValue::Integer(4)]
            )
            .to_display_string(),
            "ab"
        );
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(
            apply("pluralize", ContextValue::Integer(1), &[]).to_display_string(),
            ""
        );
        assert_eq!(
            apply("pluralize", ContextValue::Integer(3), &[]).to_display_string(),
            "s"
        );
        assert_eq!(
            apply(
                "pluralize",
                ContextValue::Integer(2),
                &[ContextValue::from("y,ies")]
            )
            .to_display_string(),
            "ies"
        );
    }

    #[test]
    fn test_yesno() {
        assert_eq!(
            apply(
                "yesno",
                ContextValue::Bool(true),
                &[ContextValue::from("ja,nein")]
            )
            .to_display_string(),
            "ja"
        );
        assert_eq!(
            apply("yesno", ContextValue::None, &[ContextValue::from("y,n,m")])
                .to_display_string(),
            "m"
        );
    }

    #[test]
    fn test_linebreaksbr_is_safe() {
        let result = apply("linebreaksbr", ContextValue::from("a\nb"), &[]);
        assert!(result.is_safe());
        assert_eq!(result.to_display_string(), "a<br />\nb");
    }

    #[test]
    fn test_urlencode() {
        assert_eq!(
            apply("urlencode", ContextValue::from("a b&c"), &[]).to_display_string(),
            "a%20b%26c"
        );
    }

    #[test]
    fn test_add() {
        assert_eq!(
            apply("add", ContextValue::Integer(2), &[ContextValue::Integer(3)]),
            ContextValue::Integer(5)
        );
        assert_eq!(
            apply("add", ContextValue::from("a"), &[ContextValue::from("b")])
                .to_display_string(),
            "ab"
        );
    }

    #[test]
    fn test_unknown_filter_errors() {
        let registry = FilterRegistry::with_builtins();
        let result = registry.apply(
            "nope",
            &ContextValue::None,
            &[],
            &FilterEnv::detached(),
        );
        assert!(result.is_err());
    }
}

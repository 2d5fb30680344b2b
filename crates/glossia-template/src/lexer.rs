//! Template lexer.
//!
//! Splits raw template source into [`Token`]s: literal text, variable
//! expressions (`{{ }}`), block tags (`{% %}`), and comments (`{# #}`).
//! Block tag arguments are split on whitespace with quoted strings kept
//! intact, so `{% try_include "partials/row.html" %}` yields a single
//! path argument.

use glossia_core::error::GlossiaError;

/// A token produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text between tags.
    Text(String),
    /// A `{{ expression }}` variable, possibly with filters.
    Variable(String),
    /// A `{% name args... %}` block tag.
    Block(String, Vec<String>),
    /// A `{# ... #}` comment.
    Comment(String),
}

#[derive(Debug, Clone, Copy)]
enum Delimiter {
    Variable,
    Block,
    Comment,
}

impl Delimiter {
    const fn open(self) -> &'static str {
        match self {
            Self::Variable => "{{",
            Self::Block => "{%",
            Self::Comment => "{#",
        }
    }

    const fn close(self) -> &'static str {
        match self {
            Self::Variable => "}}",
            Self::Block => "%}",
            Self::Comment => "#}",
        }
    }
}

const DELIMITERS: [Delimiter; 3] = [Delimiter::Variable, Delimiter::Block, Delimiter::Comment];

/// Tokenizes template source into a sequence of [`Token`]s.
///
/// # Errors
///
/// Returns a `TemplateSyntaxError` when a tag is opened but never closed.
pub fn tokenize(source: &str) -> Result<Vec<Token>, GlossiaError> {
    let mut tokens = Vec::new();
    let mut rest = source;

    while let Some((offset, delim)) = next_opening(rest) {
        if offset > 0 {
            tokens.push(Token::Text(rest[..offset].to_string()));
        }
        let body_start = offset + delim.open().len();
        let body = &rest[body_start..];
        let Some(end) = body.find(delim.close()) else {
            return Err(GlossiaError::TemplateSyntaxError(format!(
                "Unclosed '{}' tag, expected '{}'",
                delim.open(),
                delim.close()
            )));
        };
        let content = body[..end].trim();
        tokens.push(match delim {
            Delimiter::Variable => Token::Variable(content.to_string()),
            Delimiter::Block => block_token(content),
            Delimiter::Comment => Token::Comment(content.to_string()),
        });
        rest = &body[end + delim.close().len()..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }

    Ok(tokens)
}

/// Finds the closest tag opening in `s`, if any.
fn next_opening(s: &str) -> Option<(usize, Delimiter)> {
    DELIMITERS
        .iter()
        .filter_map(|&d| s.find(d.open()).map(|pos| (pos, d)))
        .min_by_key(|&(pos, _)| pos)
}

fn block_token(content: &str) -> Token {
    let mut parts = split_tag_args(content).into_iter();
    let name = parts.next().unwrap_or_default();
    Token::Block(name, parts.collect())
}

/// Splits tag content on whitespace, keeping quoted runs together.
pub fn split_tag_args(content: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in content.chars() {
        match ch {
            '\'' | '"' => {
                match quote {
                    None => quote = Some(ch),
                    Some(q) if q == ch => quote = None,
                    Some(_) => {}
                }
                current.push(ch);
            }
            c if c.is_whitespace() && quote.is_none() => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

//! Translation messages and catalogs.
//!
//! A [`MessageCatalog`] holds the translation entries for a single language,
//! in source order. Each [`Message`] carries gettext-style review flags; the
//! `fuzzy` flag marks a translation that needs review.
//!
//! ## JSON Format
//!
//! ```json
//! {
//!   "language": "de",
//!   "messages": [
//!     { "msgid": "Hello", "msgstr": "Hallo" },
//!     { "msgid": "Goodbye", "msgstr": "Tschuess", "flags": ["fuzzy"] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GlossiaError, GlossiaResult};

/// The flag marking a translation as needing review.
pub const FUZZY_FLAG: &str = "fuzzy";

/// A single translation entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    /// The source string.
    pub msgid: String,
    /// The translated string. Empty means untranslated.
    #[serde(default)]
    pub msgstr: String,
    /// Review flags (e.g. "fuzzy").
    #[serde(default)]
    pub flags: Vec<String>,
}

impl Message {
    /// Creates a new untranslated message.
    pub fn new(msgid: impl Into<String>) -> Self {
        Self {
            msgid: msgid.into(),
            ..Self::default()
        }
    }

    /// Sets the translation.
    #[must_use]
    pub fn with_msgstr(mut self, msgstr: impl Into<String>) -> Self {
        self.msgstr = msgstr.into();
        self
    }

    /// Adds a review flag.
    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Returns `true` if this message is flagged as needing review.
    pub fn is_fuzzy(&self) -> bool {
        self.flags.iter().any(|f| f == FUZZY_FLAG)
    }

    /// Returns `true` if this message has a non-empty translation.
    pub fn is_translated(&self) -> bool {
        !self.msgstr.is_empty()
    }
}

/// Review statistics for a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogStats {
    /// Total number of messages.
    pub total: usize,
    /// Messages with a non-fuzzy, non-empty translation.
    pub translated: usize,
    /// Messages flagged for review.
    pub fuzzy: usize,
    /// Messages without any translation.
    pub untranslated: usize,
}

/// An ordered collection of translation messages for one language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageCatalog {
    /// The target language code.
    pub language: String,
    /// The messages, in source order.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl MessageCatalog {
    /// Creates a new empty catalog for the given language.
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            messages: Vec::new(),
        }
    }

    /// Parses a catalog from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the JSON is invalid.
    pub fn from_json(source: &str) -> GlossiaResult<Self> {
        serde_json::from_str(source)
            .map_err(|e| GlossiaError::CatalogError(format!("Invalid catalog JSON: {e}")))
    }

    /// Appends a message. An existing entry with the same msgid is replaced.
    pub fn add(&mut self, message: Message) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.msgid == message.msgid) {
            *existing = message;
        } else {
            self.messages.push(message);
        }
    }

    /// Looks up a message by its source string.
    pub fn get(&self, msgid: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.msgid == msgid)
    }

    /// Returns the number of messages in the catalog.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the catalog has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Computes review statistics.
    ///
    /// Fuzzy entries count as fuzzy even when they carry a translation; the
    /// review workflow treats them as unconfirmed.
    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            total: self.messages.len(),
            translated: 0,
            fuzzy: 0,
            untranslated: 0,
        };

        for message in &self.messages {
            if message.is_fuzzy() {
                stats.fuzzy += 1;
            } else if message.is_translated() {
                stats.translated += 1;
            } else {
                stats.untranslated += 1;
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_fuzzy() {
        let msg = Message::new("Hello").with_msgstr("Hallo").with_flag("fuzzy");
        assert!(msg.is_fuzzy());
        assert!(msg.is_translated());

        let msg = Message::new("Hello").with_msgstr("Hallo");
        assert!(!msg.is_fuzzy());
    }

    #[test]
    fn test_message_untranslated() {
        let msg = Message::new("Hello");
        assert!(!msg.is_translated());
        assert!(!msg.is_fuzzy());
    }

    #[test]
    fn test_catalog_add_and_get() {
        let mut catalog = MessageCatalog::new("de");
        catalog.add(Message::new("Hello").with_msgstr("Hallo"));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("Hello").unwrap().msgstr, "Hallo");
        assert!(catalog.get("Goodbye").is_none());
    }

    #[test]
    fn test_catalog_add_replaces() {
        let mut catalog = MessageCatalog::new("de");
        catalog.add(Message::new("Hello").with_msgstr("Halo"));
        catalog.add(Message::new("Hello").with_msgstr("Hallo"));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("Hello").unwrap().msgstr, "Hallo");
    }

    #[test]
    fn test_catalog_stats() {
        let mut catalog = MessageCatalog::new("fr");
        catalog.add(Message::new("a").with_msgstr("A"));
        catalog.add(Message::new("b").with_msgstr("B").with_flag("fuzzy"));
        catalog.add(Message::new("c"));
        catalog.add(Message::new("d").with_msgstr("D"));

        let stats = catalog.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.translated, 2);
        assert_eq!(stats.fuzzy, 1);
        assert_eq!(stats.untranslated, 1);
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"{
            "language": "de",
            "messages": [
                { "msgid": "Hello", "msgstr": "Hallo" },
                { "msgid": "Goodbye", "msgstr": "Tschuess", "flags": ["fuzzy"] },
                { "msgid": "Yes" }
            ]
        }"#;

        let catalog = MessageCatalog::from_json(json).unwrap();
        assert_eq!(catalog.language, "de");
        assert_eq!(catalog.len(), 3);
        assert!(catalog.get("Goodbye").unwrap().is_fuzzy());
        assert!(!catalog.get("Yes").unwrap().is_translated());
    }

    #[test]
    fn test_catalog_from_json_invalid() {
        let result = MessageCatalog::from_json("not json");
        assert!(matches!(result, Err(GlossiaError::CatalogError(_))));
    }

    #[test]
    fn test_catalog_empty() {
        let catalog = MessageCatalog::new("es");
        assert!(catalog.is_empty());
        assert_eq!(catalog.stats().total, 0);
    }
}

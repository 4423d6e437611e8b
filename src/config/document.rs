//! The bot's JSON configuration document.
//!
//! The provisioner owns exactly one field of this document,
//! `notification.target_telegram_id`. Everything else belongs to the bot and
//! is carried through untouched, in its original order.

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use super::write_atomically;

const NOTIFICATION: &str = "notification";
const TARGET_ID: &str = "target_telegram_id";
const TARGET_USERNAME: &str = "target_bot_username";

/// Sections the bot refuses to start without.
const REQUIRED_SECTIONS: &[&str] = &[NOTIFICATION, "keywords", "rules"];

/// Errors that can occur while handling the configuration document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to read configuration document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Expected `{path}` to be a JSON object")]
    NotAnObject { path: String },

    #[error("No notification target: set notification.target_telegram_id or notification.target_bot_username")]
    NoTarget,

    #[error("notification.target_telegram_id must be an integer, found {found}")]
    InvalidTargetId { found: String },

    #[error("notification.target_bot_username must start with '@', found {found:?}")]
    InvalidTargetUsername { found: String },
}

/// Structured view over the bot's configuration document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotConfigDocument {
    root: Map<String, Value>,
}

impl BotConfigDocument {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or not an object.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        match serde_json::from_str(text)? {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(DocumentError::NotAnObject {
                path: "(root)".to_owned(),
            }),
        }
    }

    /// Loads a document from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Saves the document atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        write_atomically(path.as_ref(), &self.render()?, None)?;
        Ok(())
    }

    /// Renders the document with two-space indentation and a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String, DocumentError> {
        let mut text = serde_json::to_string_pretty(&self.root)?;
        text.push('\n');
        Ok(text)
    }

    /// Sets `notification.target_telegram_id`, creating `notification` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if `notification` exists but is not an object.
    pub fn set_target_telegram_id(&mut self, id: i64) -> Result<(), DocumentError> {
        let notification = self
            .root
            .entry(NOTIFICATION)
            .or_insert_with(|| Value::Object(Map::new()));

        let Value::Object(notification) = notification else {
            return Err(DocumentError::NotAnObject {
                path: NOTIFICATION.to_owned(),
            });
        };

        notification.insert(TARGET_ID.to_owned(), Value::from(id));
        Ok(())
    }

    /// Returns `notification.target_telegram_id` if it is an integer.
    #[must_use]
    pub fn target_telegram_id(&self) -> Option<i64> {
        self.notification()?.get(TARGET_ID)?.as_i64()
    }

    /// Gets a top-level field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Top-level keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    fn notification(&self) -> Option<&Map<String, Value>> {
        self.root.get(NOTIFICATION)?.as_object()
    }

    /// Checks the document the way the bot does at startup.
    ///
    /// Returns the names of missing sections the bot will also need. These
    /// are reported, not enforced.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification target is missing or malformed.
    pub fn validate(&self) -> Result<Vec<&'static str>, DocumentError> {
        let notification = match self.root.get(NOTIFICATION) {
            None => return Err(DocumentError::NoTarget),
            Some(Value::Object(n)) => n,
            Some(_) => {
                return Err(DocumentError::NotAnObject {
                    path: NOTIFICATION.to_owned(),
                });
            }
        };

        let target_id = notification.get(TARGET_ID).filter(|v| !v.is_null());
        let username = notification
            .get(TARGET_USERNAME)
            .filter(|v| !v.is_null() && v.as_str() != Some(""));

        if target_id.is_none() && username.is_none() {
            return Err(DocumentError::NoTarget);
        }

        if let Some(id) = target_id
            && !is_integer(id)
        {
            return Err(DocumentError::InvalidTargetId {
                found: id.to_string(),
            });
        }

        if let Some(username) = username {
            let valid = username
                .as_str()
                .is_some_and(|u| u.trim().starts_with('@'));
            if !valid {
                return Err(DocumentError::InvalidTargetUsername {
                    found: username.to_string(),
                });
            }
        }

        Ok(REQUIRED_SECTIONS
            .iter()
            .copied()
            .filter(|section| !self.root.contains_key(*section))
            .collect())
    }
}

/// The bot accepts integers and strings holding an integer.
fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_preserves_unrelated_fields() {
        let mut doc = BotConfigDocument::parse(r#"{"foo": "bar"}"#).unwrap();
        doc.set_target_telegram_id(-100_200_300).unwrap();

        assert_eq!(doc.get("foo"), Some(&Value::from("bar")));
        assert_eq!(doc.target_telegram_id(), Some(-100_200_300));
    }

    #[test]
    fn test_merge_keeps_unrelated_numbers_verbatim() {
        let text = r#"{"big": 123456789012345678901234567890, "ratio": 1e3, "price": 0.30000000000000004444}"#;
        let mut doc = BotConfigDocument::parse(text).unwrap();
        doc.set_target_telegram_id(-100_200_300).unwrap();

        let rendered = doc.render().unwrap();
        assert!(rendered.contains("\"big\": 123456789012345678901234567890"));
        assert!(rendered.contains("\"ratio\": 1e3"));
        assert!(rendered.contains("\"price\": 0.30000000000000004444"));
        assert!(rendered.contains("\"target_telegram_id\": -100200300"));
    }

    #[test]
    fn test_merge_keeps_field_order() {
        let text = r#"{
  "rules": {"min_details_required": 1},
  "notification": {"target_bot_username": "@leads_bot", "target_telegram_id": 1, "silent": true},
  "keywords": {"buy": ["куплю"]}
}"#;
        let mut doc = BotConfigDocument::parse(text).unwrap();
        doc.set_target_telegram_id(42).unwrap();

        assert_eq!(doc.keys().collect::<Vec<_>>(), ["rules", "notification", "keywords"]);

        let rendered = doc.render().unwrap();
        let username = rendered.find("target_bot_username").unwrap();
        let target = rendered.find("target_telegram_id").unwrap();
        let silent = rendered.find("silent").unwrap();
        assert!(username < target && target < silent);
        assert!(rendered.contains("\"target_telegram_id\": 42"));
        assert!(rendered.contains("куплю"));
    }

    #[test]
    fn test_render_is_stable() {
        let mut doc = BotConfigDocument::parse(r#"{"foo":"bar","n":{"a":1}}"#).unwrap();
        doc.set_target_telegram_id(7).unwrap();
        let first = doc.render().unwrap();

        let mut reparsed = BotConfigDocument::parse(&first).unwrap();
        reparsed.set_target_telegram_id(7).unwrap();
        assert_eq!(reparsed.render().unwrap(), first);
        assert!(first.ends_with("}\n"));
    }

    #[test]
    fn test_merge_rejects_non_object_notification() {
        let mut doc = BotConfigDocument::parse(r#"{"notification": "nope"}"#).unwrap();
        assert!(matches!(
            doc.set_target_telegram_id(1),
            Err(DocumentError::NotAnObject { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_non_object_root() {
        assert!(matches!(
            BotConfigDocument::parse("[1, 2]"),
            Err(DocumentError::NotAnObject { .. })
        ));
    }

    #[test]
    fn test_validate_requires_a_target() {
        let doc = BotConfigDocument::parse(r#"{"notification": {}}"#).unwrap();
        assert!(matches!(doc.validate(), Err(DocumentError::NoTarget)));
    }

    #[test]
    fn test_validate_accepts_username_target() {
        let doc = BotConfigDocument::parse(
            r#"{"notification": {"target_bot_username": "@my_leads_bot"}, "keywords": {}, "rules": {}}"#,
        )
        .unwrap();
        assert!(doc.validate().unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_username() {
        let mut doc = BotConfigDocument::parse(
            r#"{"notification": {"target_bot_username": "my_leads_bot"}}"#,
        )
        .unwrap();
        doc.set_target_telegram_id(5).unwrap();
        assert!(matches!(
            doc.validate(),
            Err(DocumentError::InvalidTargetUsername { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_integer_id() {
        let doc =
            BotConfigDocument::parse(r#"{"notification": {"target_telegram_id": 12.5}}"#).unwrap();
        assert!(matches!(
            doc.validate(),
            Err(DocumentError::InvalidTargetId { .. })
        ));
    }

    #[test]
    fn test_validate_reports_missing_sections() {
        let mut doc = BotConfigDocument::new();
        doc.set_target_telegram_id(1).unwrap();
        assert_eq!(doc.validate().unwrap(), vec!["keywords", "rules"]);
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"foo": "bar"}"#).unwrap();

        let mut doc = BotConfigDocument::load_from_file(&path).unwrap();
        doc.set_target_telegram_id(99).unwrap();
        doc.save_to_file(&path).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            saved,
            "{\n  \"foo\": \"bar\",\n  \"notification\": {\n    \"target_telegram_id\": 99\n  }\n}\n"
        );
    }
}

//! Secret file handling.
//!
//! The secret file is a flat list of `KEY=VALUE` lines read by the service
//! manager at startup. Values are never quoted, so only shell-safe
//! characters are accepted.

use std::path::Path;

use thiserror::Error;

use super::{SECRET_FILE_MODE, write_atomically};

/// Key for the Telegram API id.
pub const API_ID: &str = "API_ID";

/// Key for the Telegram API hash.
pub const API_HASH: &str = "API_HASH";

/// Key for the bot's session label.
pub const SESSION_NAME: &str = "SESSION_NAME";

/// Key for the bot's storage location.
pub const DB_PATH: &str = "DB_PATH";

/// Errors that can occur while reading or writing the secret file.
#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("Invalid secret key {key:?} (expected upper-case letters, digits and underscores)")]
    InvalidKey { key: String },

    #[error("Value for {key} contains characters that are not shell-safe")]
    UnsafeValue { key: String },

    #[error("Failed to access secret file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse secret file: {0}")]
    Parse(#[from] dotenvy::Error),
}

/// Returns true if `value` needs no quoting in a shell or environment file.
#[must_use]
pub fn is_shell_safe(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c))
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Ordered set of unique secret entries.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretFile {
    entries: Vec<(String, String)>,
}

impl std::fmt::Debug for SecretFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, _)| (k, "<redacted>")))
            .finish()
    }
}

impl SecretFile {
    /// Creates an empty secret file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing an existing entry in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed or the value is not shell-safe.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SecretsError> {
        if !is_valid_key(key) {
            return Err(SecretsError::InvalidKey { key: key.to_owned() });
        }
        if !is_shell_safe(value) {
            return Err(SecretsError::UnsafeValue { key: key.to_owned() });
        }

        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            value.clone_into(&mut entry.1);
        } else {
            self.entries.push((key.to_owned(), value.to_owned()));
        }
        Ok(())
    }

    /// Gets the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the file contents, one `KEY=VALUE` line per entry.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect()
    }

    /// Loads an existing secret file.
    ///
    /// Later duplicates of a key replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds
    /// entries this crate would refuse to write.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SecretsError> {
        let mut file = Self::new();
        for item in dotenvy::from_path_iter(path.as_ref())? {
            let (key, value) = item?;
            file.set(&key, &value)?;
        }
        Ok(file)
    }

    /// Writes the file atomically with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SecretsError> {
        write_atomically(path.as_ref(), &self.render(), Some(SECRET_FILE_MODE))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut file = SecretFile::new();
        file.set(API_ID, "1").unwrap();
        file.set(API_HASH, "abc").unwrap();
        file.set(API_ID, "2").unwrap();

        assert_eq!(file.len(), 2);
        assert_eq!(file.render(), "API_ID=2\nAPI_HASH=abc\n");
    }

    #[test]
    fn test_rejects_unsafe_values() {
        let mut file = SecretFile::new();
        assert!(matches!(
            file.set(SESSION_NAME, "two words"),
            Err(SecretsError::UnsafeValue { .. })
        ));
        assert!(matches!(
            file.set(API_HASH, "a$b"),
            Err(SecretsError::UnsafeValue { .. })
        ));
        assert!(file.is_empty());
    }

    #[test]
    fn test_rejects_bad_keys() {
        let mut file = SecretFile::new();
        assert!(matches!(
            file.set("api_id", "1"),
            Err(SecretsError::InvalidKey { .. })
        ));
        assert!(matches!(
            file.set("9LIVES", "1"),
            Err(SecretsError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_shell_safe_characters() {
        assert!(is_shell_safe("/opt/leadbot/leads.db"));
        assert!(is_shell_safe("0123abcdef"));
        assert!(!is_shell_safe(""));
        assert!(!is_shell_safe("it's"));
        assert!(!is_shell_safe("line\nbreak"));
    }

    #[test]
    fn test_debug_redacts_values() {
        let mut file = SecretFile::new();
        file.set(API_HASH, "supersecret").unwrap();
        let debug = format!("{file:?}");
        assert!(debug.contains("API_HASH"));
        assert!(!debug.contains("supersecret"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        let mut file = SecretFile::new();
        file.set(API_ID, "12345").unwrap();
        file.set(API_HASH, "0123456789abcdef").unwrap();
        file.set(SESSION_NAME, "userbot_session").unwrap();
        file.set(DB_PATH, "/opt/leadbot/leads.db").unwrap();
        file.save(&path).unwrap();

        let loaded = SecretFile::load(&path).unwrap();
        assert_eq!(loaded, file);
    }

    #[test]
    fn test_load_keeps_last_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "API_ID=1\nAPI_ID=2\n").unwrap();

        let loaded = SecretFile::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(API_ID), Some("2"));
    }
}

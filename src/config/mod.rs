//! Configuration module for the provisioner.
//!
//! Handles the provisioner's own settings and the two artifacts it writes
//! for the bot: the secret file and the bot's JSON configuration document.

mod document;
mod secrets;
mod settings;

use std::io::Write;
use std::path::{Path, PathBuf};

pub use document::{BotConfigDocument, DocumentError};
pub use secrets::{API_HASH, API_ID, DB_PATH, SESSION_NAME, SecretFile, SecretsError, is_shell_safe};
pub use settings::{ProvisionSettings, SettingsError, SettingsOverrides};

/// File name of the bot's entry point inside the checkout.
pub const ENTRY_POINT: &str = "userbot.py";

/// Session label used when the operator accepts the default.
pub const DEFAULT_SESSION_NAME: &str = "userbot_session";

/// Packages installed when the checkout carries no requirements file.
pub const FALLBACK_PACKAGES: &[&str] = &["telethon"];

/// Permission bits for the secret file.
pub const SECRET_FILE_MODE: u32 = 0o600;

/// Writes `contents` to a sibling temp file, then renames it over `path`.
///
/// When `mode` is given the file gets exactly those permission bits before
/// it becomes visible under its final name.
pub(crate) fn write_atomically(
    path: &Path,
    contents: &str,
    mode: Option<u32>,
) -> std::io::Result<()> {
    let tmp = temp_path(path);

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options.open(&tmp)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);

    if let Some(mode) = mode {
        restrict_permissions(&tmp, mode)?;
    }

    std::fs::rename(&tmp, path)
}

/// Sets the permission bits of `path`.
#[cfg(unix)]
pub(crate) fn restrict_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub(crate) fn restrict_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "provision".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}

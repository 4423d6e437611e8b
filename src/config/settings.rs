//! Provisioner settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{DEFAULT_SESSION_NAME, ENTRY_POINT};

/// Where and how the bot gets provisioned.
///
/// Built once at startup and passed by reference into every step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionSettings {
    /// Directory holding the bot checkout.
    pub app_dir: PathBuf,

    /// Host interpreter used to create the isolated environment.
    pub python: String,

    /// Isolated runtime environment directory.
    pub venv_dir: PathBuf,

    /// Requirements file of the checkout.
    pub requirements: PathBuf,

    /// The bot's entry point script.
    pub entry_point: PathBuf,

    /// The bot's JSON configuration document.
    pub bot_config: PathBuf,

    /// Secret file consumed by the service at startup.
    pub secrets_file: PathBuf,

    /// Storage location handed to the bot.
    pub database: PathBuf,

    /// Name of the supervised service.
    pub service_name: String,

    /// Directory where unit files are installed.
    pub unit_dir: PathBuf,

    /// Account the service runs as, if fixed up front.
    pub service_user: Option<String>,

    /// Account that invoked the provisioner (captured at startup).
    pub invoking_user: Option<String>,

    /// Session label offered when the operator enters nothing.
    pub default_session: String,

    /// Delay before the supervisor restarts a crashed bot.
    pub restart_delay_secs: u64,
}

fn default_python() -> String {
    "python3".to_owned()
}

fn default_service_name() -> String {
    "leadbot".to_owned()
}

fn default_restart_delay() -> u64 {
    5
}

impl ProvisionSettings {
    /// Creates settings for a checkout at `app_dir` using the standard layout.
    #[must_use]
    pub fn for_app_dir(app_dir: impl Into<PathBuf>) -> Self {
        let app_dir = app_dir.into();
        Self {
            python: default_python(),
            venv_dir: app_dir.join(".venv"),
            requirements: app_dir.join("requirements.txt"),
            entry_point: app_dir.join(ENTRY_POINT),
            bot_config: app_dir.join("config.json"),
            secrets_file: app_dir.join(".env"),
            database: app_dir.join("leads.db"),
            service_name: default_service_name(),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            service_user: None,
            invoking_user: None,
            default_session: DEFAULT_SESSION_NAME.to_owned(),
            restart_delay_secs: default_restart_delay(),
            app_dir,
        }
    }

    /// Creates settings from environment variables with defaults.
    ///
    /// Reads `LEADBOT_SERVICE_NAME`, `LEADBOT_PYTHON` and
    /// `LEADBOT_SERVICE_USER`, and records the invoking account from
    /// `SUDO_USER` or `USER`.
    #[must_use]
    pub fn from_env_with_defaults(app_dir: impl Into<PathBuf>) -> Self {
        let mut settings = Self::for_app_dir(app_dir);

        if let Ok(name) = std::env::var("LEADBOT_SERVICE_NAME") {
            settings.service_name = name;
        }
        if let Ok(python) = std::env::var("LEADBOT_PYTHON") {
            settings.python = python;
        }
        settings.service_user = non_empty_var("LEADBOT_SERVICE_USER");
        settings.invoking_user = non_empty_var("SUDO_USER").or_else(|| non_empty_var("USER"));

        settings
    }

    /// Builds the startup settings: defaults, then the environment, then an
    /// optional JSON overrides file.
    ///
    /// # Errors
    ///
    /// Returns an error if the overrides file cannot be loaded.
    pub fn load(
        app_dir: impl Into<PathBuf>,
        overrides_file: Option<&Path>,
    ) -> Result<Self, SettingsError> {
        let mut settings = Self::from_env_with_defaults(app_dir);
        if let Some(path) = overrides_file {
            settings.apply(SettingsOverrides::load_from_file(path)?);
        }
        Ok(settings)
    }

    /// Applies overrides loaded from a JSON file.
    pub fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(python) = overrides.python {
            self.python = python;
        }
        if let Some(name) = overrides.service_name {
            self.service_name = name;
        }
        if let Some(user) = overrides.service_user {
            self.service_user = Some(user);
        }
        if let Some(session) = overrides.default_session {
            self.default_session = session;
        }
        if let Some(delay) = overrides.restart_delay_secs {
            self.restart_delay_secs = delay;
        }
        if let Some(dir) = overrides.unit_dir {
            self.unit_dir = dir;
        }
        if let Some(database) = overrides.database {
            self.database = self.app_dir.join(database);
        }
    }

    /// Path of the interpreter inside the isolated environment.
    #[must_use]
    pub fn venv_python(&self) -> PathBuf {
        self.venv_dir.join("bin").join("python")
    }

    /// Path of the installed unit file.
    #[must_use]
    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(format!("{}.service", self.service_name))
    }

    /// Returns true if the checkout ships a requirements file.
    #[must_use]
    pub fn has_requirements(&self) -> bool {
        self.requirements.is_file()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Optional settings overrides read from a JSON file.
///
/// Every field is optional; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsOverrides {
    pub python: Option<String>,
    pub service_name: Option<String>,
    pub service_user: Option<String>,
    pub default_session: Option<String>,
    pub restart_delay_secs: Option<u64>,
    pub unit_dir: Option<PathBuf>,
    /// Storage location, relative to the app directory unless absolute.
    pub database: Option<PathBuf>,
}

impl SettingsOverrides {
    /// Loads overrides from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Settings errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

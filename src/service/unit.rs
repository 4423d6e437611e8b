//! systemd unit definition for the bot.

use std::path::PathBuf;

use crate::bot::contract_args;
use crate::config::{DB_PATH, ProvisionSettings, SESSION_NAME};

/// Everything the unit file references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnit {
    pub description: String,
    pub user: String,
    pub working_dir: PathBuf,
    pub environment_file: PathBuf,
    pub interpreter: PathBuf,
    pub entry_point: PathBuf,
    pub config: PathBuf,
    pub restart_delay_secs: u64,
}

impl ServiceUnit {
    /// Describes the bot service for `user` under `settings`.
    #[must_use]
    pub fn new(settings: &ProvisionSettings, user: &str) -> Self {
        Self {
            description: "Telegram real-estate lead finder userbot".to_owned(),
            user: user.to_owned(),
            working_dir: settings.app_dir.clone(),
            environment_file: settings.secrets_file.clone(),
            interpreter: settings.venv_python(),
            entry_point: settings.entry_point.clone(),
            config: settings.bot_config.clone(),
            restart_delay_secs: settings.restart_delay_secs,
        }
    }

    /// Launch command. Session and storage come from the environment file.
    #[must_use]
    pub fn exec_start(&self) -> String {
        let mut line = format!(
            "{} {}",
            self.interpreter.display(),
            self.entry_point.display()
        );
        let args = contract_args(
            &format!("${{{SESSION_NAME}}}"),
            &format!("${{{DB_PATH}}}"),
            &self.config.display().to_string(),
        );
        for arg in args {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }

    /// Renders the unit file.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "[Unit]\n\
             Description={description}\n\
             After=network-online.target\n\
             Wants=network-online.target\n\
             \n\
             [Service]\n\
             Type=simple\n\
             User={user}\n\
             WorkingDirectory={working_dir}\n\
             EnvironmentFile={environment_file}\n\
             Environment=PYTHONUNBUFFERED=1\n\
             ExecStart={exec_start}\n\
             Restart=always\n\
             RestartSec={restart_delay}\n\
             \n\
             [Install]\n\
             WantedBy=multi-user.target\n",
            description = self.description,
            user = self.user,
            working_dir = self.working_dir.display(),
            environment_file = self.environment_file.display(),
            exec_start = self.exec_start(),
            restart_delay = self.restart_delay_secs,
        )
    }
}

//! Command-line contract of the external bot.
//!
//! The bot takes a session label, a storage location and a configuration
//! document path. Credentials reach it through its environment.

use tracing::info;

use crate::config::{API_HASH, API_ID, ProvisionSettings};
use crate::prompt::OperatorParameters;
use crate::shell::{Completed, Invocation, Shell, ShellError};

/// Arguments naming the session, storage and configuration document.
#[must_use]
pub fn contract_args(session: &str, database: &str, config: &str) -> Vec<String> {
    vec![
        "--session".to_owned(),
        session.to_owned(),
        "--db".to_owned(),
        database.to_owned(),
        "--config".to_owned(),
        config.to_owned(),
    ]
}

/// Builds the foreground launch of the bot from the isolated environment.
///
/// `API_ID` and `API_HASH` travel in the child's environment rather than on
/// its command line, so they never show up in the process list.
#[must_use]
pub fn foreground(settings: &ProvisionSettings, params: &OperatorParameters) -> Invocation {
    Invocation::new(settings.venv_python().display().to_string())
        .arg(settings.entry_point.display().to_string())
        .args(contract_args(
            &params.session_name,
            &settings.database.display().to_string(),
            &settings.bot_config.display().to_string(),
        ))
        .current_dir(&settings.app_dir)
        .env(API_ID, params.api_id.to_string())
        .env(API_HASH, &params.api_hash)
        .env("PYTHONUNBUFFERED", "1")
        .inherit_output()
}

/// Process exit status for a finished bot run.
///
/// The bot's own code when it fits in a byte; 1 when the bot was killed by
/// a signal or reported a code outside `0..=255`.
#[must_use]
pub fn exit_status(done: &Completed) -> u8 {
    done.code.and_then(|code| u8::try_from(code).ok()).unwrap_or(1)
}

/// Runs the bot in the foreground and returns its exit status.
///
/// Ctrl+C reaches the bot through the shared terminal; the provisioner keeps
/// waiting until the bot has exited.
///
/// # Errors
///
/// Returns an error if the bot cannot be started.
pub async fn run_in_foreground<S: Shell>(
    shell: &S,
    settings: &ProvisionSettings,
    params: &OperatorParameters,
) -> Result<u8, ShellError> {
    let invocation = foreground(settings, params);
    info!("Starting bot: {}", invocation);

    let running = shell.run(&invocation);
    tokio::pin!(running);

    let done = tokio::select! {
        result = &mut running => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, waiting for the bot to stop...");
            running.await
        }
    }?;

    info!("Bot exited with {:?}", done.code);
    Ok(exit_status(&done))
}

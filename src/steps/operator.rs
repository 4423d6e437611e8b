//! Steps driven by operator input: collecting parameters and persisting
//! them into the secret file and the bot's configuration document.

use std::io::ErrorKind;

use tracing::{info, warn};

use super::{Precondition, StepError};
use crate::config::{
    API_HASH, API_ID, BotConfigDocument, DB_PATH, ProvisionSettings, SECRET_FILE_MODE,
    SESSION_NAME, SecretFile, SecretsError, restrict_permissions,
};
use crate::prompt::{OperatorParameters, Prompter, collect_parameters};

pub(super) fn collect<P: Prompter + ?Sized>(
    prompter: &mut P,
    settings: &ProvisionSettings,
) -> Result<OperatorParameters, StepError> {
    // A previous run's session label becomes the default, so the bot keeps
    // its login session unless the operator asks for a new one.
    let default_session = SecretFile::load(&settings.secrets_file)
        .ok()
        .and_then(|file| file.get(SESSION_NAME).map(str::to_owned))
        .unwrap_or_else(|| settings.default_session.clone());

    let params = collect_parameters(prompter, &default_session)?;
    info!(
        "Collected parameters (API_ID {}, session {}, notify {})",
        params.api_id, params.session_name, params.target_telegram_id
    );
    Ok(params)
}

pub(super) fn desired_secrets(
    settings: &ProvisionSettings,
    params: &OperatorParameters,
) -> Result<SecretFile, SecretsError> {
    let mut file = SecretFile::new();
    file.set(API_ID, &params.api_id.to_string())?;
    file.set(API_HASH, &params.api_hash)?;
    file.set(SESSION_NAME, &params.session_name)?;
    file.set(DB_PATH, &settings.database.display().to_string())?;
    Ok(file)
}

/// Satisfied when the file on disk already holds exactly the desired entries.
pub(super) fn secrets_precondition(
    settings: &ProvisionSettings,
    params: Option<&OperatorParameters>,
) -> Precondition {
    let Some(params) = params else {
        return Precondition::Pending;
    };
    let Ok(desired) = desired_secrets(settings, params) else {
        return Precondition::Pending;
    };
    match SecretFile::load(&settings.secrets_file) {
        Ok(existing) if existing.render() == desired.render() => {
            Precondition::Satisfied("secret file is up to date".to_owned())
        }
        _ => Precondition::Pending,
    }
}

pub(super) fn persist_secrets(
    settings: &ProvisionSettings,
    params: &OperatorParameters,
    precondition: &Precondition,
) -> Result<(), StepError> {
    let path = &settings.secrets_file;

    if let Precondition::Satisfied(detail) = precondition {
        info!("{} unchanged ({})", path.display(), detail);
    } else {
        desired_secrets(settings, params)?.save(path)?;
        info!("Wrote {}", path.display());
    }

    restrict_permissions(path, SECRET_FILE_MODE)?;
    Ok(())
}

/// Returns true if the document was rewritten.
pub(super) fn merge_bot_config(
    settings: &ProvisionSettings,
    params: &OperatorParameters,
) -> Result<bool, StepError> {
    let path = &settings.bot_config;

    let (mut document, original) = match std::fs::read_to_string(path) {
        Ok(text) => (BotConfigDocument::parse(&text)?, Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("{} does not exist, creating it", path.display());
            (BotConfigDocument::new(), None)
        }
        Err(err) => return Err(err.into()),
    };

    document.set_target_telegram_id(params.target_telegram_id)?;

    for section in document.validate()? {
        warn!(
            "{} has no `{}` section; the bot will not start until it is added",
            path.display(),
            section
        );
    }

    let rendered = document.render()?;
    if original.as_deref() == Some(rendered.as_str()) {
        info!("{} already up to date", path.display());
        return Ok(false);
    }

    document.save_to_file(path)?;
    info!(
        "Set notification.target_telegram_id = {} in {}",
        params.target_telegram_id,
        path.display()
    );
    Ok(true)
}

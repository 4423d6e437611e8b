//! Step runner.
//!
//! The runner follows a simple loop for every step of a plan:
//! 1. Check the step's precondition (is its artifact already there?)
//! 2. Run the action; a satisfied precondition lets it skip the expensive
//!    part but it still re-validates
//! 3. On failure of a fatal step → stop and report which step failed
//! 4. On failure of a best-effort step → warn and continue

use tracing::{info, warn};

use super::{Plan, Precondition, ProvisionContext, ProvisionError, Step, StepError, host, operator};
use crate::config::ProvisionSettings;
use crate::prompt::Prompter;
use crate::service::{self, ServiceUnit, UnitState};
use crate::shell::Shell;

/// Drives a plan of steps against one host.
pub struct Provisioner<'a, S, P> {
    settings: &'a ProvisionSettings,
    shell: &'a S,
    prompter: P,
    context: ProvisionContext,
}

impl<'a, S: Shell, P: Prompter> Provisioner<'a, S, P> {
    /// Creates a runner with an empty context.
    #[must_use]
    pub fn new(settings: &'a ProvisionSettings, shell: &'a S, prompter: P) -> Self {
        Self {
            settings,
            shell,
            prompter,
            context: ProvisionContext::new(),
        }
    }

    /// State produced so far.
    #[must_use]
    pub const fn context(&self) -> &ProvisionContext {
        &self.context
    }

    /// Consumes the runner and returns its state.
    #[must_use]
    pub fn into_context(self) -> ProvisionContext {
        self.context
    }

    /// The prompter, e.g. to inspect it after a run.
    pub const fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Runs every step of `plan`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal step failure.
    pub async fn run(&mut self, plan: Plan) -> Result<(), ProvisionError> {
        self.run_steps(plan.steps()).await
    }

    /// Runs `steps` in order, stopping at the first fatal failure.
    ///
    /// # Errors
    ///
    /// Returns the first fatal step failure.
    pub async fn run_steps(&mut self, steps: &[Step]) -> Result<(), ProvisionError> {
        let total = steps.len();

        for (index, &step) in steps.iter().enumerate() {
            let position = index + 1;
            info!("[{}/{}] {}", position, total, step);

            match self.run_step(step).await {
                Ok(()) => self.context.completed.push(step),
                Err(source) if !step.is_fatal() => {
                    warn!("{} skipped: {}", step, source);
                }
                Err(source) => {
                    return Err(ProvisionError {
                        step,
                        position,
                        total,
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    /// Checks whether `step`'s artifact already exists.
    pub fn precondition(&self, step: Step) -> Precondition {
        match step {
            Step::CreateEnvironment => host::environment_precondition(self.settings),
            Step::PersistSecrets => {
                operator::secrets_precondition(self.settings, self.context.parameters.as_ref())
            }
            Step::RegisterService => self.unit_precondition(),
            _ => Precondition::Pending,
        }
    }

    fn unit_precondition(&self) -> Precondition {
        let Some(user) = self.context.identity.as_deref() else {
            return Precondition::Pending;
        };
        let rendered = ServiceUnit::new(self.settings, user).render();
        match service::installed_state(&self.settings.unit_path(), &rendered) {
            UnitState::Current => Precondition::Satisfied("unit file is up to date".to_owned()),
            UnitState::Missing | UnitState::Outdated => Precondition::Pending,
        }
    }

    async fn run_step(&mut self, step: Step) -> Result<(), StepError> {
        let precondition = self.precondition(step);
        if matches!(precondition, Precondition::Satisfied(_)) {
            self.context.satisfied.push(step);
        }

        let settings = self.settings;
        let shell = self.shell;

        match step {
            Step::ResolveIdentity => {
                self.context.identity = Some(host::resolve_identity(shell, settings).await?);
            }
            Step::RequireInterpreter => host::require_interpreter(shell, settings).await?,
            Step::CreateEnvironment => {
                self.context.environment_reused =
                    host::create_environment(shell, settings, &precondition).await?;
            }
            Step::InstallDependencies => host::install_dependencies(shell, settings).await?,
            Step::CollectParameters => {
                self.context.parameters = Some(operator::collect(&mut self.prompter, settings)?);
            }
            Step::PersistSecrets => {
                let params = self.context.parameters()?;
                operator::persist_secrets(settings, params, &precondition)?;
            }
            Step::MergeBotConfig => {
                let changed = operator::merge_bot_config(settings, self.context.parameters()?)?;
                self.context.config_changed = changed;
            }
            Step::CheckEntryPoint => host::check_entry_point(shell, settings).await?,
            Step::RegisterService => {
                let user = self.context.identity()?;
                if let Precondition::Satisfied(detail) = &precondition {
                    info!("{} unchanged ({})", settings.unit_path().display(), detail);
                } else {
                    let rendered = ServiceUnit::new(settings, user).render();
                    service::install_unit(shell, &settings.unit_path(), &rendered).await?;
                }
                service::enable_and_restart(shell, &settings.service_name).await?;
            }
            Step::ReportStatus => {
                let report = service::status(shell, &settings.service_name)
                    .await
                    .map_err(|err| {
                        StepError::Privilege(format!(
                            "Could not read the service status ({err}); try `sudo systemctl status {}`",
                            settings.service_name
                        ))
                    })?;
                println!("{}", report.trim_end());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::prompt::scripted::ScriptedPrompter;
    use crate::shell::Completed;
    use crate::shell::recording::RecordingShell;

    const ANSWERS: [&str; 4] = ["34", "0123abcd", "-100200300", ""];

    fn settings_in(dir: &Path) -> ProvisionSettings {
        let mut settings = ProvisionSettings::for_app_dir(dir.join("app"));
        settings.unit_dir = dir.join("units");
        settings.service_user = Some("deploy".to_owned());
        std::fs::create_dir_all(&settings.app_dir).unwrap();
        std::fs::create_dir_all(&settings.unit_dir).unwrap();
        settings
    }

    #[tokio::test]
    async fn test_invalid_input_reprompts_inside_run() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let shell = RecordingShell::new();
        let prompter = ScriptedPrompter::new(["12a", "34", "0123abcd", "12.5", "-100200300", ""]);

        let mut runner = Provisioner::new(&settings, &shell, prompter);
        runner.run_steps(&[Step::CollectParameters]).await.unwrap();

        let params = runner.context().parameters.clone().unwrap();
        assert_eq!(params.api_id, 34);
        assert_eq!(params.target_telegram_id, -100_200_300);
        assert_eq!(runner.prompter().rejections.len(), 2);
    }

    #[tokio::test]
    async fn test_second_run_leaves_artifacts_identical() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        std::fs::write(&settings.bot_config, r#"{"foo": "bar"}"#).unwrap();
        let steps = [Step::CollectParameters, Step::PersistSecrets, Step::MergeBotConfig];
        let shell = RecordingShell::new();

        let mut first = Provisioner::new(&settings, &shell, ScriptedPrompter::new(ANSWERS));
        first.run_steps(&steps).await.unwrap();
        let secrets = std::fs::read(&settings.secrets_file).unwrap();
        let config = std::fs::read(&settings.bot_config).unwrap();

        let mut second = Provisioner::new(&settings, &shell, ScriptedPrompter::new(ANSWERS));
        second.run_steps(&steps).await.unwrap();

        assert_eq!(std::fs::read(&settings.secrets_file).unwrap(), secrets);
        assert_eq!(std::fs::read(&settings.bot_config).unwrap(), config);
        let context = second.into_context();
        assert_eq!(context.satisfied, [Step::PersistSecrets]);
        assert!(!context.config_changed);
    }

    #[tokio::test]
    async fn test_rerun_reuses_environment_but_reinstalls() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let bin = settings.venv_dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("python"), "").unwrap();
        let created = std::fs::metadata(&settings.venv_dir).unwrap().modified().unwrap();

        let shell = RecordingShell::new();
        let mut runner = Provisioner::new(&settings, &shell, ScriptedPrompter::default());
        runner
            .run_steps(&[Step::CreateEnvironment, Step::InstallDependencies])
            .await
            .unwrap();

        assert!(runner.context().environment_reused);
        assert!(!shell.ran("-m venv"));
        assert!(shell.ran("-m pip install"));
        assert_eq!(
            std::fs::metadata(&settings.venv_dir).unwrap().modified().unwrap(),
            created
        );
    }

    #[tokio::test]
    async fn test_fatal_failure_names_step_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let shell = RecordingShell::new().without("python3");

        let mut runner = Provisioner::new(&settings, &shell, ScriptedPrompter::default());
        let err = runner.run(Plan::Service).await.unwrap_err();

        assert_eq!(err.step, Step::RequireInterpreter);
        assert_eq!(err.position, 2);
        assert!(matches!(err.source, StepError::Environment(_)));
        assert_eq!(runner.context().completed, [Step::ResolveIdentity]);
        assert!(!shell.ran("-m venv"));
    }

    #[tokio::test]
    async fn test_full_service_plan() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        std::fs::write(&settings.entry_point, "print('hi')\n").unwrap();
        std::fs::write(&settings.bot_config, r#"{"foo": "bar"}"#).unwrap();
        let shell = RecordingShell::new().respond(
            |inv| inv.first_arg_is("status"),
            Completed::ok("● leadbot.service - active (running)\n"),
        );

        let mut runner = Provisioner::new(&settings, &shell, ScriptedPrompter::new(ANSWERS));
        runner.run(Plan::Service).await.unwrap();

        assert_eq!(runner.context().completed, Plan::Service.steps());
        let lines = shell.command_lines();
        let position = |needle: &str| lines.iter().position(|l| l.contains(needle)).unwrap();
        assert!(position("py_compile") < position("tee "));
        assert!(position("daemon-reload") < position("systemctl enable leadbot"));
        assert!(position("systemctl enable leadbot") < position("systemctl restart leadbot"));

        let tee = shell.calls().into_iter().find(|c| c.program == "tee").unwrap();
        assert!(tee.stdin.unwrap().contains("User=deploy"));
    }

    #[tokio::test]
    async fn test_unchanged_unit_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        std::fs::write(
            settings.unit_path(),
            ServiceUnit::new(&settings, "deploy").render(),
        )
        .unwrap();
        let shell = RecordingShell::new();

        let mut runner = Provisioner::new(&settings, &shell, ScriptedPrompter::default());
        runner
            .run_steps(&[Step::ResolveIdentity, Step::RegisterService])
            .await
            .unwrap();

        assert!(!shell.ran("tee"));
        assert!(!shell.ran("daemon-reload"));
        assert!(shell.ran("systemctl restart leadbot"));
    }

    #[tokio::test]
    async fn test_status_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let shell = RecordingShell::new().respond(
            |inv| inv.first_arg_is("status"),
            Completed::failed(1, "Access denied"),
        );

        let mut runner = Provisioner::new(&settings, &shell, ScriptedPrompter::default());
        runner.run_steps(&[Step::ReportStatus]).await.unwrap();
        assert!(runner.context().completed.is_empty());
    }

    #[tokio::test]
    async fn test_steps_out_of_order_fail() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let shell = RecordingShell::new();

        let mut runner = Provisioner::new(&settings, &shell, ScriptedPrompter::default());
        let err = runner.run_steps(&[Step::PersistSecrets]).await.unwrap_err();
        assert!(matches!(
            err.source,
            StepError::OutOfOrder(Step::CollectParameters)
        ));
    }
}

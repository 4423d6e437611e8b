//! Lead Bot Setup - Main Entry Point
//!
//! Provisions the Telegram lead finder userbot on this host, either as a
//! supervised service or for a one-off foreground run.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use leadbot_setup::bot;
use leadbot_setup::config::ProvisionSettings;
use leadbot_setup::logging::init_logging;
use leadbot_setup::prompt::TerminalPrompter;
use leadbot_setup::shell::SystemShell;
use leadbot_setup::steps::{Plan, Provisioner};

/// First-run provisioning for the Telegram lead finder userbot.
#[derive(Parser, Debug)]
#[command(name = "leadbot_setup")]
#[command(about = "Provision the Telegram lead finder userbot on this host")]
#[command(version)]
struct Args {
    /// Directory holding the bot checkout.
    #[arg(long, default_value = ".", global = true)]
    app_dir: PathBuf,

    /// Account the bot runs as (defaults to the invoking user).
    #[arg(long, global = true)]
    service_user: Option<String>,

    /// Name of the systemd service.
    #[arg(long, global = true)]
    service_name: Option<String>,

    /// JSON file with settings overrides.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Mode {
    /// Install the bot as an auto-restarting systemd service.
    Install,

    /// Prepare the bot and run it in the foreground.
    Run,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    let settings = load_settings(&args)?;
    debug!("Settings: {}", serde_json::to_string(&settings)?);

    let shell = SystemShell::detect().await;
    debug!("Elevated commands use sudo: {}", shell.escalates());

    match args.mode {
        Mode::Install => install(&settings, &shell).await,
        Mode::Run => run(&settings, &shell).await,
    }
}

fn load_settings(args: &Args) -> Result<ProvisionSettings> {
    let app_dir = std::path::absolute(&args.app_dir)
        .with_context(|| format!("Invalid app directory {}", args.app_dir.display()))?;

    let mut settings = ProvisionSettings::load(app_dir, args.settings.as_deref())?;
    if let Some(user) = &args.service_user {
        settings.service_user = Some(user.clone());
    }
    if let Some(name) = &args.service_name {
        settings.service_name.clone_from(name);
    }
    Ok(settings)
}

/// Runs the full service plan.
async fn install(settings: &ProvisionSettings, shell: &SystemShell) -> Result<ExitCode> {
    info!("Provisioning {} as service {}", settings.app_dir.display(), settings.service_name);

    Provisioner::new(settings, shell, TerminalPrompter::new())
        .run(Plan::Service)
        .await?;

    println!("✓ {} is installed and running", settings.service_name);
    println!("\nUseful commands:");
    println!("  journalctl -u {} -f", settings.service_name);
    println!("  sudo systemctl restart {}", settings.service_name);
    Ok(ExitCode::SUCCESS)
}

/// Runs the local plan, then the bot in the foreground.
async fn run(settings: &ProvisionSettings, shell: &SystemShell) -> Result<ExitCode> {
    let mut provisioner = Provisioner::new(settings, shell, TerminalPrompter::new());
    provisioner.run(Plan::Local).await?;
    let context = provisioner.into_context();
    let params = context.parameters()?;

    let status = bot::run_in_foreground(shell, settings, params)
        .await
        .context("Failed to launch the bot")?;
    Ok(ExitCode::from(status))
}

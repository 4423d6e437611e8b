//! One-shot bootstrap for a fresh server.
//!
//! Installs the base packages, checks out the bot and then runs the full
//! service provisioning against the checkout.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use leadbot_setup::checkout::{self, BootstrapPlan, DEFAULT_INSTALL_DIR, DEFAULT_REPO_URL};
use leadbot_setup::config::{ENTRY_POINT, ProvisionSettings};
use leadbot_setup::logging::init_logging;
use leadbot_setup::prompt::TerminalPrompter;
use leadbot_setup::shell::{Invocation, Shell, SystemShell};
use leadbot_setup::steps::{Plan, Provisioner};

/// Fresh-server bootstrap for the Telegram lead finder userbot.
#[derive(Parser, Debug)]
#[command(name = "leadbot_bootstrap")]
#[command(about = "Install prerequisites, check out the bot and install it as a service")]
#[command(version)]
struct Args {
    /// Repository to clone (falls back to LEADBOT_REPO_URL).
    #[arg(long)]
    repo_url: Option<String>,

    /// Checkout directory.
    #[arg(long, default_value = DEFAULT_INSTALL_DIR)]
    install_dir: PathBuf,

    /// Account that owns the checkout and runs the bot.
    #[arg(long)]
    service_user: Option<String>,

    /// JSON file with settings overrides.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    let install_dir = std::path::absolute(&args.install_dir)
        .with_context(|| format!("Invalid install directory {}", args.install_dir.display()))?;

    let mut settings = ProvisionSettings::load(&install_dir, args.settings.as_deref())?;
    if let Some(user) = &args.service_user {
        settings.service_user = Some(user.clone());
    }

    let shell = SystemShell::detect().await;
    let owner = resolve_owner(&shell, &settings).await?;

    let plan = BootstrapPlan {
        repo_url: args
            .repo_url
            .or_else(|| std::env::var("LEADBOT_REPO_URL").ok().filter(|url| !url.is_empty()))
            .unwrap_or_else(|| DEFAULT_REPO_URL.to_owned()),
        install_dir,
        owner: owner.clone(),
        entry_point: ENTRY_POINT.to_owned(),
    };

    info!("Bootstrapping {} into {} for {}", plan.repo_url, plan.install_dir.display(), owner);
    checkout::bootstrap(&shell, &plan)
        .await
        .context("Bootstrap failed; provisioning was not started")?;

    settings.service_user = Some(owner);
    Provisioner::new(&settings, &shell, TerminalPrompter::new())
        .run(Plan::Service)
        .await?;

    println!("✓ {} is installed and running from {}", settings.service_name, settings.app_dir.display());
    println!("\nUseful commands:");
    println!("  journalctl -u {} -f", settings.service_name);
    println!("  sudo systemctl restart {}", settings.service_name);
    Ok(ExitCode::SUCCESS)
}

/// Picks the checkout owner: explicit user, then the invoking user, then
/// whoever this process runs as.
async fn resolve_owner(shell: &SystemShell, settings: &ProvisionSettings) -> Result<String> {
    if let Some(user) = settings.service_user.as_ref().or(settings.invoking_user.as_ref()) {
        return Ok(user.clone());
    }

    let done = shell.check(&Invocation::new("id").arg("-un")).await?;
    let user = done.stdout.trim();
    if user.is_empty() {
        bail!("Could not determine the current user; pass --service-user");
    }
    Ok(user.to_owned())
}

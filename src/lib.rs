//! Lead Bot Setup Library
//!
//! First-run provisioning for the Telegram lead finder userbot.
//!
//! This crate provides the core functionality for:
//! - Bootstrapping a host and checking out the bot
//! - Collecting and validating operator credentials
//! - Writing the secret file and the bot's configuration
//! - Registering the bot as a supervised service

pub mod bot;
pub mod checkout;
pub mod config;
pub mod logging;
pub mod prompt;
pub mod service;
pub mod shell;
pub mod steps;

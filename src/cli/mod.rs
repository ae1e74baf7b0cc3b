//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Bakesync using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Bakesync - JDE to Bakery-Ops Synchronization Middleware
#[derive(Parser, Debug)]
#[command(name = "bakesync")]
#[command(version, about, long_about = None)]
#[command(author = "Bakesync Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "bakesync.toml", env = "BAKESYNC_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "BAKESYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API until interrupted
    Serve(commands::serve::ServeArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// Delete expired review sessions
    PurgeSessions(commands::purge::PurgeArgs),
}

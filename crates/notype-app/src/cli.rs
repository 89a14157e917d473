//! CLI argument definitions for the notype pill.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// notype pill: floating status and control for the notype dictation backend.
#[derive(Parser, Debug)]
#[command(name = "notype-pill", version, about)]
pub struct CliArgs {
    /// Path to the client configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Talk to an in-process simulated backend instead of the session bus.
    /// Affects `watch`, `deps` and `ensure-auto-type`.
    #[arg(long = "offline", global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the pill session and print status changes until Ctrl-C (default).
    Watch,
    /// Ask the running backend to toggle recording.
    Toggle,
    /// Check runtime dependencies and print the report.
    Deps,
    /// Ask the running backend to open its settings window.
    ShowSettings,
    /// Ask the running backend to exit.
    Quit,
    /// Force the backend's autoType setting on.
    EnsureAutoType,
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Watch)
    }

    /// Priority: --config flag > NOTYPE_CLIENT_CONFIG env var > default location.
    pub fn resolve_config_path(&self) -> PathBuf {
        notype_core::config::resolve_config_path(self.config.as_deref())
    }

    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

//! Command-line interface.

use std::path::PathBuf;

use botdeck_client::TransportMode;
use clap::{Parser, Subcommand};

use crate::config::ConsoleConfig;

#[derive(Debug, Parser)]
#[command(name = "botdeck", version, about = "Operator console for a fleet of bot applications")]
pub struct Cli {
    /// Config file (default: <config dir>/botdeck/config.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Bot manager base URL.
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Transport: push (Socket.IO) or poll (REST).
    #[arg(long, global = true)]
    pub mode: Option<TransportMode>,

    /// Poll interval in seconds (poll mode).
    #[arg(long, global = true)]
    pub poll_interval: Option<u64>,

    /// Hide bot tokens in the table.
    #[arg(long, global = true)]
    pub mask_tokens: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Interactive dashboard (default).
    Console,
    /// Print every application and its state.
    List,
    /// Print one application, including its configuration.
    Show { id: String },
    Start { id: String },
    Restart { id: String },
    Reload { id: String },
    Stop { id: String },
    /// Print runtime log entries.
    Logs {
        /// Only entries at or after this unix timestamp (0 = all).
        #[arg(long, default_value_t = 0)]
        since: i64,
    },
    /// Re-read the manager's application config file.
    ReloadConfig,
    StartAll,
    StopAll,
    /// Stop the bot manager itself.
    Shutdown,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    pub fn apply(&self, config: &mut ConsoleConfig) {
        if let Some(url) = &self.url {
            config.server_url = url.clone();
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if self.mask_tokens {
            config.mask_tokens = true;
        }
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Console)
    }
}

//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Backend;

pub mod commands;

/// cloudsave - Cloud save synchronization for game save directories
#[derive(Parser, Debug)]
#[command(name = "cloudsave", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (default: ~/.cloudsave/config.json)
    #[arg(long, global = true, env = "CLOUDSAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Save directory to sync (overrides config)
    #[arg(long, global = true)]
    pub save_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a cloudsave config file
    Init {
        /// Backend to use (remote, local)
        #[arg(long, value_parser = parse_backend)]
        backend: Option<Backend>,

        /// Game identifier
        #[arg(long)]
        game_id: Option<String>,

        /// Sync API base URL (remote backend)
        #[arg(long)]
        api_url: Option<String>,

        /// User identity (local backend)
        #[arg(long)]
        user_id: Option<String>,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Run one sync now
    Sync {
        /// Ignore the sync interval
        #[arg(long)]
        force: bool,
    },

    /// Keep syncing on an interval until interrupted
    Watch {
        /// Seconds between sync checks
        #[arg(long, default_value = "30")]
        poll: u64,
    },

    /// Show what a sync would do, without transferring (local backend)
    Plan,

    /// Print the local manifest
    Manifest,

    /// Show configuration, login, and save directory status
    Status,

    /// Log in to the identity provider
    Login {
        /// Username
        username: String,

        /// Password
        #[arg(long, env = "CLOUDSAVE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account with the identity provider
    Signup {
        /// Username
        username: String,

        /// Email address
        email: String,

        /// Password
        #[arg(long, env = "CLOUDSAVE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the saved login session
    Logout,

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_backend(s: &str) -> std::result::Result<Backend, String> {
    s.parse().map_err(|e: crate::error::Error| e.to_string())
}

/// Supported shells for completions.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}

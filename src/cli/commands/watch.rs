//! Long-running sync loop.
//!
//! Acts as the host application would: one sync on start, then the throttled
//! `sync(false)` on every poll tick. The configured sync interval decides
//! how often a tick actually syncs.

use std::path::Path;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use tracing::info;

use crate::error::{Error, Result};
use crate::sync::status::print_outcome;
use crate::sync::{SkipReason, SyncOutcome};

use super::setup::{Client, Settings};

/// Execute the watch command. Runs until the process is interrupted.
///
/// # Errors
///
/// Returns an error if configuration is missing or the backend cannot be
/// opened.
pub fn execute(config: Option<&Path>, save_dir: Option<&Path>, poll_secs: u64, json: bool) -> Result<()> {
    if poll_secs == 0 {
        return Err(Error::InvalidArgument("--poll must be at least 1 second".to_string()));
    }

    let settings = Settings::load(config, save_dir)?;
    let client = Client::connect(&settings)?;
    let manager = client.manager(&settings)?;
    let poll = Duration::from_secs(poll_secs);

    if !json {
        println!(
            "{} Watching {} (interval {}s, poll {}s)",
            "●".cyan(),
            manager.inventory().save_dir().display(),
            settings.config.sync_interval_seconds,
            poll_secs
        );
    }
    info!(game = %client.game_id, "Watch started");

    loop {
        let outcome = manager.run(false);
        report(&outcome, json)?;
        thread::sleep(poll);
    }
}

fn report(outcome: &SyncOutcome, json: bool) -> Result<()> {
    // Throttled ticks are the common case; stay quiet about them
    if matches!(outcome, SyncOutcome::NotPerformed { reason: SkipReason::Throttled }) {
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(outcome)?);
    } else {
        print_outcome(outcome);
    }
    Ok(())
}

//! Run one orchestrated sync.

use std::path::Path;

use crate::error::{Error, Result};
use crate::sync::status::print_outcome;
use crate::sync::{SkipReason, SyncOutcome};

use super::setup::{Client, Settings};

/// Execute the sync command.
///
/// Skips due to throttling print normally; an attempted sync that failed
/// before any transfer is returned as an error so the exit code reflects it.
///
/// # Errors
///
/// Returns an error if configuration is missing, the backend cannot be
/// opened, the user is not logged in, or the sync fails.
pub fn execute(config: Option<&Path>, save_dir: Option<&Path>, force: bool, json: bool) -> Result<()> {
    let settings = Settings::load(config, save_dir)?;
    let client = Client::connect(&settings)?;
    let manager = client.manager(&settings)?;

    let outcome = manager.run(force);
    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    match outcome {
        SyncOutcome::NotPerformed { reason: SkipReason::NotAuthenticated } => Err(Error::Authentication(
            "Not logged in".to_string(),
        )),
        SyncOutcome::NotPerformed { reason: SkipReason::Failed(e) } => Err(Error::Sync(e)),
        SyncOutcome::Performed { report } if !report.is_success() => Err(Error::Sync(format!(
            "{} of {} transfers failed: {}",
            report.failed.len(),
            report.failed.len() + report.transferred(),
            report.error_summary().unwrap_or_default()
        ))),
        _ => Ok(()),
    }
}

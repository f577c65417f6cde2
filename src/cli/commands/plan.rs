//! Dry-run reconciliation against the local backend.

use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::ActionPlan;
use crate::sync::status::print_plan;

use super::setup::{Client, Settings};

#[derive(Serialize)]
struct PlanOutput<'a> {
    game_id: &'a str,
    files: usize,
    plan: &'a ActionPlan,
}

/// Execute the plan command.
///
/// # Errors
///
/// Returns `Error::InvalidArgument` on the remote backend, whose plans issue
/// live transfer URLs and commit manifests, or a configuration error.
pub fn execute(config: Option<&Path>, save_dir: Option<&Path>, json: bool) -> Result<()> {
    let settings = Settings::load(config, save_dir)?;
    let client = Client::connect(&settings)?;
    let local = client.local.as_ref().ok_or_else(|| {
        Error::InvalidArgument("`plan` is only available with the local backend".to_string())
    })?;

    let manifest = settings.inventory()?.build_local_manifest();
    let reconciliation = local.service.preview(&local.user_id, &client.game_id, &manifest);

    if json {
        let output = PlanOutput {
            game_id: &client.game_id,
            files: manifest.len(),
            plan: &reconciliation.plan,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_plan(&reconciliation.plan);
    }
    Ok(())
}

//! Print the local manifest.

use std::path::Path;

use crate::config::{Config, Paths};
use crate::error::Result;
use crate::sync::LocalInventory;
use crate::sync::status::print_manifest;

/// Execute the manifest command.
///
/// Needs only a save directory, so it works before `init` as long as
/// `--save-dir` or `CLOUDSAVE_SAVE_DIR` is given.
///
/// # Errors
///
/// Returns an error if the config file is invalid or no save directory can
/// be determined.
pub fn execute(config_flag: Option<&Path>, save_dir: Option<&Path>, json: bool) -> Result<()> {
    let config_path = match config_flag {
        Some(path) => path.to_path_buf(),
        None => Paths::resolve()?.config,
    };
    let mut config = Config::load(&config_path)?.unwrap_or_default();
    config.apply_env()?;
    if let Some(dir) = save_dir {
        config.save_dir = Some(dir.to_path_buf());
    }

    let manifest = LocalInventory::new(config.resolved_save_dir()?).build_local_manifest();

    if json {
        println!("{}", serde_json::to_string(&manifest)?);
    } else {
        print_manifest(&manifest);
    }
    Ok(())
}

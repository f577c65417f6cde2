//! Write a cloudsave config file.
//!
//! Values given on the command line are stored as-is; anything missing for
//! the chosen backend is reported as a warning rather than an error so a
//! config can be completed by hand or through `CLOUDSAVE_*` variables.

use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Serialize;

use crate::config::{Backend, Config, Paths};
use crate::error::{Error, Result};

#[derive(Serialize)]
struct InitOutput<'a> {
    path: PathBuf,
    backend: Backend,
    missing: Vec<&'a str>,
}

/// Options collected from `cloudsave init`.
#[derive(Debug, Default)]
pub struct InitOptions<'a> {
    pub backend: Option<Backend>,
    pub game_id: Option<&'a str>,
    pub api_url: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub save_dir: Option<&'a Path>,
    pub force: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `Error::AlreadyInitialized` if the config exists and `force` is
/// not set, or an error if the file cannot be written.
pub fn execute(config_flag: Option<&Path>, options: &InitOptions<'_>, json: bool) -> Result<()> {
    let path = match config_flag {
        Some(path) => path.to_path_buf(),
        None => Paths::resolve()?.config,
    };

    if path.exists() && !options.force {
        return Err(Error::AlreadyInitialized { path });
    }

    let config = build_config(options);
    config.save(&path)?;

    let missing = config.missing_fields();
    if json {
        let output = InitOutput { path, backend: config.backend, missing };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} Wrote {}", "✓".green(), path.display());
    println!("  Backend: {}", config.backend);
    if !missing.is_empty() {
        println!(
            "  {} still missing: {}",
            "!".yellow(),
            missing.join(", ")
        );
    }
    Ok(())
}

fn build_config(options: &InitOptions<'_>) -> Config {
    let mut config = Config {
        backend: options.backend.unwrap_or_default(),
        game_id: options.game_id.map(str::to_string),
        api_base_url: options.api_url.map(str::to_string),
        user_id: options.user_id.map(str::to_string),
        save_dir: options.save_dir.map(Path::to_path_buf),
        ..Config::default()
    };
    config.normalize();
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let options = InitOptions {
            backend: Some(Backend::Local),
            game_id: Some("vn"),
            user_id: Some("player"),
            ..InitOptions::default()
        };

        execute(Some(path.as_path()), &options, true).unwrap();

        let config = Config::load(&path).unwrap().unwrap();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.game_id.as_deref(), Some("vn"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refuses_overwrite_without_force() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        execute(Some(path.as_path()), &InitOptions::default(), true).unwrap();

        let err = execute(Some(path.as_path()), &InitOptions::default(), true).unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized { .. }));

        let forced = InitOptions { force: true, game_id: Some("vn"), ..InitOptions::default() };
        execute(Some(path.as_path()), &forced, true).unwrap();
        assert_eq!(Config::load(&path).unwrap().unwrap().game_id.as_deref(), Some("vn"));
    }

    #[test]
    fn test_api_url_trailing_slash_trimmed() {
        let config = build_config(&InitOptions {
            api_url: Some("https://api.example.com/prod/"),
            ..InitOptions::default()
        });
        assert_eq!(config.api_base_url.as_deref(), Some("https://api.example.com/prod"));
    }
}

//! Status command implementation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Backend;
use crate::error::Result;
use crate::storage::{SqliteManifestStore, SyncEvent};
use crate::sync::status::format_size;

use super::setup::Settings;

const RECENT_EVENT_LIMIT: u32 = 5;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    config_path: PathBuf,
    backend: Backend,
    game_id: Option<String>,
    save_dir: Option<PathBuf>,
    missing: Vec<&'static str>,
    auth: AuthInfo,
    files: usize,
    total_size: u64,
    recent_syncs: Vec<SyncEvent>,
}

#[derive(Serialize)]
struct AuthInfo {
    authenticated: bool,
    user: Option<String>,
    expires_at: Option<i64>,
}

/// Execute status command.
///
/// Reports what it can from a partial configuration instead of failing on
/// missing keys.
///
/// # Errors
///
/// Returns `Error::NotConfigured` if no config file exists.
pub fn execute(config: Option<&Path>, save_dir: Option<&Path>, json: bool) -> Result<()> {
    let settings = Settings::load(config, save_dir)?;
    let config = &settings.config;

    let save_dir = config.resolved_save_dir().ok();
    let manifest = settings.inventory().map(|i| i.build_local_manifest()).unwrap_or_default();
    let auth = auth_info(&settings);
    let recent_syncs = recent_syncs(&settings);

    let output = StatusOutput {
        config_path: settings.config_path.clone(),
        backend: config.backend,
        game_id: config.game_id.clone(),
        save_dir,
        missing: config.missing_fields(),
        auth,
        files: manifest.len(),
        total_size: manifest.total_size(),
        recent_syncs,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_status(&output);
    }
    Ok(())
}

fn auth_info(settings: &Settings) -> AuthInfo {
    match settings.config.backend {
        Backend::Local => AuthInfo {
            authenticated: settings.config.user_id.is_some(),
            user: settings.config.user_id.clone(),
            expires_at: None,
        },
        Backend::Remote => {
            let session = settings.cognito().ok().and_then(|c| c.session());
            AuthInfo {
                authenticated: session.is_some(),
                user: session.as_ref().map(|s| s.username.clone()),
                expires_at: session.map(|s| s.expires_at),
            }
        }
    }
}

/// Completion history; only the local backend records it.
fn recent_syncs(settings: &Settings) -> Vec<SyncEvent> {
    let config = &settings.config;
    let (Backend::Local, Some(user), Some(game)) = (config.backend, &config.user_id, &config.game_id) else {
        return Vec::new();
    };
    if !settings.paths.database.exists() {
        return Vec::new();
    }

    SqliteManifestStore::open(&settings.paths.database)
        .and_then(|store| store.recent_events(user, game, Some(RECENT_EVENT_LIMIT)))
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read sync history");
            Vec::new()
        })
}

fn format_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms).map_or_else(
        || ms.to_string(),
        |t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

fn print_status(output: &StatusOutput) {
    println!("cloudsave Status");
    println!("================");
    println!();
    println!("Config:   {}", output.config_path.display());
    println!("Backend:  {}", output.backend);
    println!("Game:     {}", output.game_id.as_deref().unwrap_or("(not set)"));
    match &output.save_dir {
        Some(dir) => println!("Saves:    {}", dir.display()),
        None => println!("Saves:    (unknown)"),
    }
    if !output.missing.is_empty() {
        println!("Missing:  {}", output.missing.join(", "));
    }
    println!();

    match (&output.auth.user, output.auth.authenticated) {
        (Some(user), true) => {
            print!("Logged in as {user}");
            if let Some(expires) = output.auth.expires_at {
                print!(" (token expires {})", format_ms(expires * 1000));
            }
            println!();
        }
        _ => {
            println!("Not logged in.");
            println!("  Log in with: cloudsave login <username>");
        }
    }
    println!();

    println!("Syncable files: {} ({})", output.files, format_size(output.total_size));

    if !output.recent_syncs.is_empty() {
        println!();
        println!("Recent syncs:");
        for event in &output.recent_syncs {
            let result = if event.success { "ok" } else { "failed" };
            println!(
                "  {}  {:<6}  {} uploaded",
                format_ms(event.created_at),
                result,
                event.uploaded.len()
            );
            if let Some(error) = &event.error {
                println!("    {error}");
            }
        }
    }
}

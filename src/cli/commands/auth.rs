//! Login, signup, and logout against the configured user pool.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::error::Result;

use super::setup::Settings;

#[derive(Serialize)]
struct AuthOutput<'a> {
    action: &'a str,
    username: Option<&'a str>,
}

fn emit(action: &str, username: Option<&str>, message: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&AuthOutput { action, username })?);
    } else {
        println!("{} {message}", "✓".green());
    }
    Ok(())
}

/// Log in and persist the token session.
///
/// # Errors
///
/// Returns `Error::Authentication` if the credentials are rejected, or a
/// configuration error if the user pool is not configured.
pub fn login(config: Option<&Path>, username: &str, password: &str, json: bool) -> Result<()> {
    let settings = Settings::load(config, None)?;
    settings.cognito()?.login(username, password)?;
    emit("login", Some(username), &format!("Logged in as {username}"), json)
}

/// Register a new account.
///
/// # Errors
///
/// Returns `Error::Authentication` if the signup is rejected, or a
/// configuration error if the user pool is not configured.
pub fn signup(config: Option<&Path>, username: &str, email: &str, password: &str, json: bool) -> Result<()> {
    let settings = Settings::load(config, None)?;
    settings.cognito()?.signup(username, password, email)?;
    emit(
        "signup",
        Some(username),
        &format!("Signed up {username}. Confirm the email sent to {email}, then log in."),
        json,
    )
}

/// Remove the saved session.
///
/// # Errors
///
/// Returns an error if the session file cannot be removed.
pub fn logout(config: Option<&Path>, json: bool) -> Result<()> {
    let settings = Settings::load(config, None)?;
    let cognito = settings.cognito()?;
    let username = cognito.username();
    cognito.logout()?;
    emit("logout", username.as_deref(), "Logged out", json)
}

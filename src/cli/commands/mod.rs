//! Command implementations.

pub mod auth;
pub mod completions;
pub mod init;
pub mod manifest;
pub mod plan;
pub mod setup;
pub mod status;
pub mod sync;
pub mod version;
pub mod watch;

//! cloudsave - Cloud save synchronization for game save directories
//!
//! This crate provides the core functionality for the `cloudsave` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Manifests, action plans, and sync wire types
//! - [`sync`] - Local inventory, reconciliation, transfers, orchestration
//! - [`storage`] - Remote manifest store (SQLite, in-memory) and blob store
//! - [`remote`] - Sync API seam: in-process service and HTTP client
//! - [`auth`] - Identity providers and persisted token sessions
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod remote;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};

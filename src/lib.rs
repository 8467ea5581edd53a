//! Review Assignment - pull request reviewer assignment service.
//!
//! Teams and users live in a membership store, pull requests and their
//! reviewers in a ledger. The assignment engine picks reviewers from the
//! author's active teammates and keeps every multi-step change inside one
//! SQLite transaction. The HTTP API in [`api`] exposes the engine.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod server;
pub mod services;

pub use config::{Config, ConfigError};
pub use error::AppError;
pub use services::{AssignmentEngine, Reassignment};

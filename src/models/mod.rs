//! Data models for the application.
//!
//! These models represent the entities stored in the relational store and
//! returned by the HTTP API.
//!
//! Row types derive FromRow for SQLx queries; API types derive Serialize.

pub mod pull_request;
pub mod user;

// Re-exports for convenient access
pub use pull_request::{PrStatus, PullRequest, PullRequestRow, PullRequestShort};
pub use user::{Team, TeamMember, User};

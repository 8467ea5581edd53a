//! Business logic services.
//!
//! The membership store, the pull request ledger, the coordinator that wraps
//! multi-step writes in transactions, and the assignment engine built on top.
//!
//! Services are independent of the HTTP layer and testable against a
//! temporary database.

pub mod assignment;
pub mod coordinator;
pub mod ledger;
pub mod membership;
pub mod random;

pub use assignment::{AssignmentEngine, Reassignment, MAX_REVIEWERS};
pub use coordinator::Coordinator;
pub use random::{RandomSource, SharedRng};

//! Assignment engine.
//!
//! Picks reviewers for new pull requests, swaps out a single reviewer on
//! request, and merges. Each operation re-reads everything it decides on
//! inside one coordinator transaction; nothing is cached between calls.

use crate::db::now_millis;
use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::pull_request::millis_to_datetime;
use crate::models::{PrStatus, PullRequest};
use crate::services::coordinator::Coordinator;
use crate::services::random::{pick_one, pick_up_to, RandomSource, SharedRng};
use crate::services::{ledger, membership};
use serde::Serialize;
use std::sync::Arc;

/// Upper bound on reviewers picked for a new pull request.
pub const MAX_REVIEWERS: usize = 2;

/// Result of a successful reassignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reassignment {
    pub pr: PullRequest,
    pub replaced_by: String,
}

/// The reviewer assignment engine.
///
/// Cheap to clone; clones share the pool and the random source.
#[derive(Clone)]
pub struct AssignmentEngine {
    coordinator: Coordinator,
    rng: Arc<dyn RandomSource>,
}

impl AssignmentEngine {
    /// Engine with an entropy-seeded random source.
    pub fn new(pool: DbPool) -> Self {
        Self::with_rng(pool, Arc::new(SharedRng::from_entropy()))
    }

    /// Engine drawing from the given random source.
    pub fn with_rng(pool: DbPool, rng: Arc<dyn RandomSource>) -> Self {
        Self {
            coordinator: Coordinator::new(pool),
            rng,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn pool(&self) -> &DbPool {
        self.coordinator.pool()
    }

    /// Create an open pull request and assign up to two reviewers.
    ///
    /// Reviewers are active teammates of the author, drawn uniformly without
    /// replacement. An empty pool is not an error; the PR is created with no
    /// reviewers.
    pub async fn create_pr(
        &self,
        pr_id: &str,
        name: &str,
        author_id: &str,
    ) -> Result<PullRequest, AppError> {
        let mut tx = self.coordinator.begin().await?;

        let author = membership::find_user(&mut tx, author_id)
            .await?
            .ok_or_else(|| AppError::author_not_found(author_id))?;

        if ledger::pull_request_exists(&mut tx, pr_id).await? {
            return Err(AppError::pr_exists(pr_id));
        }

        let candidates: Vec<String> =
            membership::list_active_teammates(&mut tx, &author.team_name, &[author_id])
                .await?
                .into_iter()
                .map(|u| u.user_id)
                .collect();
        let pool_size = candidates.len();
        let reviewers = pick_up_to(self.rng.as_ref(), candidates, MAX_REVIEWERS);

        let pr = PullRequest {
            id: pr_id.to_string(),
            name: name.to_string(),
            author_id: author_id.to_string(),
            status: PrStatus::Open,
            assigned_reviewers: reviewers,
            created_at: millis_to_datetime(now_millis()),
            merged_at: None,
        };
        ledger::insert_pull_request(&mut tx, &pr).await?;
        self.coordinator.commit(tx, "create_pr").await?;

        log::info!(
            "Created PR {} by {} with reviewers {:?} (pool of {})",
            pr.id,
            pr.author_id,
            pr.assigned_reviewers,
            pool_size
        );
        Ok(pr)
    }

    /// Replace `old_reviewer_id` on an open pull request.
    ///
    /// The replacement is an active member of the old reviewer's team who is
    /// neither the author, the old reviewer, nor already a reviewer. It takes
    /// the old reviewer's position in the list.
    pub async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<Reassignment, AppError> {
        let mut tx = self.coordinator.begin().await?;

        let mut pr = ledger::fetch_pull_request(&mut tx, pr_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id))?;

        if !pr.is_open() {
            return Err(AppError::pr_merged(pr_id));
        }

        if !pr.has_reviewer(old_reviewer_id) {
            return Err(AppError::not_assigned(pr_id, old_reviewer_id));
        }

        let old_reviewer = membership::find_user(&mut tx, old_reviewer_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("User", old_reviewer_id))?;

        let mut exclude: Vec<&str> = vec![pr.author_id.as_str(), old_reviewer_id];
        exclude.extend(pr.assigned_reviewers.iter().map(String::as_str));

        let candidates: Vec<String> =
            membership::list_active_teammates(&mut tx, &old_reviewer.team_name, &exclude)
                .await?
                .into_iter()
                .map(|u| u.user_id)
                .collect();

        let new_reviewer = pick_one(self.rng.as_ref(), candidates)
            .ok_or_else(|| AppError::no_candidate(pr_id, old_reviewer_id))?;

        let slot = ledger::remove_reviewer(&mut tx, pr_id, old_reviewer_id)
            .await?
            .ok_or_else(|| AppError::not_assigned(pr_id, old_reviewer_id))?;
        ledger::add_reviewer(&mut tx, pr_id, &new_reviewer, slot, now_millis()).await?;
        self.coordinator.commit(tx, "reassign_reviewer").await?;

        for reviewer in pr.assigned_reviewers.iter_mut() {
            if reviewer.as_str() == old_reviewer_id {
                *reviewer = new_reviewer.clone();
            }
        }

        log::info!(
            "Reassigned PR {}: {} -> {}",
            pr.id,
            old_reviewer_id,
            new_reviewer
        );
        Ok(Reassignment {
            pr,
            replaced_by: new_reviewer,
        })
    }

    /// Merge a pull request. Merging a merged PR returns it unchanged.
    pub async fn merge_pr(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        let mut tx = self.coordinator.begin().await?;

        let mut pr = ledger::fetch_pull_request(&mut tx, pr_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id))?;

        if !pr.is_open() {
            log::debug!("PR {} already merged", pr_id);
            return Ok(pr);
        }

        let merged_at = now_millis();
        ledger::mark_merged(&mut tx, pr_id, merged_at).await?;
        self.coordinator.commit(tx, "merge_pr").await?;

        pr.status = PrStatus::Merged;
        pr.merged_at = Some(millis_to_datetime(merged_at));

        log::info!("Merged PR {}", pr_id);
        Ok(pr)
    }

    /// Fetch a pull request with its reviewers.
    pub async fn get_pr(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        let mut conn = self.pool().acquire().await?;
        ledger::fetch_pull_request(&mut conn, pr_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id))
    }

    /// Pull requests `user_id` reviews, newest first.
    pub async fn user_reviews(&self, user_id: &str) -> Result<Vec<PullRequest>, AppError> {
        ledger::reviews_for_user(self.pool(), user_id).await
    }
}

impl std::fmt::Debug for AssignmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentEngine")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Team, TeamMember};
    use crate::services::random::tests::ScriptedRng;
    use tempfile::tempdir;

    async fn engine_with(
        members: &[(&str, bool)],
        rng: Arc<dyn RandomSource>,
    ) -> (tempfile::TempDir, AssignmentEngine) {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("test.db"))
            .await
            .unwrap();
        let engine = AssignmentEngine::with_rng(pool, rng);

        let team = Team {
            team_name: "T".into(),
            members: members
                .iter()
                .map(|(id, active)| TeamMember {
                    user_id: id.to_string(),
                    username: id.to_lowercase(),
                    is_active: *active,
                })
                .collect(),
        };
        membership::create_team(engine.coordinator(), &team)
            .await
            .unwrap();
        (dir, engine)
    }

    #[tokio::test]
    async fn test_created_reviewers_are_persisted() {
        let (_dir, engine) = engine_with(
            &[("A", true), ("B", true), ("C", true), ("D", true)],
            Arc::new(ScriptedRng::new(&[0, 0])),
        )
        .await;

        let pr = engine.create_pr("p1", "x", "A").await.unwrap();
        assert_eq!(pr.assigned_reviewers.len(), 2);
        assert!(!pr.has_reviewer("A"));

        let stored = engine.get_pr("p1").await.unwrap();
        assert_eq!(stored.assigned_reviewers, pr.assigned_reviewers);
    }

    #[tokio::test]
    async fn test_reassign_preserves_position() {
        let (_dir, engine) = engine_with(
            &[("A", true), ("B", true), ("C", true), ("D", true)],
            Arc::new(SharedRng::seeded(3)),
        )
        .await;

        let pr = engine.create_pr("p1", "x", "A").await.unwrap();
        let first = pr.assigned_reviewers[0].clone();
        let second = pr.assigned_reviewers[1].clone();

        let result = engine.reassign_reviewer("p1", &first).await.unwrap();
        assert_eq!(result.pr.assigned_reviewers[0], result.replaced_by);
        assert_eq!(result.pr.assigned_reviewers[1], second);

        // the only eligible user left is the one not yet assigned
        let expected: Vec<&str> = ["B", "C", "D"]
            .into_iter()
            .filter(|id| *id != first && *id != second)
            .collect();
        assert_eq!(vec![result.replaced_by.as_str()], expected);

        let stored = engine.get_pr("p1").await.unwrap();
        assert_eq!(stored.assigned_reviewers, result.pr.assigned_reviewers);
    }

    #[tokio::test]
    async fn test_merge_then_reassign_fails() {
        let (_dir, engine) = engine_with(
            &[("A", true), ("B", true), ("C", true), ("D", true)],
            Arc::new(SharedRng::seeded(5)),
        )
        .await;

        let pr = engine.create_pr("p1", "x", "A").await.unwrap();
        let merged = engine.merge_pr("p1").await.unwrap();
        assert_eq!(merged.status, PrStatus::Merged);
        assert!(merged.merged_at.is_some());

        let err = engine
            .reassign_reviewer("p1", &pr.assigned_reviewers[0])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PrMerged { .. }));
        assert_eq!(
            engine.get_pr("p1").await.unwrap().assigned_reviewers,
            pr.assigned_reviewers
        );
    }

    #[tokio::test]
    async fn test_reassign_unassigned_reviewer() {
        let (_dir, engine) = engine_with(
            &[("A", true), ("B", true)],
            Arc::new(SharedRng::seeded(1)),
        )
        .await;

        engine.create_pr("p1", "x", "A").await.unwrap();
        let err = engine.reassign_reviewer("p1", "A").await.unwrap_err();
        assert!(matches!(err, AppError::NotAssigned { .. }));
    }

    #[tokio::test]
    async fn test_unknown_author() {
        let (_dir, engine) = engine_with(&[("A", true)], Arc::new(SharedRng::seeded(1))).await;

        let err = engine.create_pr("p1", "x", "nobody").await.unwrap_err();
        assert!(matches!(err, AppError::AuthorNotFound { .. }));
        assert!(matches!(
            engine.get_pr("p1").await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_lone_author_gets_no_reviewers() {
        let (_dir, engine) = engine_with(
            &[("A", true), ("B", false)],
            Arc::new(SharedRng::seeded(1)),
        )
        .await;

        let pr = engine.create_pr("p1", "x", "A").await.unwrap();
        assert!(pr.assigned_reviewers.is_empty());
        assert_eq!(pr.status, PrStatus::Open);
    }
}

//! End-to-end assignment behaviour against a real database.
//!
//! Scenarios:
//! 1. Reviewer selection respects team, activity and author exclusion
//! 2. Reassignment replaces exactly one reviewer or fails without changes
//! 3. Merge freezes reviewers and is idempotent
//! 4. Failed operations leave stored state untouched

use review_assignment::db;
use review_assignment::error::AppError;
use review_assignment::models::{PrStatus, Team, TeamMember};
use review_assignment::services::{membership, AssignmentEngine, SharedRng, MAX_REVIEWERS};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::tempdir;

fn member(id: &str, active: bool) -> TeamMember {
    TeamMember {
        user_id: id.to_string(),
        username: format!("user {}", id),
        is_active: active,
    }
}

async fn setup(seed: u64, teams: &[(&str, &[(&str, bool)])]) -> (tempfile::TempDir, AssignmentEngine) {
    let dir = tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("assign.db")).await.unwrap();
    let engine = AssignmentEngine::with_rng(pool, Arc::new(SharedRng::seeded(seed)));

    for (name, members) in teams {
        let team = Team {
            team_name: name.to_string(),
            members: members.iter().map(|(id, active)| member(id, *active)).collect(),
        };
        membership::create_team(engine.coordinator(), &team)
            .await
            .unwrap();
    }
    (dir, engine)
}

async fn pr_count(engine: &AssignmentEngine) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM pull_requests")
        .fetch_one(engine.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_three_member_team_uses_everyone_then_runs_dry() {
    let (_dir, engine) = setup(11, &[("T", &[("A", true), ("B", true), ("C", true)])]).await;

    let pr = engine.create_pr("p1", "first", "A").await.unwrap();
    let reviewers: HashSet<&str> = pr.assigned_reviewers.iter().map(String::as_str).collect();
    assert_eq!(reviewers, HashSet::from(["B", "C"]));
    assert_eq!(pr.status, PrStatus::Open);

    let err = engine.reassign_reviewer("p1", "B").await.unwrap_err();
    assert!(matches!(err, AppError::NoCandidate { .. }));

    let stored = engine.get_pr("p1").await.unwrap();
    assert_eq!(stored.assigned_reviewers, pr.assigned_reviewers);
}

#[tokio::test]
async fn test_inactive_teammate_is_skipped() {
    let (_dir, engine) = setup(3, &[("T", &[("A", true), ("B", true), ("C", false)])]).await;

    let pr = engine.create_pr("p2", "second", "A").await.unwrap();
    assert_eq!(pr.assigned_reviewers, vec!["B"]);
}

#[tokio::test]
async fn test_duplicate_id_keeps_first_pr() {
    let (_dir, engine) = setup(5, &[("T", &[("A", true), ("B", true), ("C", true)])]).await;

    let first = engine.create_pr("p3", "original", "A").await.unwrap();
    let err = engine.create_pr("p3", "impostor", "B").await.unwrap_err();
    assert!(matches!(err, AppError::PrExists { .. }));

    let stored = engine.get_pr("p3").await.unwrap();
    assert_eq!(stored, first);
    assert_eq!(pr_count(&engine).await, 1);
}

#[tokio::test]
async fn test_merge_is_idempotent_and_freezes_reviewers() {
    let (_dir, engine) = setup(
        9,
        &[("T", &[("A", true), ("B", true), ("C", true), ("D", true)])],
    )
    .await;

    let pr = engine.create_pr("p4", "merge me", "A").await.unwrap();
    let merged = engine.merge_pr("p4").await.unwrap();
    let again = engine.merge_pr("p4").await.unwrap();

    assert_eq!(merged.status, PrStatus::Merged);
    assert_eq!(again, merged);
    assert_eq!(merged.assigned_reviewers, pr.assigned_reviewers);

    for reviewer in &pr.assigned_reviewers {
        let err = engine.reassign_reviewer("p4", reviewer).await.unwrap_err();
        assert!(matches!(err, AppError::PrMerged { .. }));
    }
    assert_eq!(engine.get_pr("p4").await.unwrap(), merged);
}

#[tokio::test]
async fn test_missing_pr_is_not_found_and_writes_nothing() {
    let (_dir, engine) = setup(1, &[("T", &[("A", true), ("B", true)])]).await;

    assert!(matches!(
        engine.merge_pr("ghost").await,
        Err(AppError::NotFound { .. })
    ));
    assert!(matches!(
        engine.reassign_reviewer("ghost", "B").await,
        Err(AppError::NotFound { .. })
    ));
    assert_eq!(pr_count(&engine).await, 0);
}

#[tokio::test]
async fn test_replacement_comes_from_old_reviewers_team() {
    // B was moved to another team after being assigned
    let (_dir, engine) = setup(
        2,
        &[("T", &[("A", true), ("B", true)]), ("U", &[("X", true)])],
    )
    .await;

    let pr = engine.create_pr("p5", "cross team", "A").await.unwrap();
    assert_eq!(pr.assigned_reviewers, vec!["B"]);

    membership::create_team(
        engine.coordinator(),
        &Team {
            team_name: "V".into(),
            members: vec![member("B", true), member("Y", true)],
        },
    )
    .await
    .unwrap();

    let result = engine.reassign_reviewer("p5", "B").await.unwrap();
    assert_eq!(result.replaced_by, "Y");
    assert_eq!(result.pr.assigned_reviewers, vec!["Y"]);
}

#[tokio::test]
async fn test_reviews_follow_reassignment() {
    let (_dir, engine) = setup(
        4,
        &[("T", &[("A", true), ("B", true), ("C", true), ("D", true)])],
    )
    .await;

    let pr = engine.create_pr("p6", "review list", "A").await.unwrap();
    let old = pr.assigned_reviewers[0].clone();
    let result = engine.reassign_reviewer("p6", &old).await.unwrap();

    assert!(engine.user_reviews(&old).await.unwrap().is_empty());
    let reviews = engine.user_reviews(&result.replaced_by).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].id, "p6");
}

#[tokio::test]
async fn test_selection_invariants_across_seeds() {
    let members: &[(&str, bool)] = &[
        ("A", true),
        ("B", true),
        ("C", false),
        ("D", true),
        ("E", true),
        ("F", false),
    ];
    let eligible: HashSet<&str> = HashSet::from(["B", "D", "E"]);

    for seed in 0..20u64 {
        let (_dir, engine) = setup(seed, &[("T", members)]).await;

        let pr = engine.create_pr("p", "prop", "A").await.unwrap();
        let reviewers: HashSet<&str> = pr.assigned_reviewers.iter().map(String::as_str).collect();
        assert_eq!(reviewers.len(), MAX_REVIEWERS, "seed {}", seed);
        assert!(reviewers.is_subset(&eligible), "seed {}", seed);

        let old = pr.assigned_reviewers[1].clone();
        let result = engine.reassign_reviewer("p", &old).await.unwrap();
        let after: HashSet<&str> = result
            .pr
            .assigned_reviewers
            .iter()
            .map(String::as_str)
            .collect();

        assert_eq!(result.pr.assigned_reviewers.len(), MAX_REVIEWERS);
        assert_eq!(after.len(), MAX_REVIEWERS, "duplicate reviewer, seed {}", seed);
        assert!(!after.contains(old.as_str()));
        assert!(after.is_subset(&eligible));
        assert_eq!(result.pr.assigned_reviewers[0], pr.assigned_reviewers[0]);
        assert_eq!(result.pr.assigned_reviewers[1], result.replaced_by);
    }
}

#[tokio::test]
async fn test_deactivated_reviewer_keeps_assignment_until_reassigned() {
    let (_dir, engine) = setup(
        6,
        &[("T", &[("A", true), ("B", true), ("C", true), ("D", true), ("E", true)])],
    )
    .await;

    let pr = engine.create_pr("p1", "before leave", "A").await.unwrap();
    let old = pr.assigned_reviewers[0].clone();
    let kept = pr.assigned_reviewers[1].clone();

    let user = membership::set_user_active(engine.pool(), &old, false)
        .await
        .unwrap();
    assert!(!user.is_active);

    // deactivation does not touch existing assignments
    let stored = engine.get_pr("p1").await.unwrap();
    assert_eq!(stored.assigned_reviewers, pr.assigned_reviewers);
    assert_eq!(engine.user_reviews(&old).await.unwrap().len(), 1);

    let result = engine.reassign_reviewer("p1", &old).await.unwrap();
    assert_eq!(result.pr.assigned_reviewers, vec![result.replaced_by.clone(), kept.clone()]);
    assert!(![old.as_str(), kept.as_str(), "A"].contains(&result.replaced_by.as_str()));

    let team = membership::get_team(engine.pool(), "T").await.unwrap();
    let replacement = team
        .members
        .iter()
        .find(|m| m.user_id == result.replaced_by)
        .unwrap();
    assert!(replacement.is_active);

    for i in 2..12 {
        let id = format!("p{}", i);
        let later = engine.create_pr(&id, "after leave", "A").await.unwrap();
        assert!(!later.has_reviewer(&old), "{} picked inactive {}", id, old);
        assert_eq!(later.assigned_reviewers.len(), MAX_REVIEWERS);
    }
}

//! Pull request ledger.
//!
//! Persistence for pull request headers and reviewer assignments. Reviewers
//! are ordered by `slot`; a replacement takes over the slot of the reviewer
//! it replaces. The two reviewer primitives, [`remove_reviewer`] and
//! [`add_reviewer`], are only meaningful when composed inside one
//! coordinator transaction.

use crate::db::pool::DbPool;
use crate::error::{is_unique_violation, AppError};
use crate::models::{PrStatus, PullRequest, PullRequestRow};
use crate::services::membership;
use sqlx::SqliteConnection;

/// Load a pull request with its reviewers attached.
pub async fn fetch_pull_request(
    conn: &mut SqliteConnection,
    pr_id: &str,
) -> Result<Option<PullRequest>, AppError> {
    let row: Option<PullRequestRow> = sqlx::query_as(
        r#"
        SELECT pull_request_id, pull_request_name, author_id, status, created_at, merged_at
        FROM pull_requests
        WHERE pull_request_id = ?
        "#,
    )
    .bind(pr_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let reviewers = fetch_reviewers(conn, pr_id).await?;
    row.into_pull_request(reviewers).map(Some)
}

/// Reviewer ids for a pull request in assignment order.
pub async fn fetch_reviewers(
    conn: &mut SqliteConnection,
    pr_id: &str,
) -> Result<Vec<String>, AppError> {
    let reviewers = sqlx::query_scalar(
        "SELECT reviewer_id FROM pr_reviewers WHERE pr_id = ? ORDER BY slot",
    )
    .bind(pr_id)
    .fetch_all(conn)
    .await?;

    Ok(reviewers)
}

/// Check whether a pull request id is taken.
pub async fn pull_request_exists(
    conn: &mut SqliteConnection,
    pr_id: &str,
) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT 1 FROM pull_requests WHERE pull_request_id = ?")
        .bind(pr_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

/// Insert a pull request header and one assignment row per reviewer.
///
/// Reviewers get slots `0..n` in the order given.
pub async fn insert_pull_request(
    conn: &mut SqliteConnection,
    pr: &PullRequest,
) -> Result<(), AppError> {
    let created_at = pr.created_at.timestamp_millis();

    sqlx::query(
        r#"
        INSERT INTO pull_requests (pull_request_id, pull_request_name, author_id, status, created_at, merged_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&pr.id)
    .bind(&pr.name)
    .bind(&pr.author_id)
    .bind(pr.status.as_str())
    .bind(created_at)
    .bind(pr.merged_at.map(|t| t.timestamp_millis()))
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::pr_exists(&pr.id)
        } else {
            AppError::from(e)
        }
    })?;

    for (slot, reviewer_id) in pr.assigned_reviewers.iter().enumerate() {
        add_reviewer(&mut *conn, &pr.id, reviewer_id, slot as i64, created_at).await?;
    }

    Ok(())
}

/// Set status to merged and stamp the merge time.
pub async fn mark_merged(
    conn: &mut SqliteConnection,
    pr_id: &str,
    merged_at: i64,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE pull_requests SET status = ?, merged_at = ? WHERE pull_request_id = ? AND status = ?",
    )
    .bind(PrStatus::Merged.as_str())
    .bind(merged_at)
    .bind(pr_id)
    .bind(PrStatus::Open.as_str())
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::internal(format!(
            "pull request {} was not open when merging",
            pr_id
        )));
    }
    Ok(())
}

/// Remove one reviewer assignment, returning the slot it held.
pub async fn remove_reviewer(
    conn: &mut SqliteConnection,
    pr_id: &str,
    reviewer_id: &str,
) -> Result<Option<i64>, AppError> {
    let slot = sqlx::query_scalar(
        "DELETE FROM pr_reviewers WHERE pr_id = ? AND reviewer_id = ? RETURNING slot",
    )
    .bind(pr_id)
    .bind(reviewer_id)
    .fetch_optional(conn)
    .await?;

    Ok(slot)
}

/// Add one reviewer assignment at `slot`.
pub async fn add_reviewer(
    conn: &mut SqliteConnection,
    pr_id: &str,
    reviewer_id: &str,
    slot: i64,
    assigned_at: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO pr_reviewers (pr_id, reviewer_id, slot, assigned_at) VALUES (?, ?, ?, ?)",
    )
    .bind(pr_id)
    .bind(reviewer_id)
    .bind(slot)
    .bind(assigned_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Pull requests where `user_id` is a reviewer, newest first.
pub async fn reviews_for_user(pool: &DbPool, user_id: &str) -> Result<Vec<PullRequest>, AppError> {
    let mut conn = pool.acquire().await?;

    if !membership::user_exists(&mut conn, user_id).await? {
        return Err(AppError::not_found_with_id("User", user_id));
    }

    let rows: Vec<PullRequestRow> = sqlx::query_as(
        r#"
        SELECT pr.pull_request_id, pr.pull_request_name, pr.author_id,
               pr.status, pr.created_at, pr.merged_at
        FROM pull_requests pr
        JOIN pr_reviewers prr ON pr.pull_request_id = prr.pr_id
        WHERE prr.reviewer_id = ?
        ORDER BY pr.created_at DESC, pr.rowid DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut prs = Vec::with_capacity(rows.len());
    for row in rows {
        let reviewers = fetch_reviewers(&mut conn, &row.pull_request_id).await?;
        prs.push(row.into_pull_request(reviewers)?);
    }

    Ok(prs)
}

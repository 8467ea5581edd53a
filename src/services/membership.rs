//! Membership store: teams, users and their active flags.
//!
//! Connection-level functions take `&mut SqliteConnection` so the assignment
//! engine can call them inside its own transaction.

use crate::db::now_millis;
use crate::db::pool::DbPool;
use crate::error::{is_unique_violation, AppError};
use crate::models::{Team, TeamMember, User};
use crate::services::coordinator::Coordinator;
use sqlx::SqliteConnection;
use std::collections::HashSet;

/// Create a team and upsert its members.
///
/// Creation is create-only: an existing team name fails with `TeamExists`
/// and nothing is written. Members are upserted by user id, so a user that
/// already exists moves to this team with the new name and active flag.
pub async fn create_team(coordinator: &Coordinator, team: &Team) -> Result<Team, AppError> {
    validate_members(&team.members)?;

    let mut tx = coordinator.begin().await?;

    let exists = sqlx::query("SELECT 1 FROM teams WHERE name = ?")
        .bind(&team.team_name)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if exists {
        return Err(AppError::team_exists(&team.team_name));
    }

    let now = now_millis();
    sqlx::query("INSERT INTO teams (name, created_at, updated_at) VALUES (?, ?, ?)")
        .bind(&team.team_name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::team_exists(&team.team_name)
            } else {
                AppError::from(e)
            }
        })?;

    for member in &team.members {
        upsert_member(&mut tx, &team.team_name, member, now).await?;
    }

    let created = load_team(&mut tx, &team.team_name).await?;
    coordinator.commit(tx, "create_team").await?;

    log::info!(
        "Created team {} with {} members",
        created.team_name,
        created.members.len()
    );
    Ok(created)
}

/// Fetch a team with members ordered by user id.
pub async fn get_team(pool: &DbPool, team_name: &str) -> Result<Team, AppError> {
    let mut conn = pool.acquire().await?;
    load_team(&mut conn, team_name).await
}

/// Flip a user's active flag and return the updated user.
pub async fn set_user_active(
    pool: &DbPool,
    user_id: &str,
    is_active: bool,
) -> Result<User, AppError> {
    let user: Option<User> = sqlx::query_as(
        r#"
        UPDATE users
        SET is_active = ?, updated_at = ?
        WHERE user_id = ?
        RETURNING user_id, username, team_name, is_active
        "#,
    )
    .bind(is_active)
    .bind(now_millis())
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let user = user.ok_or_else(|| AppError::not_found_with_id("User", user_id))?;
    log::info!("User {} active = {}", user.user_id, user.is_active);
    Ok(user)
}

/// Look up a user by id.
pub async fn find_user(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as(
        "SELECT user_id, username, team_name, is_active FROM users WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(user)
}

/// Check whether a user exists.
pub async fn user_exists(conn: &mut SqliteConnection, user_id: &str) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT 1 FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

/// Active members of `team_name` whose id is not in `exclude`.
///
/// The result is an unordered candidate pool. Exclusions are applied in
/// process against a fixed, fully parameterized query.
pub async fn list_active_teammates(
    conn: &mut SqliteConnection,
    team_name: &str,
    exclude: &[&str],
) -> Result<Vec<User>, AppError> {
    let members: Vec<User> = sqlx::query_as(
        r#"
        SELECT user_id, username, team_name, is_active
        FROM users
        WHERE team_name = ? AND is_active = 1
        "#,
    )
    .bind(team_name)
    .fetch_all(conn)
    .await?;

    let exclude: HashSet<&str> = exclude.iter().copied().collect();
    Ok(members
        .into_iter()
        .filter(|u| !exclude.contains(u.user_id.as_str()))
        .collect())
}

async fn load_team(conn: &mut SqliteConnection, team_name: &str) -> Result<Team, AppError> {
    let exists = sqlx::query("SELECT 1 FROM teams WHERE name = ?")
        .bind(team_name)
        .fetch_optional(&mut *conn)
        .await?
        .is_some();
    if !exists {
        return Err(AppError::not_found_with_id("Team", team_name));
    }

    let members: Vec<TeamMember> = sqlx::query_as(
        r#"
        SELECT user_id, username, is_active
        FROM users
        WHERE team_name = ?
        ORDER BY user_id
        "#,
    )
    .bind(team_name)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Team {
        team_name: team_name.to_string(),
        members,
    })
}

async fn upsert_member(
    conn: &mut SqliteConnection,
    team_name: &str,
    member: &TeamMember,
    now: i64,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO users (user_id, username, team_name, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id) DO UPDATE SET
            username = excluded.username,
            team_name = excluded.team_name,
            is_active = excluded.is_active,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&member.user_id)
    .bind(&member.username)
    .bind(team_name)
    .bind(member.is_active)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

fn validate_members(members: &[TeamMember]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for member in members {
        if member.user_id.trim().is_empty() {
            return Err(AppError::invalid_input_field(
                "member user_id must not be empty",
                "members",
            ));
        }
        if !seen.insert(member.user_id.as_str()) {
            return Err(AppError::invalid_input_field(
                format!("duplicate member {}", member.user_id),
                "members",
            ));
        }
    }
    Ok(())
}

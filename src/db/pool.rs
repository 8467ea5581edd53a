//! SQLite connection pool.
//!
//! All writers share one database file. WAL lets reads proceed while a
//! coordinator transaction holds the write lock, and [`WRITE_LOCK_WAIT`] is
//! how long a second writer queues for that lock before giving up.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<Sqlite>;

/// Pool size used when the configuration does not set one.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout applied to every connection.
pub const WRITE_LOCK_WAIT: Duration = Duration::from_secs(30);

/// Pool checkout must outlast one queued writer.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(45);

/// Open the pool for `db_path` with at most `max_connections` connections.
pub async fn create_pool(db_path: &Path, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let db_url = format!("sqlite:{}", db_path.display());

    let connect_options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        // Cascades from teams to users and from pull requests to reviewers
        .foreign_keys(true)
        .busy_timeout(WRITE_LOCK_WAIT)
        // PRAGMA optimize as each connection closes, sampling 400 rows per index
        .optimize_on_close(true, 400);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .min_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(connect_options)
        .await?;

    log::debug!(
        "Opened pool for {} (max {} connections)",
        db_path.display(),
        max_connections.max(1)
    );
    Ok(pool)
}

//! Schema migrations for the cache database.
//!
//! Applied versions are recorded in `_migrations`; every batch uses
//! `IF NOT EXISTS` so a partially applied run can be repeated.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Ordered (version, SQL batch) pairs.
const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_cache_stores.sql")),
    (2, include_str!("../../migrations/002_sync_queue.sql")),
];

/// Apply every migration newer than the recorded schema version.
///
/// # Errors
///
/// Returns an error if a migration batch fails to execute.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
            conn.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            conn.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tracing::debug!(version, "applied cache migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

//! Schema versions for the cache database.
//!
//! `schema_version` records every applied step. Each step runs in its own
//! transaction together with its version row, so a database is either at
//! version N with the full N schema or still at N-1.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Schema steps in application order.
pub(crate) type Step = (i64, &'static str);

const STEPS: &[Step] = &[
    (1, include_str!("../../migrations/001_generations.sql")),
    (2, include_str!("../../migrations/002_entries.sql")),
];

/// Bring the schema up to the latest version.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the first step that did not apply.
/// Earlier steps stay applied.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    apply(conn, STEPS).await
}

pub(crate) async fn apply(conn: &Connection, steps: &'static [Step]) -> Result<(), Error> {
    conn.call(move |conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current = current_version(conn)?;

        for &(version, sql) in steps.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("step {version}: {e}")))?;
            tx.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "cache schema upgraded");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

fn current_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))?;
    Ok(version)
}

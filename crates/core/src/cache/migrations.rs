//! Database schema migrations.
//!
//! A `_migrations` table records the highest applied version. Each pending
//! migration runs inside its own transaction together with its bookkeeping
//! row, so a failed batch leaves the schema at the previous version.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Migration list: (version, SQL), in application order.
///
/// Every batch uses CREATE ... IF NOT EXISTS so replaying one is harmless.
const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_entries.sql")),
    (2, include_str!("../../migrations/002_app_state.sql")),
];

/// Apply every migration newer than the recorded version.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the version whose SQL failed.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    let applied = conn
        .call(|conn| -> Result<Vec<i64>, Error> {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS _migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL
                )",
                [],
            )?;

            let current: i64 =
                conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

            let mut applied = Vec::new();
            for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
                let tx = conn.transaction()?;
                tx.execute_batch(sql)
                    .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
                tx.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version, chrono::Utc::now().to_rfc3339()],
                )?;
                tx.commit()?;
                applied.push(*version);
            }

            Ok(applied)
        })
        .await
        .map_err(Error::from)?;

    if !applied.is_empty() {
        tracing::debug!(?applied, "applied cache schema migrations");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        for table in ["caches", "entries", "app_state"] {
            let exists: bool = conn
                .call(move |conn| {
                    conn.query_row(
                        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                        params![table],
                        |row| row.get(0),
                    )
                })
                .await
                .unwrap();
            assert!(exists, "missing table {table}");
        }
    }

    #[tokio::test]
    async fn test_migrations_version_tracking() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let count: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();

        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_migrations_resume_from_partial_version() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| {
            conn.execute_batch(include_str!("../../migrations/001_entries.sql"))?;
            conn.execute_batch(
                "CREATE TABLE _migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);
                 INSERT INTO _migrations (version, applied_at) VALUES (1, 'earlier');",
            )
        })
        .await
        .unwrap();

        run(&conn).await.unwrap();

        let max: i64 = conn
            .call(|conn| conn.query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(max, 2);
    }
}

//! Durable key-value state.
//!
//! Holds the first-launch marker and the last activated cache version.
//! Stored apart from the cache containers so activation's garbage collection
//! never touches them.

use super::connection::CacheDb;
use crate::Error;
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Key of the first-launch completion marker.
pub const FIRST_LAUNCH_KEY: &str = "pictoh-first-launch-complete";

/// Key of the cache version that last completed activation.
pub const ACTIVE_VERSION_KEY: &str = "pictoh-active-version";

impl CacheDb {
    /// Read a state value.
    pub async fn get_state(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row("SELECT value FROM app_state WHERE key = ?1", params![key], |row| row.get(0));
                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or update a state value.
    pub async fn set_state(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO app_state (key, value, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![key, value, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// True when first-launch setup has not been completed yet.
    ///
    /// An unreadable store counts as "already launched" so a broken store
    /// never traps the user in the loading screen.
    pub async fn is_first_launch(&self) -> bool {
        match self.get_state(FIRST_LAUNCH_KEY).await {
            Ok(marker) => marker.is_none(),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read first-launch marker");
                false
            }
        }
    }

    /// Record first-launch completion with the current timestamp.
    ///
    /// Storage failures are logged and ignored.
    pub async fn mark_first_launch_complete(&self) {
        if let Err(e) = self.set_state(FIRST_LAUNCH_KEY, &Utc::now().to_rfc3339()).await {
            tracing::warn!(error = %e, "cannot persist first-launch marker");
        }
    }

    /// The cache version that last completed activation, if any.
    ///
    /// An unreadable store reads as "none recorded".
    pub async fn active_version(&self) -> Option<String> {
        match self.get_state(ACTIVE_VERSION_KEY).await {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read active cache version");
                None
            }
        }
    }

    /// Record `version` as the active one. Storage failures are logged and
    /// ignored.
    pub async fn record_active_version(&self, version: &str) {
        if let Err(e) = self.set_state(ACTIVE_VERSION_KEY, version).await {
            tracing::warn!(version, error = %e, "cannot persist active cache version");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::connection::CacheDb;
    use super::*;

    #[tokio::test]
    async fn test_set_and_get_state() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_state("k").await.unwrap().is_none());

        db.set_state("k", "one").await.unwrap();
        db.set_state("k", "two").await.unwrap();

        assert_eq!(db.get_state("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_first_launch_marker() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.is_first_launch().await);

        db.mark_first_launch_complete().await;

        assert!(!db.is_first_launch().await);
        let marker = db.get_state(FIRST_LAUNCH_KEY).await.unwrap().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&marker).is_ok());
    }

    #[tokio::test]
    async fn test_marker_survives_cache_deletion() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.mark_first_launch_complete().await;
        db.open_cache("pictoh-v1").await.unwrap();
        db.delete_cache("pictoh-v1").await.unwrap();

        assert!(!db.is_first_launch().await);
    }

    #[tokio::test]
    async fn test_active_version_round_trip() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.active_version().await.is_none());

        db.record_active_version("v1").await;
        db.record_active_version("v2").await;

        assert_eq!(db.active_version().await.as_deref(), Some("v2"));
    }
}

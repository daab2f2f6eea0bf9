//! Count-based eviction and age-based expiration.
//!
//! The two are independent: an entry can be evicted by count pressure long
//! before it would expire, and vice versa. Eviction is FIFO by insertion
//! sequence; reads never refresh an entry's position.

use super::connection::CacheDb;
use super::entries::CachedEntry;
use crate::Error;
use chrono::{DateTime, Duration, Utc};
use tokio_rusqlite::params;

/// Whether an entry is older than `max_age` at `now`.
///
/// Entries without a recorded insertion time never expire.
pub fn is_expired(entry: &CachedEntry, max_age: Duration, now: DateTime<Utc>) -> bool {
    entry.inserted_at.is_some_and(|at| now - at > max_age)
}

impl CacheDb {
    /// Delete the oldest entries until `cache` holds at most `max_entries`.
    ///
    /// Returns the number of deleted entries.
    pub async fn enforce_limit(&self, cache: &str, max_entries: usize) -> Result<u64, Error> {
        let cache = cache.to_string();
        let max = max_entries as i64;
        let deleted = self
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE cache_name = ?1", params![cache], |row| {
                        row.get(0)
                    })?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND key_hash IN (
                        SELECT key_hash FROM entries WHERE cache_name = ?1 ORDER BY seq ASC LIMIT ?2
                    )",
                    params![cache, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)?;

        if deleted > 0 {
            tracing::debug!(deleted, max_entries, "evicted oldest cache entries");
        }
        Ok(deleted)
    }

    /// Delete entries of `cache` older than `max_age` at `now`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired(&self, cache: &str, max_age: Duration, now: DateTime<Utc>) -> Result<u64, Error> {
        let cache = cache.to_string();
        let cutoff = (now - max_age).timestamp_millis();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND inserted_at IS NOT NULL AND inserted_at < ?2",
                    params![cache, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

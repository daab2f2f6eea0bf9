//! Cache container and entry operations.
//!
//! A container is opened implicitly by the first write. Each write assigns
//! the entry the next sequence number of its container, so re-storing a URL
//! moves it to the newest position while keeping exactly one row per key.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use crate::http::{Request, Response};
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A response stored in a cache container.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub cache: String,
    pub method: String,
    pub response: Response,
    /// From the response `date` header; `None` never expires by age.
    pub inserted_at: Option<DateTime<Utc>>,
    /// Position in the container's insertion order (higher is newer).
    pub seq: i64,
}

impl CachedEntry {
    pub fn url(&self) -> &str {
        &self.response.url
    }
}

fn row_to_entry(cache: &str, row: &rusqlite::Row<'_>) -> rusqlite::Result<(CachedEntry, String)> {
    let inserted_at: Option<i64> = row.get(5)?;
    let headers_json: String = row.get(3)?;
    let body: Vec<u8> = row.get(4)?;
    let entry = CachedEntry {
        cache: cache.to_string(),
        method: row.get(0)?,
        response: Response { url: row.get(1)?, status: row.get(2)?, headers: BTreeMap::new(), body: body.into() },
        inserted_at: inserted_at.and_then(DateTime::from_timestamp_millis),
        seq: row.get(6)?,
    };
    Ok((entry, headers_json))
}

fn decode_headers(entry: (CachedEntry, String)) -> Result<CachedEntry, Error> {
    let (mut entry, headers_json) = entry;
    entry.response.headers = serde_json::from_str(&headers_json)?;
    Ok(entry)
}

impl CacheDb {
    /// Create a container if it does not exist yet.
    pub async fn open_cache(&self, cache: &str) -> Result<(), Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![cache, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_cache(&self, cache: &str) -> Result<bool, Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)", params![cache], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every container, in creation order.
    pub async fn list_caches(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a container and all of its entries.
    ///
    /// Returns false if the container did not exist.
    pub async fn delete_cache(&self, cache: &str) -> Result<bool, Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE cache_name = ?1", params![cache])?;
                let deleted = tx.execute("DELETE FROM caches WHERE name = ?1", params![cache])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response for a request, replacing any previous entry for the
    /// same request and making it the newest entry of the container.
    ///
    /// Returns the entry's new sequence number.
    pub async fn put(&self, cache: &str, request: &Request, response: &Response) -> Result<i64, Error> {
        let cache = cache.to_string();
        let method = request.method.clone();
        let url = request.url.to_string();
        let key_hash = compute_cache_key(&method, &url);
        let headers_json = serde_json::to_string(&response.headers)?;
        let status = response.status;
        let body = response.body.to_vec();
        let inserted_at = response.date().map(|d| d.timestamp_millis());

        self.conn
            .call(move |conn| -> Result<i64, Error> {
                let tx = conn.transaction()?;
                let now = Utc::now().to_rfc3339();
                tx.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![cache, now],
                )?;
                let seq: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(seq), 0) + 1 FROM entries WHERE cache_name = ?1",
                    params![cache],
                    |row| row.get(0),
                )?;
                tx.execute(
                    "INSERT INTO entries (
                        cache_name, key_hash, method, url, status, headers_json, body, inserted_at, seq, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(cache_name, key_hash) DO UPDATE SET
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        inserted_at = excluded.inserted_at,
                        seq = excluded.seq,
                        stored_at = excluded.stored_at",
                    params![cache, key_hash, method, url, status, headers_json, body, inserted_at, seq, now],
                )?;
                tx.commit()?;
                Ok(seq)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for a request.
    ///
    /// Reading never changes the entry's position.
    pub async fn match_request(&self, cache: &str, request: &Request) -> Result<Option<CachedEntry>, Error> {
        let key_hash = compute_cache_key(&request.method, request.url.as_str());
        let cache = cache.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<(CachedEntry, String)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, headers_json, body, inserted_at, seq
                    FROM entries WHERE cache_name = ?1 AND key_hash = ?2",
                )?;

                match stmt.query_row(params![cache, key_hash], |row| row_to_entry(&cache, row)) {
                    Ok(found) => Ok(Some(found)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(decode_headers).transpose()
    }

    /// Remove the entry for a request. Returns false if there was none.
    pub async fn delete_entry(&self, cache: &str, request: &Request) -> Result<bool, Error> {
        let key_hash = compute_cache_key(&request.method, request.url.as_str());
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND key_hash = ?2",
                    params![cache, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of distinct keys in a container.
    pub async fn count_entries(&self, cache: &str) -> Result<usize, Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE cache_name = ?1", params![cache], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of a container, oldest insertion first.
    pub async fn keys(&self, cache: &str) -> Result<Vec<String>, Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE cache_name = ?1 ORDER BY seq ASC")?;
                let urls = stmt
                    .query_map(params![cache], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

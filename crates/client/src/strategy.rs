//! Cache-first and network-first serving.
//!
//! Both strategies write only after a 200 response has arrived, and evict
//! only after that write. Store failures never fail the request: a broken
//! read is a miss, a broken write is logged.

use chrono::Utc;
use pictoh_core::cache::is_expired;
use pictoh_core::{CacheDb, Error, Policy, Request, Response, Strategy};
use serde::Serialize;

use crate::fetch::Fetcher;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Network,
}

/// A response together with its source.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: Source,
}

impl Served {
    fn cache(response: Response) -> Self {
        Self { response, source: Source::Cache }
    }

    fn network(response: Response) -> Self {
        Self { response, source: Source::Network }
    }
}

/// Serve `request` with the strategy its policy names.
pub async fn run_strategy(
    db: &CacheDb, network: &dyn Fetcher, request: &Request, policy: &Policy,
) -> Result<Served, Error> {
    match policy.strategy {
        Strategy::CacheFirst => cache_first(db, network, request, policy).await,
        Strategy::NetworkFirst => network_first(db, network, request, policy).await,
    }
}

/// Serve from `policy.cache` when a fresh entry exists, else from the network.
///
/// Network failures propagate even when an expired entry is still stored.
pub async fn cache_first(
    db: &CacheDb, network: &dyn Fetcher, request: &Request, policy: &Policy,
) -> Result<Served, Error> {
    let url = request.url.as_str();

    match db.match_request(&policy.cache, request).await {
        Ok(Some(entry)) => {
            let expired = policy.max_age.is_some_and(|max_age| is_expired(&entry, max_age, Utc::now()));
            if !expired {
                tracing::debug!(url, cache = %policy.cache, "cache hit");
                return Ok(Served::cache(entry.response));
            }
            tracing::debug!(url, cache = %policy.cache, "cache entry expired");
        }
        Ok(None) => tracing::debug!(url, cache = %policy.cache, "cache miss"),
        Err(e) => tracing::warn!(url, cache = %policy.cache, error = %e, "cache read failed, treating as miss"),
    }

    let response = network.fetch(request).await?;
    store(db, request, &response, policy).await;
    Ok(Served::network(response))
}

/// Serve from the network, falling back to `policy.cache` when the network
/// side fails. Malformed requests are not retried from the cache.
pub async fn network_first(
    db: &CacheDb, network: &dyn Fetcher, request: &Request, policy: &Policy,
) -> Result<Served, Error> {
    let url = request.url.as_str();

    match network.fetch(request).await {
        Ok(response) => {
            store(db, request, &response, policy).await;
            Ok(Served::network(response))
        }
        Err(fetch_err) if !fetch_err.is_network() => Err(fetch_err),
        Err(fetch_err) => match db.match_request(&policy.cache, request).await {
            Ok(Some(entry)) => {
                tracing::debug!(url, error = %fetch_err, "network failed, serving cached copy");
                Ok(Served::cache(entry.response))
            }
            Ok(None) => Err(fetch_err),
            Err(e) => {
                tracing::warn!(url, error = %e, "cache read failed during fallback");
                Err(fetch_err)
            }
        },
    }
}

/// Write a 200 response to `policy.cache` and enforce its entry limit.
///
/// Returns whether the write happened.
pub(crate) async fn store(db: &CacheDb, request: &Request, response: &Response, policy: &Policy) -> bool {
    if !request.is_get() || !response.is_cacheable() {
        return false;
    }

    if let Err(e) = db.put(&policy.cache, request, response).await {
        tracing::warn!(url = %request.url, cache = %policy.cache, error = %e, "cache write failed");
        return false;
    }

    if let Some(max_entries) = policy.max_entries
        && let Err(e) = db.enforce_limit(&policy.cache, max_entries).await
    {
        tracing::warn!(cache = %policy.cache, error = %e, "eviction failed");
    }
    true
}

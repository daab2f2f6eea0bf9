//! Network access.
//!
//! Everything that reaches the network goes through the [`Fetcher`] trait:
//! the real HTTP client, the agent itself (so warm-up downloads pass through
//! interception), and test doubles.
//!
//! ### Semantics
//! - Any HTTP status is a successful fetch; callers decide what to cache.
//! - Connection failures, timeouts and oversized bodies are errors.
//! - Max redirects: 5 (configurable)
//! - Max body bytes: 20MB (configurable)

pub mod url;

use bytes::Bytes;
use pictoh_core::{AppConfig, Error, Request, Response};
use reqwest::{Client, Method, header};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub use url::{UrlError, resolve};

/// Something that turns a request into a response.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pictoh-agent/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl FetchConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// HTTP fetch client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn map_send_error(&self, url: &str, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::FetchTimeout(format!("{url} after {}ms", self.config.timeout.as_millis()))
        } else {
            Error::Network(format!("{url}: {err}"))
        }
    }

    fn check_size(&self, len: usize) -> Result<(), Error> {
        if len > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }
        Ok(())
    }
}

/// Collect headers with lowercased names; repeated headers are joined
/// with ", ".
fn collect_headers(headers: &header::HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    out
}

#[async_trait::async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("bad method {}: {e}", request.method)))?;
        let url = request.url.as_str();

        let response = self
            .http
            .request(method, request.url.clone())
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        if let Some(len) = response.content_length() {
            self.check_size(len as usize)?;
        }

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        let body: Bytes = response.bytes().await.map_err(|e| self.map_send_error(url, e))?;
        self.check_size(body.len())?;

        tracing::debug!(url, status, bytes = body.len(), fetch_ms = start.elapsed().as_millis() as u64, "fetched");

        Ok(Response { url: url.to_string(), status, headers, body })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-process fetcher for tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    pub enum Reply {
        Ok(Response),
        Fail(String),
    }

    /// Replies by URL path; unknown paths fail like an offline network.
    #[derive(Default)]
    pub struct MockFetcher {
        replies: Mutex<HashMap<String, Reply>>,
        calls: Mutex<Vec<String>>,
        count: AtomicUsize,
        delay: Option<Duration>,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_delay(delay: Duration) -> Self {
            Self { delay: Some(delay), ..Self::default() }
        }

        pub fn ok(&self, path: &str, body: &str) {
            let response = Response::new(format!("http://localhost:5173{path}"), 200, body.to_string());
            self.respond(path, response);
        }

        pub fn respond(&self, path: &str, response: Response) {
            self.replies.lock().unwrap().insert(path.to_string(), Reply::Ok(response));
        }

        pub fn fail(&self, path: &str) {
            self.replies
                .lock()
                .unwrap()
                .insert(path.to_string(), Reply::Fail(format!("{path} unreachable")));
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(request.url.path().to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = self.replies.lock().unwrap().get(request.url.path()).cloned();
            match reply {
                Some(Reply::Ok(response)) => Ok(response),
                Some(Reply::Fail(msg)) => Err(Error::Network(msg)),
                None => Err(Error::Network(format!("{} offline", request.url))),
            }
        }
    }
}

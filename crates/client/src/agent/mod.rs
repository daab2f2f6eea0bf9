//! The offline agent.
//!
//! [`Agent`] owns the cache store handle, the network fetcher and the policy
//! table. Every intercepted request runs `classify → policy → strategy`;
//! requests the agent does not own (non-GET, cross-origin, or arriving before
//! activation) go straight to the network and are never cached.
//!
//! When an install fails, the version that was last activated keeps serving
//! from its own containers until a later install succeeds.

pub mod control;
pub mod lifecycle;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pictoh_core::classify::{APP_SHELL_FILES, is_same_origin};
use pictoh_core::{
    AppConfig, CacheDb, CacheNames, Category, Error, Policy, PolicyTable, Request, Response, Strategy, classify,
};
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::{self, Fetcher};
use crate::strategy::{self, Served, Source, run_strategy};

pub use control::{CacheReport, ControlMessage, ControlOutcome, FailedUrl};
pub use lifecycle::LifecycleState;

pub struct Agent {
    db: CacheDb,
    network: Arc<dyn Fetcher>,
    origin: Url,
    config: AppConfig,
    names: CacheNames,
    policies: Arc<PolicyTable>,
    precache_manifest: Vec<String>,
    state: RwLock<LifecycleState>,
    skip_waiting: AtomicBool,
    /// Version and policies of the last activated version, set after this
    /// version failed to install.
    fallback: RwLock<Option<(String, Arc<PolicyTable>)>>,
}

impl Agent {
    pub fn new(db: CacheDb, network: Arc<dyn Fetcher>, config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            db,
            network,
            origin,
            names: config.cache_names(),
            policies: Arc::new(PolicyTable::from_config(config)),
            precache_manifest: config.precache_manifest.clone(),
            state: RwLock::new(LifecycleState::Parsed),
            skip_waiting: AtomicBool::new(false),
            fallback: RwLock::new(None),
            config: config.clone(),
        })
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    /// The cache version requests are currently served from, if any.
    pub async fn serving_version(&self) -> Option<String> {
        if self.state().await.intercepts() {
            return Some(self.names.version().to_string());
        }
        self.fallback.read().await.as_ref().map(|(version, _)| version.clone())
    }

    async fn serving(&self) -> Option<Arc<PolicyTable>> {
        if self.state().await.intercepts() {
            return Some(self.policies.clone());
        }
        self.fallback.read().await.as_ref().map(|(_, policies)| policies.clone())
    }

    /// Build a request for a possibly relative URL, resolved against the
    /// application origin.
    pub fn request(&self, method: &str, url: &str) -> Result<Request, Error> {
        let url = fetch::resolve(url, &self.origin).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Request::new(method, url))
    }

    /// Install, then activate right away.
    pub async fn start(&self) -> Result<(), Error> {
        self.install().await?;
        if self.skip_waiting.load(Ordering::SeqCst) {
            self.activate().await?;
        }
        Ok(())
    }

    /// Fetch the app shell and the precache manifest and store them.
    ///
    /// Every resource must answer 200. If any does not, nothing is written,
    /// the agent becomes redundant and the last activated version, when its
    /// containers are still present, keeps serving.
    pub async fn install(&self) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            if !state.can_install() {
                return Err(Error::InvalidState(format!("cannot install while {}", *state)));
            }
            *state = LifecycleState::Installing;
        }
        tracing::info!(version = self.names.version(), "installing");

        match self.populate().await {
            Ok(count) => {
                *self.state.write().await = LifecycleState::Installed;
                self.skip_waiting.store(true, Ordering::SeqCst);
                tracing::info!(resources = count, "installed");
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = LifecycleState::Redundant;
                tracing::error!(error = %e, "install failed");
                self.fall_back_to_active_version().await;
                Err(e)
            }
        }
    }

    async fn populate(&self) -> Result<usize, Error> {
        let shell = self.names.shell();
        let precache = self.names.precache();
        let targets = APP_SHELL_FILES
            .iter()
            .map(|path| (&shell, *path))
            .chain(self.precache_manifest.iter().map(|url| (&precache, url.as_str())));

        let mut fetched = Vec::new();
        for (cache, url) in targets {
            let install_failed = |reason: String| Error::InstallFailed { url: url.to_string(), reason };
            let request = self.request("GET", url).map_err(|e| install_failed(e.to_string()))?;
            let response = self.network.fetch(&request).await.map_err(|e| install_failed(e.to_string()))?;
            if !response.is_cacheable() {
                return Err(install_failed(format!("status {}", response.status)));
            }
            fetched.push((cache, request, response));
        }

        for (cache, request, response) in &fetched {
            self.db
                .put(cache, request, response)
                .await
                .map_err(|e| Error::InstallFailed { url: request.url.to_string(), reason: e.to_string() })?;
        }
        Ok(fetched.len())
    }

    async fn fall_back_to_active_version(&self) {
        let Some(version) = self.db.active_version().await else {
            tracing::warn!("no previous version to serve, passing requests through");
            return;
        };
        let previous = CacheNames::new(self.names.namespace(), version.as_str());
        match self.db.has_cache(&previous.shell()).await {
            Ok(true) => {
                tracing::warn!(version = %version, "previous version keeps serving");
                let policies = Arc::new(PolicyTable::for_version(&self.config, &version));
                *self.fallback.write().await = Some((version, policies));
            }
            Ok(false) => tracing::warn!(version = %version, "containers of the active version are gone"),
            Err(e) => tracing::warn!(version = %version, error = %e, "cannot look up the active version"),
        }
    }

    /// Delete stale containers of this namespace, then start intercepting.
    ///
    /// Returns the deleted container names.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        {
            let mut state = self.state.write().await;
            if *state != LifecycleState::Installed {
                return Err(Error::InvalidState(format!("cannot activate while {}", *state)));
            }
            *state = LifecycleState::Activating;
        }

        let deleted = match self.collect_garbage().await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(error = %e, "cache cleanup failed");
                Vec::new()
            }
        };

        self.db.record_active_version(self.names.version()).await;
        *self.fallback.write().await = None;
        *self.state.write().await = LifecycleState::Active;
        tracing::info!(deleted = deleted.len(), version = self.names.version(), "activated, claiming clients");
        Ok(deleted)
    }

    /// Delete every container owned by this namespace that the current
    /// version does not use.
    pub async fn collect_garbage(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.db.list_caches().await? {
            if !self.names.is_stale(&name) {
                continue;
            }
            match self.db.delete_cache(&name).await {
                Ok(_) => {
                    tracing::info!(cache = %name, "deleted stale cache");
                    deleted.push(name);
                }
                Err(e) => tracing::warn!(cache = %name, error = %e, "cannot delete stale cache"),
            }
        }
        Ok(deleted)
    }

    /// Record skip-waiting; promotes an installed agent immediately.
    ///
    /// Returns whether the agent was promoted by this call.
    pub async fn skip_waiting(&self) -> Result<bool, Error> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        if self.state().await == LifecycleState::Installed {
            self.activate().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// The policy that applies to `request`, or `None` when the agent does
    /// not own it.
    pub fn policy_for(&self, request: &Request) -> Option<&Policy> {
        self.owns(request).then(|| self.policies.for_category(classify(&request.url)))
    }

    fn owns(&self, request: &Request) -> bool {
        request.is_get() && is_same_origin(&request.url, &self.origin)
    }

    /// Serve a request, reporting where the response came from.
    pub async fn serve(&self, mut request: Request) -> Result<Served, Error> {
        request.url.set_fragment(None);
        let serving = self.serving().await.filter(|_| self.owns(&request));

        match serving {
            Some(policies) => {
                let policy = policies.for_category(classify(&request.url));
                run_strategy(&self.db, self.network.as_ref(), &request, policy).await
            }
            None => {
                tracing::debug!(url = %request.url, method = %request.method, "passing through");
                let response = self.network.fetch(&request).await?;
                Ok(Served { response, source: Source::Network })
            }
        }
    }

    /// Serve a request.
    pub async fn handle(&self, request: Request) -> Result<Response, Error> {
        self.serve(request).await.map(|served| served.response)
    }

    pub async fn handle_message(&self, message: ControlMessage) -> Result<ControlOutcome, Error> {
        match message {
            ControlMessage::SkipWaiting => Ok(ControlOutcome::SkippedWaiting { promoted: self.skip_waiting().await? }),
            ControlMessage::CacheUrls { urls, cache_name } => {
                Ok(ControlOutcome::Cached(self.cache_urls(&urls, cache_name.as_deref()).await))
            }
            ControlMessage::CacheUserPicture { url } => Ok(ControlOutcome::Cached(self.cache_user_picture(&url).await)),
        }
    }

    /// Fetch and store each URL into `cache_name` (default: built-in images
    /// of the serving version).
    ///
    /// Failures are collected per URL. The target cache's entry limit is
    /// enforced after each write when its policy is bounded.
    pub async fn cache_urls(&self, urls: &[String], cache_name: Option<&str>) -> CacheReport {
        let policies = self.writable_policies().await;
        let policy = match cache_name {
            Some(cache) => policies.for_cache(cache).cloned().unwrap_or_else(|| Policy {
                cache: cache.to_string(),
                strategy: Strategy::CacheFirst,
                max_entries: None,
                max_age: None,
            }),
            None => policies.for_category(Category::BuiltInImage).clone(),
        };
        self.cache_into(urls, &policy).await
    }

    /// Fetch and store one user-added picture, keeping its cache bounded.
    pub async fn cache_user_picture(&self, url: &str) -> CacheReport {
        let policy = self.writable_policies().await.for_category(Category::UserAddedImage).clone();
        self.cache_into(&[url.to_string()], &policy).await
    }

    async fn writable_policies(&self) -> Arc<PolicyTable> {
        self.serving().await.unwrap_or_else(|| self.policies.clone())
    }

    async fn cache_into(&self, urls: &[String], policy: &Policy) -> CacheReport {
        let cache = &policy.cache;
        let mut report = CacheReport::new(cache);
        for url in urls {
            match self.fetch_cacheable(url).await {
                Ok((request, response)) => {
                    if strategy::store(&self.db, &request, &response, policy).await {
                        report.stored.push(request.url.to_string());
                    } else {
                        report.fail(url, "CACHE_ERROR: write failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %url, cache = %cache, error = %e, "cannot cache url");
                    report.fail(url, e);
                }
            }
        }
        report
    }

    async fn fetch_cacheable(&self, url: &str) -> Result<(Request, Response), Error> {
        let request = self.request("GET", url)?;
        let response = self.network.fetch(&request).await?;
        if !response.is_cacheable() {
            return Err(Error::HttpError(format!("{} returned status {}", request.url, response.status)));
        }
        Ok((request, response))
    }
}

/// Fetches through the agent pipeline, so warm-up downloads land in the
/// same caches foreground requests read from.
#[async_trait::async_trait]
impl Fetcher for Agent {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.handle(request.clone()).await
    }
}

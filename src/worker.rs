//! Worker lifecycle state machine and the fetch interception policy.
//!
//! A worker moves through three states. [`Worker::install`] pre-caches the
//! app shell into the bucket named by the current version tag;
//! [`Worker::activate`] garbage-collects every other bucket. There is no
//! waiting state: an installed worker is immediately eligible for
//! activation, and only an active worker accepts
//! [`Worker::handle_fetch`] — routing page requests to it is the host's
//! act of claiming those pages. The future returned by each transition is
//! the pending-work handle the host must await before proceeding.

use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::http::{FetchRequest, FetchResponse, Method};
use crate::net::{Network, ReqwestNetwork};
use crate::store::{CacheStorage, CachedResponse, MemoryStorage};

/// Lifecycle states of a cache worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Fresh instance; the shell has not been pre-cached.
    Uninstalled,
    /// Shell pre-cached; eligible for activation.
    Installed,
    /// Controlling pages and intercepting their requests.
    Active,
}

impl LifecycleState {
    /// True once the worker may intercept fetches.
    #[must_use]
    pub const fn can_intercept(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninstalled => write!(f, "uninstalled"),
            Self::Installed => write!(f, "installed"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Decision produced by the worker for one intercepted request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The worker answered, from cache or network.
    Response(FetchResponse),
    /// The worker declines to handle the request; the host performs its
    /// default fetch untouched.
    Passthrough,
}

impl FetchOutcome {
    /// Returns the response if the worker produced one.
    #[must_use]
    pub fn into_response(self) -> Option<FetchResponse> {
        match self {
            Self::Response(response) => Some(response),
            Self::Passthrough => None,
        }
    }

    /// True if the worker declined to handle the request.
    #[must_use]
    pub const fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough)
    }
}

/// Offline cache worker: one versioned cache bucket plus the
/// cache-vs-network decision for every intercepted request.
pub struct Worker<S: CacheStorage = MemoryStorage, N: Network = ReqwestNetwork> {
    config: WorkerConfig,
    storage: S,
    network: N,
    state: LifecycleState,
}

impl Worker<MemoryStorage, ReqwestNetwork> {
    /// Creates a worker with the default in-memory storage and reqwest
    /// network backends.
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self::with_backends(config, MemoryStorage::new(), ReqwestNetwork::new())
    }
}

impl<S: CacheStorage, N: Network> Worker<S, N> {
    /// Creates a worker with custom storage and network backends.
    #[must_use]
    pub const fn with_backends(config: WorkerConfig, storage: S, network: N) -> Self {
        Self {
            config,
            storage,
            network,
            state: LifecycleState::Uninstalled,
        }
    }

    /// Returns the worker configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns a reference to the storage backend.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns a reference to the network backend.
    #[must_use]
    pub const fn network(&self) -> &N {
        &self.network
    }

    fn expect_state(&self, operation: &'static str, expected: LifecycleState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                expected,
                actual: self.state,
            })
        }
    }

    fn shell_document_key(&self) -> Result<String> {
        let url = self.config.base_url.join(&self.config.shell_document)?;
        Ok(FetchRequest::get(url).cache_key())
    }

    /// Pre-caches the app shell into the bucket named by the current
    /// version tag.
    ///
    /// All-or-nothing: every asset must fetch with a success status, or
    /// the whole install fails and the worker stays uninstalled. No
    /// partial cache is guaranteed to persist across a failed install. On
    /// success the worker is immediately eligible for
    /// [`activate`](Self::activate).
    ///
    /// # Errors
    ///
    /// Returns an error if a shell path does not resolve against the base
    /// URL, an asset fetch fails, an asset answers with a non-success
    /// status, or the storage backend rejects a write.
    pub async fn install(&mut self) -> Result<()> {
        self.expect_state("install", LifecycleState::Uninstalled)?;

        self.storage.open_bucket(&self.config.version_tag).await?;

        let network = &self.network;
        let base = &self.config.base_url;
        let fetched: Vec<(String, FetchResponse)> =
            stream::iter(self.config.shell_assets.clone())
                .map(|path| async move {
                    let request = FetchRequest::get(base.join(&path)?);
                    let response = network.fetch(&request).await?;
                    if !response.is_success() {
                        return Err(Error::Precache {
                            path,
                            status: response.status,
                        });
                    }
                    Ok((request.cache_key(), response))
                })
                .buffer_unordered(self.config.prefetch_concurrency.max(1))
                .try_collect()
                .await?;

        for (key, response) in fetched {
            self.storage
                .put(&self.config.version_tag, &key, CachedResponse::new(response))
                .await?;
        }

        self.state = LifecycleState::Installed;
        log::info!(
            "installed cache bucket {} ({} shell assets)",
            self.config.version_tag,
            self.config.shell_assets.len()
        );
        Ok(())
    }

    /// Garbage-collects stale cache generations and takes control.
    ///
    /// Deletes every bucket whose name differs from the current version
    /// tag and returns the removed names. Once this resolves, the worker
    /// intercepts requests from all pages the host routes to it, including
    /// pages loaded under a previous worker version.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is not installed, or if the storage
    /// backend fails while enumerating or deleting buckets.
    pub async fn activate(&mut self) -> Result<Vec<String>> {
        self.expect_state("activate", LifecycleState::Installed)?;

        let mut removed = Vec::new();
        for name in self.storage.bucket_names().await? {
            if name != self.config.version_tag && self.storage.delete_bucket(&name).await? {
                log::info!("removed stale cache bucket {name}");
                removed.push(name);
            }
        }

        self.state = LifecycleState::Active;
        Ok(removed)
    }

    /// Decides cache-vs-network for one intercepted request.
    ///
    /// Non-GET requests pass through untouched. Navigations go to the
    /// network and fall back to the cached shell document offline; the
    /// live navigation response is never cached. Every other GET is served
    /// cache-first, with same-origin success responses written through to
    /// the bucket on a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is not active, or on a network
    /// failure with no cached fallback.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        self.expect_state("handle_fetch", LifecycleState::Active)?;

        if request.method != Method::Get {
            return Ok(FetchOutcome::Passthrough);
        }

        if request.is_navigation() {
            return self.handle_navigation(request).await;
        }

        let key = request.cache_key();
        if let Some(cached) = self.storage.get(&self.config.version_tag, &key).await? {
            log::debug!("cache hit: {key}");
            return Ok(FetchOutcome::Response(cached.response));
        }

        let response = self.network.fetch(request).await?;
        if response.is_success() && request.origin() == self.config.origin() {
            // Write-through must never fail the fetch the page is waiting on.
            if let Err(e) = self
                .storage
                .put(
                    &self.config.version_tag,
                    &key,
                    CachedResponse::new(response.clone()),
                )
                .await
            {
                log::warn!("write-through failed for {key}: {e}");
            }
        }
        Ok(FetchOutcome::Response(response))
    }

    async fn handle_navigation(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        match self.network.fetch(request).await {
            Ok(response) => Ok(FetchOutcome::Response(response)),
            Err(err) => {
                let key = self.shell_document_key()?;
                match self.storage.get(&self.config.version_tag, &key).await? {
                    Some(cached) => {
                        log::debug!("offline navigation to {}, serving cached shell", request.url);
                        Ok(FetchOutcome::Response(cached.response))
                    }
                    None => Err(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use url::Url;

    /// Network double serving canned responses by URL, with an offline
    /// switch and a fetch counter.
    struct StaticNetwork {
        responses: Mutex<HashMap<String, FetchResponse>>,
        offline: AtomicBool,
        fetches: AtomicUsize,
    }

    impl StaticNetwork {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(HashMap::new()),
                offline: AtomicBool::new(false),
                fetches: AtomicUsize::new(0),
            })
        }

        fn serve(&self, url: &Url, response: FetchResponse) {
            self.responses.lock().unwrap().insert(url.to_string(), response);
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Network for StaticNetwork {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Fetch("network unreachable".to_string()));
            }
            self.responses
                .lock()
                .unwrap()
                .get(request.url.as_str())
                .cloned()
                .ok_or_else(|| Error::Fetch(format!("no route to {}", request.url)))
        }
    }

    const SHELL: &[&str] = &["./", "./index.html", "./manifest.json"];

    fn base() -> Url {
        Url::parse("https://bills.example/app/").unwrap()
    }

    fn config() -> WorkerConfig {
        WorkerConfig::new(base())
            .with_version_tag("v2")
            .with_shell_assets(SHELL.iter().copied())
    }

    fn ok_response(url: &Url, body: &str) -> FetchResponse {
        FetchResponse::new(url.clone(), 200)
            .with_header("Content-Type", "text/html")
            .with_body(body.as_bytes().to_vec())
    }

    fn serve_shell(network: &StaticNetwork) {
        for path in SHELL {
            let url = base().join(path).unwrap();
            network.serve(&url, ok_response(&url, &format!("shell {path}")));
        }
    }

    async fn active_worker(
        storage: MemoryStorage,
        network: Arc<StaticNetwork>,
    ) -> Worker<MemoryStorage, Arc<StaticNetwork>> {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut worker = Worker::with_backends(config(), storage, network);
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        worker
    }

    #[tokio::test]
    async fn install_populates_shell_bucket() {
        let storage = MemoryStorage::new();
        let network = StaticNetwork::new();
        serve_shell(&network);

        let mut worker = Worker::with_backends(config(), storage.clone(), network);
        worker.install().await.unwrap();

        assert_eq!(worker.state(), LifecycleState::Installed);
        assert_eq!(storage.entry_count("v2"), Some(SHELL.len()));
    }

    #[tokio::test]
    async fn reinstall_same_tag_leaves_no_duplicates() {
        let storage = MemoryStorage::new();
        let network = StaticNetwork::new();
        serve_shell(&network);

        let mut first = Worker::with_backends(config(), storage.clone(), network.clone());
        first.install().await.unwrap();
        let mut second = Worker::with_backends(config(), storage.clone(), network);
        second.install().await.unwrap();

        assert_eq!(storage.entry_count("v2"), Some(SHELL.len()));
    }

    #[tokio::test]
    async fn install_twice_on_same_worker_rejected() {
        let network = StaticNetwork::new();
        serve_shell(&network);

        let mut worker = Worker::with_backends(config(), MemoryStorage::new(), network);
        worker.install().await.unwrap();

        match worker.install().await {
            Err(Error::InvalidState { operation, .. }) => assert_eq!(operation, "install"),
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn install_aborts_when_an_asset_is_unreachable() {
        let network = StaticNetwork::new();
        // "./manifest.json" is never served.
        for path in ["./", "./index.html"] {
            let url = base().join(path).unwrap();
            network.serve(&url, ok_response(&url, "x"));
        }

        let mut worker = Worker::with_backends(config(), MemoryStorage::new(), network);
        assert!(worker.install().await.is_err());
        assert_eq!(worker.state(), LifecycleState::Uninstalled);
    }

    #[tokio::test]
    async fn install_aborts_on_non_success_asset() {
        let network = StaticNetwork::new();
        serve_shell(&network);
        let manifest = base().join("./manifest.json").unwrap();
        network.serve(&manifest, FetchResponse::new(manifest.clone(), 404));

        let mut worker = Worker::with_backends(config(), MemoryStorage::new(), network);
        match worker.install().await {
            Err(Error::Precache { path, status }) => {
                assert_eq!(path, "./manifest.json");
                assert_eq!(status, 404);
            }
            other => panic!("expected Precache, got {other:?}"),
        }
        assert_eq!(worker.state(), LifecycleState::Uninstalled);
    }

    #[tokio::test]
    async fn activate_removes_stale_buckets() {
        let storage = MemoryStorage::new();
        storage.open_bucket("v1").await.unwrap();
        let network = StaticNetwork::new();
        serve_shell(&network);

        let mut worker = Worker::with_backends(config(), storage.clone(), network);
        worker.install().await.unwrap();
        let removed = worker.activate().await.unwrap();

        assert_eq!(removed, vec!["v1"]);
        assert_eq!(storage.bucket_names().await.unwrap(), vec!["v2"]);
        assert_eq!(worker.state(), LifecycleState::Active);
        assert!(worker.state().can_intercept());
    }

    #[tokio::test]
    async fn activate_requires_installed() {
        let mut worker =
            Worker::with_backends(config(), MemoryStorage::new(), StaticNetwork::new());
        match worker.activate().await {
            Err(Error::InvalidState {
                operation, actual, ..
            }) => {
                assert_eq!(operation, "activate");
                assert_eq!(actual, LifecycleState::Uninstalled);
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_requires_active() {
        let network = StaticNetwork::new();
        serve_shell(&network);
        let mut worker = Worker::with_backends(config(), MemoryStorage::new(), network);
        worker.install().await.unwrap();

        let request = FetchRequest::get(base().join("./index.html").unwrap());
        match worker.handle_fetch(&request).await {
            Err(Error::InvalidState { operation, .. }) => assert_eq!(operation, "handle_fetch"),
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cache_hit_uses_no_network() {
        let network = StaticNetwork::new();
        serve_shell(&network);
        let worker = active_worker(MemoryStorage::new(), network.clone()).await;
        let fetches_after_install = network.fetch_count();

        let request = FetchRequest::get(base().join("./index.html").unwrap());
        let outcome = worker.handle_fetch(&request).await.unwrap();

        let response = outcome.into_response().unwrap();
        assert_eq!(response.body, "shell ./index.html");
        assert_eq!(network.fetch_count(), fetches_after_install);
    }

    #[tokio::test]
    async fn offline_navigation_serves_cached_shell() {
        let network = StaticNetwork::new();
        serve_shell(&network);
        let worker = active_worker(MemoryStorage::new(), network.clone()).await;
        network.set_offline(true);

        let request = FetchRequest::navigate(base().join("./history").unwrap());
        let outcome = worker.handle_fetch(&request).await.unwrap();

        let response = outcome.into_response().unwrap();
        assert_eq!(response.body, "shell ./index.html");
    }

    #[tokio::test]
    async fn offline_navigation_without_cached_shell_propagates() {
        let network = StaticNetwork::new();
        let root = base();
        network.serve(&root, ok_response(&root, "root only"));

        let storage = MemoryStorage::new();
        let mut worker = Worker::with_backends(
            config().with_shell_assets(["./"]),
            storage,
            network.clone(),
        );
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        network.set_offline(true);

        let request = FetchRequest::navigate(base().join("./history").unwrap());
        match worker.handle_fetch(&request).await {
            Err(Error::Fetch(_)) => {}
            other => panic!("expected Fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn navigation_response_is_not_cached() {
        let network = StaticNetwork::new();
        serve_shell(&network);
        let storage = MemoryStorage::new();
        let worker = active_worker(storage.clone(), network.clone()).await;

        let page = base().join("./history").unwrap();
        network.serve(&page, ok_response(&page, "live page"));

        let request = FetchRequest::navigate(page);
        let outcome = worker.handle_fetch(&request).await.unwrap();

        assert_eq!(outcome.into_response().unwrap().body, "live page");
        assert!(storage.get("v2", &request.cache_key()).await.unwrap().is_none());
        assert_eq!(storage.entry_count("v2"), Some(SHELL.len()));
    }

    #[tokio::test]
    async fn miss_writes_through_and_returns_response_unmodified() {
        let network = StaticNetwork::new();
        serve_shell(&network);
        let storage = MemoryStorage::new();
        let worker = active_worker(storage.clone(), network.clone()).await;

        let css = base().join("./style.css").unwrap();
        network.serve(&css, ok_response(&css, "body {}"));

        let request = FetchRequest::get(css);
        let response = worker
            .handle_fetch(&request)
            .await
            .unwrap()
            .into_response()
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "body {}");

        let cached = storage.get("v2", &request.cache_key()).await.unwrap().unwrap();
        assert_eq!(cached.response.body, "body {}");

        // Second fetch is served from the bucket.
        let before = network.fetch_count();
        worker.handle_fetch(&request).await.unwrap();
        assert_eq!(network.fetch_count(), before);
    }

    #[tokio::test]
    async fn non_success_response_is_not_cached() {
        let network = StaticNetwork::new();
        serve_shell(&network);
        let storage = MemoryStorage::new();
        let worker = active_worker(storage.clone(), network.clone()).await;

        let missing = base().join("./missing.png").unwrap();
        network.serve(&missing, FetchResponse::new(missing.clone(), 404));

        let request = FetchRequest::get(missing);
        let response = worker
            .handle_fetch(&request)
            .await
            .unwrap()
            .into_response()
            .unwrap();
        assert_eq!(response.status, 404);
        assert!(storage.get("v2", &request.cache_key()).await.unwrap().is_none());
        assert_eq!(storage.entry_count("v2"), Some(SHELL.len()));
    }

    #[tokio::test]
    async fn cross_origin_response_is_not_cached() {
        let network = StaticNetwork::new();
        serve_shell(&network);
        let storage = MemoryStorage::new();
        let worker = active_worker(storage.clone(), network.clone()).await;

        let cdn = Url::parse("https://cdn.example/lib.js").unwrap();
        network.serve(&cdn, ok_response(&cdn, "lib code"));

        let request = FetchRequest::get(cdn);
        let response = worker
            .handle_fetch(&request)
            .await
            .unwrap()
            .into_response()
            .unwrap();
        assert_eq!(response.body, "lib code");
        assert!(storage.get("v2", &request.cache_key()).await.unwrap().is_none());
        assert_eq!(storage.entry_count("v2"), Some(SHELL.len()));
    }

    #[tokio::test]
    async fn non_get_passes_through_untouched() {
        let network = StaticNetwork::new();
        serve_shell(&network);
        let worker = active_worker(MemoryStorage::new(), network.clone()).await;
        let before = network.fetch_count();

        let request =
            FetchRequest::with_method(Method::Post, base().join("./api/bills").unwrap());
        let outcome = worker.handle_fetch(&request).await.unwrap();

        assert!(outcome.is_passthrough());
        assert!(outcome.into_response().is_none());
        assert_eq!(network.fetch_count(), before);
    }

    #[tokio::test]
    async fn offline_uncached_subresource_propagates_error() {
        let network = StaticNetwork::new();
        serve_shell(&network);
        let worker = active_worker(MemoryStorage::new(), network.clone()).await;
        network.set_offline(true);

        let request = FetchRequest::get(base().join("./style.css").unwrap());
        match worker.handle_fetch(&request).await {
            Err(Error::Fetch(_)) => {}
            other => panic!("expected Fetch error, got {other:?}"),
        }
    }
}

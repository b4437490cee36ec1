//! The offline cache manager: lifecycle handlers and cache-first fetch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use offkit_cache::{CacheEntry, CacheKey, CacheStorage};
use offkit_common::{OffkitError, Result};
use offkit_net::{same_origin, NetworkBackend, Request, Response};
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::clients::{ClientId, ClientRegistry};
use crate::keepalive::KeepAlive;
use crate::manifest::PrecacheManifest;
use crate::state::WorkerState;

/// Outcome of a fetch interception.
#[derive(Debug)]
pub enum FetchDecision {
    /// Served from the cache store; no network access happened.
    Cached(Response),
    /// Fetched over the network (and possibly stored for next time).
    Network(Response),
    /// Network failed; the configured offline fallback page was served.
    Fallback(Response),
    /// Not intercepted; the host performs the request untouched.
    Passthrough,
    /// Network failed and no fallback is available; no substitute response.
    Unavailable,
}

impl FetchDecision {
    /// The response carried by this decision, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchDecision::Cached(r) | FetchDecision::Network(r) | FetchDecision::Fallback(r) => {
                Some(r)
            }
            FetchDecision::Passthrough | FetchDecision::Unavailable => None,
        }
    }

    /// Whether the response came from the cache store.
    pub fn from_cache(&self) -> bool {
        matches!(self, FetchDecision::Cached(_) | FetchDecision::Fallback(_))
    }
}

#[derive(Debug, Default)]
struct FetchStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stored: AtomicU64,
    passthrough: AtomicU64,
    fallbacks: AtomicU64,
    unavailable: AtomicU64,
}

/// Point-in-time view of the fetch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStatsSnapshot {
    /// GET requests answered from the cache store.
    pub hits: u64,
    /// GET requests that had to go to the network.
    pub misses: u64,
    /// Responses stored opportunistically after a miss.
    pub stored: u64,
    /// Non-GET requests passed through untouched.
    pub passthrough: u64,
    /// Misses answered with the offline fallback page.
    pub fallbacks: u64,
    /// Misses with no network and no fallback.
    pub unavailable: u64,
}

impl FetchStatsSnapshot {
    /// Fraction of intercepted GETs served from cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// Offline cache manager for one worker version.
///
/// The host delivers lifecycle signals by calling [`on_install`],
/// [`on_activate`], and [`on_fetch`], awaiting each returned future. All
/// handlers register their work with the keep-alive counter; the host can
/// await [`wait_idle`] before considering the worker terminable.
///
/// [`on_install`]: OfflineCacheManager::on_install
/// [`on_activate`]: OfflineCacheManager::on_activate
/// [`on_fetch`]: OfflineCacheManager::on_fetch
/// [`wait_idle`]: OfflineCacheManager::wait_idle
pub struct OfflineCacheManager {
    manifest: PrecacheManifest,
    backend: Arc<dyn NetworkBackend>,
    caches: Arc<RwLock<CacheStorage>>,
    clients: Arc<RwLock<ClientRegistry>>,
    state: RwLock<WorkerState>,
    keepalive: KeepAlive,
    takeover_ready: AtomicBool,
    stats: FetchStats,
}

impl OfflineCacheManager {
    /// Create a manager from a validated manifest and a network backend.
    pub fn new(manifest: PrecacheManifest, backend: Arc<dyn NetworkBackend>) -> Result<Self> {
        manifest.validate()?;
        Ok(Self {
            manifest,
            backend,
            caches: Arc::new(RwLock::new(CacheStorage::new())),
            clients: Arc::new(RwLock::new(ClientRegistry::new())),
            state: RwLock::new(WorkerState::Parsed),
            keepalive: KeepAlive::new(),
            takeover_ready: AtomicBool::new(false),
            stats: FetchStats::default(),
        })
    }

    /// Create a manager sharing an existing cache storage.
    ///
    /// A new worker version installs into the same storage its predecessor
    /// used, so activation can garbage-collect the predecessor's store.
    pub fn with_storage(
        manifest: PrecacheManifest,
        backend: Arc<dyn NetworkBackend>,
        caches: Arc<RwLock<CacheStorage>>,
    ) -> Result<Self> {
        let mut manager = Self::new(manifest, backend)?;
        manager.caches = caches;
        Ok(manager)
    }

    /// The manifest this worker was configured with.
    pub fn manifest(&self) -> &PrecacheManifest {
        &self.manifest
    }

    /// Current generation identifier.
    pub fn generation(&self) -> &str {
        &self.manifest.generation
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether install completed and the worker may supersede a predecessor
    /// without waiting for existing clients to close.
    pub fn takeover_ready(&self) -> bool {
        self.takeover_ready.load(Ordering::Acquire)
    }

    /// Shared handle to the cache storage.
    pub fn caches(&self) -> Arc<RwLock<CacheStorage>> {
        Arc::clone(&self.caches)
    }

    /// Keep-alive handle for host-side termination accounting.
    pub fn keepalive(&self) -> KeepAlive {
        self.keepalive.clone()
    }

    /// Wait until no handler work is in flight.
    pub async fn wait_idle(&self) {
        self.keepalive.wait_idle().await;
    }

    /// Snapshot of the fetch counters.
    pub fn stats(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            stored: self.stats.stored.load(Ordering::Relaxed),
            passthrough: self.stats.passthrough.load(Ordering::Relaxed),
            fallbacks: self.stats.fallbacks.load(Ordering::Relaxed),
            unavailable: self.stats.unavailable.load(Ordering::Relaxed),
        }
    }

    /// Register an open client page.
    pub async fn register_client(&self, url: Url) -> ClientId {
        self.clients.write().await.add(url)
    }

    /// Remove a client page.
    pub async fn remove_client(&self, id: ClientId) {
        self.clients.write().await.remove(id);
    }

    /// Number of clients this worker controls.
    pub async fn controlled_clients(&self) -> usize {
        self.clients.read().await.controlled_count()
    }

    /// Install handler: precache the manifest into the current generation's
    /// store.
    ///
    /// Every manifest path is fetched and staged first; the batch is
    /// committed only if every fetch succeeded with a 2xx status. On any
    /// failure nothing is committed, the error propagates, and the worker
    /// becomes redundant (a previously active worker version, if the host
    /// tracks one, stays in control). Safe to repeat: a re-run re-stages and
    /// re-commits the full manifest.
    pub async fn on_install(&self) -> Result<()> {
        let _work = self.keepalive.extend();
        *self.state.write().await = WorkerState::Installing;
        info!(generation = %self.manifest.generation, assets = self.manifest.precache.len(), "Install");

        let mut staged = Vec::with_capacity(self.manifest.precache.len());
        for path in &self.manifest.precache {
            let url = match self.manifest.resolve(path) {
                Ok(url) => url,
                Err(err) => return self.fail_install(err).await,
            };

            let response = match self.backend.fetch(Request::get(url.clone())).await {
                Ok(response) => response,
                Err(err) => {
                    return self
                        .fail_install(OffkitError::network(format!(
                            "precache fetch failed for {url}: {err}"
                        )))
                        .await;
                }
            };

            if !response.ok() {
                return self
                    .fail_install(OffkitError::network(format!(
                        "precache fetch for {url} returned {}",
                        response.status
                    )))
                    .await;
            }

            staged.push((
                CacheKey::get(url),
                CacheEntry::new(response.status, response.headers, response.body),
            ));
        }

        let count = staged.len();
        self.caches
            .write()
            .await
            .open(&self.manifest.generation)
            .put_all(staged);

        *self.state.write().await = WorkerState::Installed;
        self.takeover_ready.store(true, Ordering::Release);
        info!(generation = %self.manifest.generation, count, "Precache committed");
        Ok(())
    }

    async fn fail_install(&self, err: OffkitError) -> Result<()> {
        warn!(generation = %self.manifest.generation, error = %err, "Install failed");
        *self.state.write().await = WorkerState::Redundant;
        Err(err)
    }

    /// Activate handler: garbage-collect stale generations and claim clients.
    pub async fn on_activate(&self) -> Result<()> {
        let _work = self.keepalive.extend();

        {
            let state = *self.state.read().await;
            if !state.is_installed() {
                return Err(OffkitError::state(format!(
                    "cannot activate from {state:?}"
                )));
            }
        }
        *self.state.write().await = WorkerState::Activating;
        info!(generation = %self.manifest.generation, "Activate");

        let stale = self
            .caches
            .write()
            .await
            .retain_only(&self.manifest.generation);
        if !stale.is_empty() {
            info!(deleted = stale.len(), "Garbage-collected stale cache stores");
        }

        let claimed = self.clients.write().await.claim();
        debug!(claimed, "Clients claimed");

        *self.state.write().await = WorkerState::Activated;
        Ok(())
    }

    /// Fetch interception handler: cache-first for GET requests.
    ///
    /// Non-GET requests pass through untouched. Cache hits are served without
    /// network access. On a miss the request goes to the network; a response
    /// for a same-origin URL is stored in the current store before being
    /// returned. Network failure on a miss is suppressed: the configured
    /// offline fallback is served if cached, otherwise no substitute response
    /// is produced.
    pub async fn on_fetch(&self, request: Request) -> FetchDecision {
        let _work = self.keepalive.extend();

        if !request.is_get() {
            trace!(url = %request.url, method = %request.method, "Passthrough");
            self.stats.passthrough.fetch_add(1, Ordering::Relaxed);
            return FetchDecision::Passthrough;
        }

        let key = CacheKey::get(request.url.clone());
        if let Some(entry) = self
            .caches
            .read()
            .await
            .match_in(&self.manifest.generation, &key)
        {
            debug!(url = %request.url, "Cache hit");
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return FetchDecision::Cached(entry_response(&request, entry));
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let request_url = request.url.clone();
        match self.backend.fetch(request).await {
            Ok(response) => {
                if same_origin(&self.manifest.origin, &request_url) {
                    self.caches
                        .write()
                        .await
                        .open(&self.manifest.generation)
                        .put(
                            key,
                            CacheEntry::new(
                                response.status,
                                response.headers.clone(),
                                response.body.clone(),
                            ),
                        );
                    self.stats.stored.fetch_add(1, Ordering::Relaxed);
                    trace!(url = %request_url, "Stored response for future hits");
                }
                FetchDecision::Network(response)
            }
            Err(err) => {
                debug!(url = %request_url, error = %err, "Network fetch failed");
                if let Some(fallback) = self.fallback_entry(&request_url).await {
                    self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                    return FetchDecision::Fallback(fallback);
                }
                self.stats.unavailable.fetch_add(1, Ordering::Relaxed);
                FetchDecision::Unavailable
            }
        }
    }

    /// Cached offline fallback response, if one is configured and present.
    async fn fallback_entry(&self, request_url: &Url) -> Option<Response> {
        let path = self.manifest.offline_fallback.as_deref()?;
        let url = self.manifest.resolve(path).ok()?;
        let key = CacheKey::get(url);
        let caches = self.caches.read().await;
        let entry = caches.match_in(&self.manifest.generation, &key)?;
        debug!(url = %request_url, fallback = path, "Serving offline fallback");
        Some(Response {
            request_id: offkit_net::RequestId::new(),
            url: request_url.clone(),
            status: entry.status,
            headers: entry.headers.clone(),
            body: entry.body.clone(),
        })
    }
}

/// Build a response from a cache entry for the given request.
fn entry_response(request: &Request, entry: &CacheEntry) -> Response {
    Response {
        request_id: request.id,
        url: request.url.clone(),
        status: entry.status,
        headers: entry.headers.clone(),
        body: entry.body.clone(),
    }
}

//! End-to-end install → activate → fetch flow over an in-memory backend.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use offkit_cache::CacheKey;
use offkit_common::{init_logging, LogConfig};
use offkit_net::{InMemoryBackend, Request};
use offkit_worker::{FetchDecision, OfflineCacheManager, PrecacheManifest, WorkerState};
use url::Url;

fn load_manifest() -> PrecacheManifest {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/afm-finance.json");
    PrecacheManifest::from_json_file(path).unwrap()
}

fn backend_for(manifest: &PrecacheManifest) -> Arc<InMemoryBackend> {
    let backend = InMemoryBackend::new();
    for path in &manifest.precache {
        backend.route_ok(manifest.resolve(path).unwrap(), format!("asset:{path}"));
    }
    Arc::new(backend)
}

#[tokio::test]
async fn full_lifecycle_flow() {
    init_logging(&LogConfig::debug());

    let manifest = load_manifest();
    let origin = manifest.origin.clone();
    let backend = backend_for(&manifest);
    let manager = OfflineCacheManager::new(manifest.clone(), backend.clone()).unwrap();

    // A page is already open before this worker version takes over.
    manager
        .register_client(origin.join("/dashboard").unwrap())
        .await;

    // Install: every manifest path lands in the current generation's store.
    manager.on_install().await.unwrap();
    assert!(manager.takeover_ready());
    {
        let caches = manager.caches();
        let caches = caches.read().await;
        let store = caches.store("afm-finance-v1").unwrap();
        assert_eq!(store.len(), manifest.precache.len());
        for path in &manifest.precache {
            let key = CacheKey::get(manifest.resolve(path).unwrap());
            assert!(store.contains(&key), "missing precache entry for {path}");
        }
    }

    // A prior deployment left a stale store behind.
    {
        let caches = manager.caches();
        caches.write().await.open("afm-finance-v0");
    }

    // Activate: stale generations are gone, open clients are claimed.
    manager.on_activate().await.unwrap();
    assert_eq!(manager.state().await, WorkerState::Activated);
    assert_eq!(manager.controlled_clients().await, 1);
    {
        let caches = manager.caches();
        assert_eq!(
            caches.read().await.names(),
            vec!["afm-finance-v1".to_string()]
        );
    }

    // Precached GET: served from cache, no new backend traffic.
    let baseline = backend.request_count();
    let decision = manager
        .on_fetch(Request::get(origin.join("/dashboard").unwrap()))
        .await;
    assert!(decision.from_cache());
    assert_eq!(
        decision.response().unwrap().body,
        Bytes::from("asset:/dashboard")
    );
    assert_eq!(backend.request_count(), baseline);

    // Non-GET: passthrough, no interception, no backend traffic.
    let decision = manager
        .on_fetch(Request::with_method(
            Method::POST,
            origin.join("/api/expense").unwrap(),
        ))
        .await;
    assert!(matches!(decision, FetchDecision::Passthrough));
    assert_eq!(backend.request_count(), baseline);

    // Same-origin miss: fetched once, stored, then served from cache.
    let reports = origin.join("/reports").unwrap();
    backend.route_ok(reports.clone(), "reports");
    let decision = manager.on_fetch(Request::get(reports.clone())).await;
    assert!(matches!(decision, FetchDecision::Network(_)));
    assert_eq!(backend.request_count(), baseline + 1);

    let decision = manager.on_fetch(Request::get(reports)).await;
    assert!(decision.from_cache());
    assert_eq!(backend.request_count(), baseline + 1);

    // Cross-origin miss: returned but never stored.
    let cdn = Url::parse("https://cdn.example.net/chart.js").unwrap();
    backend.route_ok(cdn.clone(), "chart");
    let decision = manager.on_fetch(Request::get(cdn.clone())).await;
    assert!(matches!(decision, FetchDecision::Network(_)));
    {
        let caches = manager.caches();
        let caches = caches.read().await;
        let store = caches.store("afm-finance-v1").unwrap();
        assert!(!store.contains(&CacheKey::get(cdn.clone())));
    }
    // Fetching it again goes to the network again.
    let before = backend.request_count();
    manager.on_fetch(Request::get(cdn)).await;
    assert_eq!(backend.request_count(), before + 1);

    // Offline miss with no fallback configured: no substitute response.
    let decision = manager
        .on_fetch(Request::get(origin.join("/settings").unwrap()))
        .await;
    assert!(matches!(decision, FetchDecision::Unavailable));

    // All handler chains have resolved; the host may terminate the worker.
    manager.wait_idle().await;
}

#[tokio::test]
async fn reinstall_keeps_manifest_entries() {
    let manifest = load_manifest();
    let backend = backend_for(&manifest);
    let manager = OfflineCacheManager::new(manifest.clone(), backend).unwrap();

    manager.on_install().await.unwrap();
    manager.on_install().await.unwrap();

    let caches = manager.caches();
    let caches = caches.read().await;
    assert_eq!(
        caches.store("afm-finance-v1").unwrap().len(),
        manifest.precache.len()
    );
}

#[tokio::test]
async fn failed_install_leaves_previous_generation_in_control() {
    // v1 is installed and activated over a shared storage.
    let v1 = load_manifest();
    let backend = backend_for(&v1);
    let manager_v1 = OfflineCacheManager::new(v1.clone(), backend.clone()).unwrap();
    manager_v1.on_install().await.unwrap();
    manager_v1.on_activate().await.unwrap();

    // v2 adds an asset the network cannot serve.
    let mut v2 = v1.clone();
    v2.generation = "afm-finance-v2".to_string();
    v2.precache.push("/static/js/new-feature.js".to_string());
    let manager_v2 =
        OfflineCacheManager::with_storage(v2, backend.clone(), manager_v1.caches()).unwrap();

    assert!(manager_v2.on_install().await.is_err());
    assert_eq!(manager_v2.state().await, WorkerState::Redundant);
    assert!(!manager_v2.takeover_ready());

    // v1's store is untouched and still serves hits.
    assert_eq!(manager_v1.state().await, WorkerState::Activated);
    let decision = manager_v1
        .on_fetch(Request::get(v1.origin.join("/dashboard").unwrap()))
        .await;
    assert!(decision.from_cache());

    let caches = manager_v1.caches();
    let caches = caches.read().await;
    assert!(caches.has("afm-finance-v1"));
    assert!(!caches.has("afm-finance-v2"));
}

//! Cache manager: the worker's install, fetch and activate behaviour

use crate::error::{SwError, SwResult};
use crate::fetch::Fetcher;
use crate::http::{Origin, Request, Response, ResponseKind};
use crate::store::{Cache, CacheStorage};
use crate::worker::event::ExtendableEvent;
use crate::worker::script::{FetchStrategy, WorkerConfig};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle interface a worker supplies to the host
///
/// `on_install` and `on_activate` register their work on the event; the
/// host awaits it. `on_fetch` answers one intercepted request.
#[async_trait]
pub trait ServiceWorker: Send + Sync {
    fn on_install(&self, event: &mut ExtendableEvent);

    async fn on_fetch(&self, request: Request) -> SwResult<Response>;

    fn on_activate(&self, event: &mut ExtendableEvent);
}

/// Cache-first worker over a versioned cache
#[derive(Clone)]
pub struct CacheManager {
    config: Arc<WorkerConfig>,
    origin: Origin,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
}

impl CacheManager {
    pub fn new(
        config: WorkerConfig,
        origin: Origin,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            origin,
            storage,
            fetcher,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Open the current cache and fetch every asset into it
    pub async fn install(&self) -> SwResult<()> {
        let cache_name = &self.config.cache_name;
        let requests = self
            .config
            .urls_to_cache
            .iter()
            .map(|url| self.origin.request("GET", url))
            .collect::<SwResult<Vec<_>>>()?;

        let cache = Cache::open(&self.storage, cache_name).await?;
        info!("Opened cache {}", cache.name());

        cache
            .add_all(&*self.fetcher, &requests)
            .await
            .map_err(|e| SwError::InstallFailed {
                cache_name: cache_name.clone(),
                reason: e.to_string(),
            })?;

        info!("Cached {} asset(s) in {}", requests.len(), cache_name);
        Ok(())
    }

    /// Delete every cache not on the whitelist
    ///
    /// Deletions run concurrently and all of them are attempted; failures
    /// are reported together once every deletion has settled.
    pub async fn prune(&self) -> SwResult<Vec<String>> {
        let whitelist = self.config.whitelist();
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| !whitelist.contains(name))
            .collect();

        let deletions = stale.iter().map(|name| async move {
            debug!("Deleting cache {}", name);
            (name, self.storage.delete(name).await)
        });

        let mut deleted = vec![];
        let mut failed = vec![];
        for (name, result) in join_all(deletions).await {
            match result {
                Ok(_) => deleted.push(name.clone()),
                Err(e) => {
                    warn!("Failed to delete cache {}: {}", name, e);
                    failed.push(name.clone());
                }
            }
        }

        if !failed.is_empty() {
            return Err(SwError::ActivateIncomplete { failed });
        }
        Ok(deleted)
    }

    async fn write_back(&self, request: Request, response: &Response) {
        if response.status != 200 || response.kind != ResponseKind::Basic {
            debug!(
                "Not caching {} ({} {})",
                request.url, response.status, response.kind
            );
            return;
        }

        let to_cache = response.clone();
        let result = match Cache::open(&self.storage, &self.config.cache_name).await {
            Ok(cache) => cache.put(request, to_cache).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to cache response: {}", e);
        }
    }
}

#[async_trait]
impl ServiceWorker for CacheManager {
    fn on_install(&self, event: &mut ExtendableEvent) {
        let manager = self.clone();
        event.wait_until(async move { manager.install().await });
    }

    async fn on_fetch(&self, request: Request) -> SwResult<Response> {
        if let Some(response) = self.storage.match_request(&request).await? {
            debug!("Cache hit: {}", request.url);
            return Ok(response);
        }
        debug!("Cache miss: {}", request.url);

        match self.config.strategy {
            FetchStrategy::CacheFirst => self.fetcher.fetch(&request).await,
            FetchStrategy::CacheFirstWriteBack => {
                if !request.is_cacheable() {
                    return self.fetcher.fetch(&request).await;
                }
                let fetch_request = request.clone();
                let response = self.fetcher.fetch(&fetch_request).await?;
                self.write_back(request, &response).await;
                Ok(response)
            }
        }
    }

    fn on_activate(&self, event: &mut ExtendableEvent) {
        let manager = self.clone();
        event.wait_until(async move {
            let deleted = manager.prune().await?;
            if !deleted.is_empty() {
                info!("Deleted stale cache(s): {}", deleted.join(", "));
            }
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{FakeOrigin, StuckDeletes};
    use crate::store::{DiskStorage, MemoryStorage};
    use crate::worker::event::LifecycleEvent;
    use tempfile::TempDir;

    struct Fixture {
        storage: Arc<dyn CacheStorage>,
        origin: Arc<FakeOrigin>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_storage(Arc::new(MemoryStorage::new()))
        }

        fn with_storage(storage: Arc<dyn CacheStorage>) -> Self {
            let origin = FakeOrigin::new()
                .page("/app/", "index")
                .page("/app/style.css", "css")
                .page("/app/missing.js", "network js");
            Self {
                storage,
                origin: Arc::new(origin),
            }
        }

        fn manager(&self, config: WorkerConfig) -> CacheManager {
            CacheManager::new(
                config,
                Origin::parse("http://localhost:8080").unwrap(),
                Arc::clone(&self.storage),
                self.origin.clone(),
            )
        }
    }

    async fn install(manager: &CacheManager) -> SwResult<()> {
        let mut event = ExtendableEvent::new(LifecycleEvent::Install);
        manager.on_install(&mut event);
        assert_eq!(event.pending(), 1);
        event.settle().await
    }

    async fn activate(manager: &CacheManager) -> SwResult<()> {
        let mut event = ExtendableEvent::new(LifecycleEvent::Activate);
        manager.on_activate(&mut event);
        event.settle().await
    }

    fn get(url: &str) -> Request {
        Request::get(url).unwrap()
    }

    #[tokio::test]
    async fn installed_assets_are_served_without_network() {
        let fx = Fixture::new();
        let manager = fx.manager(WorkerConfig::new("v1", &["/app/", "/app/style.css"]));
        install(&manager).await.unwrap();
        let calls = fx.origin.calls();

        for url in ["/app/", "/app/style.css"] {
            let response = manager.on_fetch(get(url)).await.unwrap();
            assert_eq!(response.status, 200);
        }
        assert_eq!(fx.origin.calls(), calls);
    }

    #[tokio::test]
    async fn same_origin_absolute_asset_urls_are_folded() {
        let fx = Fixture::new();
        let manager = fx.manager(WorkerConfig::new("v1", &["http://localhost:8080/app/"]));
        install(&manager).await.unwrap();

        assert_eq!(fx.storage.entries("v1").await.unwrap(), vec!["/app/"]);
    }

    #[tokio::test]
    async fn one_unfetchable_asset_fails_install() {
        let fx = Fixture::new();
        fx.origin.fail("/app/style.css");
        let manager = fx.manager(WorkerConfig::new("v1", &["/app/", "/app/style.css"]));

        let err = install(&manager).await.unwrap_err();
        assert!(matches!(err, SwError::InstallFailed { ref cache_name, .. } if cache_name == "v1"));
        assert!(fx.storage.entries("v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn miss_fetches_once_and_does_not_cache() {
        let fx = Fixture::new();
        let manager = fx.manager(WorkerConfig::new("v1", &["/app/", "/app/style.css"]));
        install(&manager).await.unwrap();
        let before = fx.storage.entries("v1").await.unwrap();
        let calls = fx.origin.calls();

        let response = manager.on_fetch(get("/app/missing.js")).await.unwrap();

        assert_eq!(response.body, b"network js".to_vec());
        assert_eq!(fx.origin.calls(), calls + 1);
        assert_eq!(fx.storage.entries("v1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn network_failure_propagates_on_miss() {
        let fx = Fixture::new();
        fx.origin.fail("/offline");
        let manager = fx.manager(WorkerConfig::new("v1", &[]));
        install(&manager).await.unwrap();

        let err = manager.on_fetch(get("/offline")).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn install_twice_is_idempotent() {
        let fx = Fixture::new();
        let manager = fx.manager(WorkerConfig::new("v1", &["/app/", "/app/style.css"]));
        install(&manager).await.unwrap();
        let first = fx.storage.entries("v1").await.unwrap();
        install(&manager).await.unwrap();

        assert_eq!(fx.storage.entries("v1").await.unwrap(), first);
        assert_eq!(fx.storage.keys().await.unwrap(), vec!["v1"]);
    }

    #[tokio::test]
    async fn activate_prunes_caches_outside_whitelist() {
        let fx = Fixture::new();
        let v1 = fx.manager(WorkerConfig::new("v1", &["/app/"]));
        install(&v1).await.unwrap();
        fx.storage.open("blog-posts-cache-v1").await.unwrap();

        let v2 = fx.manager(
            WorkerConfig::new("v2", &["/app/"]).with_whitelist(&["v2", "blog-posts-cache-v1"]),
        );
        install(&v2).await.unwrap();
        activate(&v2).await.unwrap();

        assert_eq!(
            fx.storage.keys().await.unwrap(),
            vec!["blog-posts-cache-v1", "v2"]
        );
    }

    #[tokio::test]
    async fn failed_delete_does_not_stop_other_deletions() {
        let fx = Fixture::with_storage(Arc::new(StuckDeletes::new("bad")));
        for name in ["bad", "old", "v2"] {
            fx.storage.open(name).await.unwrap();
        }

        let v2 = fx.manager(WorkerConfig::new("v2", &[]));
        let err = activate(&v2).await.unwrap_err();

        assert!(matches!(err, SwError::ActivateIncomplete { ref failed } if failed == &["bad"]));
        assert_eq!(
            err.to_string(),
            "Activate could not delete cache(s): bad"
        );
        assert_eq!(fx.storage.keys().await.unwrap(), vec!["bad", "v2"]);
    }

    #[tokio::test]
    async fn prune_removes_unreadable_disk_cache() {
        let temp = TempDir::new().unwrap();
        let fx = Fixture::with_storage(Arc::new(DiskStorage::new(temp.path().to_path_buf())));
        let broken = temp.path().join("0123456789abcdef0123456789abcdef");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join("index.json"), "{not json").unwrap();

        let v1 = fx.manager(WorkerConfig::new("v1", &["/app/"]));
        install(&v1).await.unwrap();
        activate(&v1).await.unwrap();

        assert!(!broken.exists());
        assert_eq!(fx.storage.keys().await.unwrap(), vec!["v1"]);
    }

    #[tokio::test]
    async fn version_bump_scenario() {
        let fx = Fixture::new();
        let v1 = fx.manager(WorkerConfig::new("v1", &["/app/", "/app/style.css"]));
        install(&v1).await.unwrap();

        assert!(fx.storage.match_request(&get("/app/")).await.unwrap().is_some());
        assert!(fx
            .storage
            .match_request(&get("/app/missing.js"))
            .await
            .unwrap()
            .is_none());

        let v2 = fx.manager(WorkerConfig::new("v2", &["/app/", "/app/style.css"]));
        install(&v2).await.unwrap();
        activate(&v2).await.unwrap();

        assert!(!fx.storage.has("v1").await.unwrap());
        assert!(fx.storage.has("v2").await.unwrap());
    }

    #[tokio::test]
    async fn write_back_caches_ok_same_origin_only() {
        let fx = Fixture::new();
        fx.origin.set("/api/data", 200, ResponseKind::Basic, "data");
        fx.origin.set("/api/error", 500, ResponseKind::Basic, "boom");
        fx.origin
            .set("https://cdn.test/lib.js", 200, ResponseKind::Cors, "lib");
        let manager = fx.manager(
            WorkerConfig::new("v1", &[]).with_strategy(FetchStrategy::CacheFirstWriteBack),
        );
        install(&manager).await.unwrap();

        let response = manager.on_fetch(get("/api/data")).await.unwrap();
        assert_eq!(response.body, b"data".to_vec());
        manager.on_fetch(get("/api/error")).await.unwrap();
        manager
            .on_fetch(get("https://cdn.test/lib.js"))
            .await
            .unwrap();

        assert_eq!(fx.storage.entries("v1").await.unwrap(), vec!["/api/data"]);

        // Second request is served from the cache
        let calls = fx.origin.calls();
        let cached = manager.on_fetch(get("/api/data")).await.unwrap();
        assert_eq!(cached, response);
        assert_eq!(fx.origin.calls(), calls);
    }
}

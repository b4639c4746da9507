//! Cache storage: named, versioned namespaces of request/response pairs
//!
//! A namespace name encodes a version (`pages-cache-v1`); changing the
//! cached content means creating a new namespace and deleting the old one.
//! Stored snapshots are never modified in place, every read returns an
//! independent copy.
//!
//! # Backends
//!
//! | Backend | Persistence | Use |
//! |---------|-------------|-----|
//! | memory | process | tests, one-shot hosts |
//! | disk | state directory | CLI host |

mod disk;
mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use crate::config::{Config, ConfigManager, StorageBackend};
use crate::error::{SwError, SwResult};
use crate::fetch::Fetcher;
use crate::http::{Request, Response};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

/// Abstract cache store
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if it does not exist
    async fn open(&self, name: &str) -> SwResult<()>;

    /// Whether a namespace exists
    async fn has(&self, name: &str) -> SwResult<bool>;

    /// Delete a namespace, returning whether it existed
    async fn delete(&self, name: &str) -> SwResult<bool>;

    /// Namespace names in creation order
    async fn keys(&self) -> SwResult<Vec<String>>;

    /// Store entries in one batch: all of them become visible or none do
    ///
    /// Existing entries with the same key are replaced.
    async fn put_all(&self, name: &str, entries: Vec<(Request, Response)>) -> SwResult<()>;

    /// Look up a request in one namespace
    async fn match_in(&self, name: &str, request: &Request) -> SwResult<Option<Response>>;

    /// Request keys stored in a namespace, in insertion order
    async fn entries(&self, name: &str) -> SwResult<Vec<String>>;

    /// Look up a request across all namespaces, oldest first
    async fn match_request(&self, request: &Request) -> SwResult<Option<Response>> {
        if !request.is_cacheable() {
            return Ok(None);
        }
        for name in self.keys().await? {
            if let Some(response) = self.match_in(&name, request).await? {
                debug!("Matched {} in {}", request.key(), name);
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Backend name for display
    fn backend_name(&self) -> &'static str;
}

/// Handle to an opened namespace
#[derive(Clone)]
pub struct Cache {
    name: String,
    storage: Arc<dyn CacheStorage>,
}

impl Cache {
    /// Open (create if absent) a namespace
    pub async fn open(storage: &Arc<dyn CacheStorage>, name: &str) -> SwResult<Self> {
        storage.open(name).await?;
        Ok(Self {
            name: name.to_string(),
            storage: Arc::clone(storage),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch every request and store all responses as one unit
    ///
    /// Fails without writing anything if any fetch fails or returns a
    /// non-2xx status.
    pub async fn add_all(&self, fetcher: &dyn Fetcher, requests: &[Request]) -> SwResult<()> {
        let fetches = requests.iter().map(|request| async move {
            let response = fetcher.fetch(request).await?;
            if !response.is_ok() {
                return Err(SwError::BadStatus {
                    url: request.url.clone(),
                    status: response.status,
                });
            }
            Ok((request.clone(), response))
        });

        let entries = try_join_all(fetches).await?;
        debug!("Fetched {} asset(s) for {}", entries.len(), self.name);
        self.put_all(entries).await
    }

    /// Store a single entry
    pub async fn put(&self, request: Request, response: Response) -> SwResult<()> {
        self.put_all(vec![(request, response)]).await
    }

    /// Store several entries as one batch
    pub async fn put_all(&self, entries: Vec<(Request, Response)>) -> SwResult<()> {
        if let Some((request, _)) = entries.iter().find(|(r, _)| !r.is_cacheable()) {
            return Err(SwError::User(format!(
                "cannot cache {} request for {}",
                request.method, request.url
            )));
        }
        self.storage.put_all(&self.name, entries).await
    }

    /// Look up a request in this namespace only
    pub async fn match_request(&self, request: &Request) -> SwResult<Option<Response>> {
        if !request.is_cacheable() {
            return Ok(None);
        }
        self.storage.match_in(&self.name, request).await
    }

    /// Stored request keys
    pub async fn keys(&self) -> SwResult<Vec<String>> {
        self.storage.entries(&self.name).await
    }
}

/// Create the configured storage backend
///
/// Returns `None` when the backend is `none`: the host then has no
/// service-worker capability.
pub fn create_storage(config: &Config) -> Option<Arc<dyn CacheStorage>> {
    match config.storage.backend {
        StorageBackend::Disk => {
            let dir = ConfigManager::storage_dir(config).join("caches");
            Some(Arc::new(DiskStorage::new(dir)))
        }
        StorageBackend::Memory => Some(Arc::new(MemoryStorage::new())),
        StorageBackend::None => None,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fetcher and storage doubles shared by store and worker tests

    use super::{CacheStorage, MemoryStorage};
    use crate::error::{SwError, SwResult};
    use crate::fetch::Fetcher;
    use crate::http::{Request, Response, ResponseKind};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory origin that counts network calls
    #[derive(Default)]
    pub struct FakeOrigin {
        pages: Mutex<HashMap<String, (u16, ResponseKind, Vec<u8>)>>,
        unreachable: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl FakeOrigin {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(self, url: &str, body: &str) -> Self {
            self.set(url, 200, ResponseKind::Basic, body);
            self
        }

        pub fn set(&self, url: &str, status: u16, kind: ResponseKind, body: &str) {
            self.pages
                .lock()
                .unwrap()
                .insert(url.to_string(), (status, kind, body.as_bytes().to_vec()));
        }

        pub fn fail(&self, url: &str) {
            self.unreachable.lock().unwrap().push(url.to_string());
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for FakeOrigin {
        async fn fetch(&self, request: &Request) -> SwResult<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable.lock().unwrap().contains(&request.url) {
                return Err(SwError::network(&request.url, "connection refused"));
            }
            let page = self.pages.lock().unwrap().get(&request.url).cloned();
            Ok(match page {
                Some((status, kind, body)) => Response::new(&request.url, status, kind, body),
                None => Response::new(&request.url, 404, ResponseKind::Basic, vec![]),
            })
        }

        fn describe(&self) -> String {
            "fake origin".to_string()
        }
    }

    /// Memory storage that refuses to delete one namespace
    pub struct StuckDeletes {
        inner: MemoryStorage,
        stuck: String,
    }

    impl StuckDeletes {
        pub fn new(stuck: &str) -> Self {
            Self {
                inner: MemoryStorage::new(),
                stuck: stuck.to_string(),
            }
        }
    }

    #[async_trait]
    impl CacheStorage for StuckDeletes {
        async fn open(&self, name: &str) -> SwResult<()> {
            self.inner.open(name).await
        }

        async fn has(&self, name: &str) -> SwResult<bool> {
            self.inner.has(name).await
        }

        async fn delete(&self, name: &str) -> SwResult<bool> {
            if name == self.stuck {
                return Err(SwError::Internal(format!("{} is locked", name)));
            }
            self.inner.delete(name).await
        }

        async fn keys(&self) -> SwResult<Vec<String>> {
            self.inner.keys().await
        }

        async fn put_all(&self, name: &str, entries: Vec<(Request, Response)>) -> SwResult<()> {
            self.inner.put_all(name, entries).await
        }

        async fn match_in(&self, name: &str, request: &Request) -> SwResult<Option<Response>> {
            self.inner.match_in(name, request).await
        }

        async fn entries(&self, name: &str) -> SwResult<Vec<String>> {
            self.inner.entries(name).await
        }

        fn backend_name(&self) -> &'static str {
            "stuck"
        }
    }
}

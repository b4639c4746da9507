//! Process-local cache store

use crate::error::{SwError, SwResult};
use crate::http::{Request, Response};
use crate::store::CacheStorage;
use async_trait::async_trait;
use tokio::sync::RwLock;

struct Namespace {
    name: String,
    entries: Vec<(String, Response)>,
}

/// In-memory store; namespaces keep their creation order
#[derive(Default)]
pub struct MemoryStorage {
    namespaces: RwLock<Vec<Namespace>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> SwResult<()> {
        let mut namespaces = self.namespaces.write().await;
        if !namespaces.iter().any(|ns| ns.name == name) {
            namespaces.push(Namespace {
                name: name.to_string(),
                entries: vec![],
            });
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> SwResult<bool> {
        Ok(self.namespaces.read().await.iter().any(|ns| ns.name == name))
    }

    async fn delete(&self, name: &str) -> SwResult<bool> {
        let mut namespaces = self.namespaces.write().await;
        let before = namespaces.len();
        namespaces.retain(|ns| ns.name != name);
        Ok(namespaces.len() != before)
    }

    async fn keys(&self) -> SwResult<Vec<String>> {
        Ok(self
            .namespaces
            .read()
            .await
            .iter()
            .map(|ns| ns.name.clone())
            .collect())
    }

    async fn put_all(&self, name: &str, entries: Vec<(Request, Response)>) -> SwResult<()> {
        let mut namespaces = self.namespaces.write().await;
        let namespace = namespaces
            .iter_mut()
            .find(|ns| ns.name == name)
            .ok_or_else(|| SwError::CacheNotFound(name.to_string()))?;

        for (request, response) in entries {
            let key = request.key().to_string();
            match namespace.entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = response,
                None => namespace.entries.push((key, response)),
            }
        }
        Ok(())
    }

    async fn match_in(&self, name: &str, request: &Request) -> SwResult<Option<Response>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .iter()
            .find(|ns| ns.name == name)
            .and_then(|ns| ns.entries.iter().find(|(k, _)| k == request.key()))
            .map(|(_, response)| response.clone()))
    }

    async fn entries(&self, name: &str) -> SwResult<Vec<String>> {
        let namespaces = self.namespaces.read().await;
        let namespace = namespaces
            .iter()
            .find(|ns| ns.name == name)
            .ok_or_else(|| SwError::CacheNotFound(name.to_string()))?;
        Ok(namespace.entries.iter().map(|(k, _)| k.clone()).collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

//! Persistent cache store
//!
//! Layout under the store root:
//!
//! ```text
//! <sha256(name)[..32]>/index.json    namespace name, creation time, entries
//! <sha256(name)[..32]>/<sha256>.body response bodies, content-addressed
//! ```
//!
//! Bodies are written before the index, and the index is replaced with a
//! rename, so a batch becomes visible all at once. Body files are never
//! rewritten in place.
//!
//! A namespace whose index cannot be read is listed as `#<directory>` after
//! the readable ones. It never matches a request and can be deleted by that
//! name, so activate prunes it like any other stale namespace.

use crate::error::{SwError, SwResult};
use crate::http::{Request, Response, ResponseKind};
use crate::store::CacheStorage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const INDEX_FILE: &str = "index.json";
const BODY_EXT: &str = "body";
const UNREADABLE_PREFIX: &str = "#";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamespaceIndex {
    name: String,
    created_at: DateTime<Utc>,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    status: u16,
    status_text: String,
    kind: ResponseKind,
    headers: Vec<(String, String)>,
    url: String,
    /// Body file name relative to the namespace directory
    body: String,
}

/// Store persisted as one directory per namespace
pub struct DiskStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, name: &str) -> PathBuf {
        if let Some(dir) = unreadable_dir(name) {
            return self.root.join(dir);
        }
        let digest = hex::encode(Sha256::digest(name.as_bytes()));
        self.root.join(&digest[..32])
    }

    async fn read_index(&self, dir: &Path) -> SwResult<Option<NamespaceIndex>> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| SwError::io(format!("reading cache index {}", path.display()), e))?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| SwError::CacheCorrupt {
                path,
                reason: e.to_string(),
            })
    }

    async fn write_index(&self, dir: &Path, index: &NamespaceIndex) -> SwResult<()> {
        let path = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{}.tmp", INDEX_FILE));
        let content = serde_json::to_string_pretty(index)?;

        fs::write(&tmp, content)
            .await
            .map_err(|e| SwError::io(format!("writing cache index {}", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| SwError::io(format!("replacing cache index {}", path.display()), e))
    }

    /// Remove body files no longer referenced by the index
    async fn collect_garbage(&self, dir: &Path, index: &NamespaceIndex) -> SwResult<()> {
        let live: HashSet<&str> = index.entries.iter().map(|e| e.body.as_str()).collect();

        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| SwError::io("reading cache directory", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SwError::io("reading cache entry", e))?
        {
            let path = entry.path();
            let is_body = path.extension().is_some_and(|ext| ext == BODY_EXT);
            let file_name = entry.file_name();
            let referenced = file_name.to_str().is_some_and(|n| live.contains(n));

            if is_body && !referenced {
                debug!("Removing unreferenced body {}", path.display());
                if let Err(e) = fs::remove_file(&path).await {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> SwResult<()> {
        let _guard = self.write_lock.lock().await;
        let dir = self.namespace_dir(name);

        if self.read_index(&dir).await?.is_some() {
            return Ok(());
        }

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SwError::io(format!("creating cache directory {}", dir.display()), e))?;

        let index = NamespaceIndex {
            name: name.to_string(),
            created_at: Utc::now(),
            entries: vec![],
        };
        self.write_index(&dir, &index).await?;
        debug!("Created cache {} at {}", name, dir.display());
        Ok(())
    }

    async fn has(&self, name: &str) -> SwResult<bool> {
        Ok(self.namespace_dir(name).join(INDEX_FILE).exists())
    }

    async fn delete(&self, name: &str) -> SwResult<bool> {
        let _guard = self.write_lock.lock().await;
        let dir = self.namespace_dir(name);

        if !dir.exists() {
            return Ok(false);
        }

        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| SwError::io(format!("deleting cache directory {}", dir.display()), e))?;
        Ok(true)
    }

    async fn keys(&self) -> SwResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(vec![]);
        }

        let mut indexes = vec![];
        let mut unreadable = vec![];
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| SwError::io("reading cache store", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SwError::io("reading cache store entry", e))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match self.read_index(&path).await {
                Ok(Some(index)) => indexes.push(index),
                Ok(None) => {}
                Err(e) => {
                    warn!("Cache {} is unreadable: {}", path.display(), e);
                    let dir = entry.file_name().to_string_lossy().into_owned();
                    unreadable.push(format!("{}{}", UNREADABLE_PREFIX, dir));
                }
            }
        }

        indexes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });

        unreadable.sort();

        Ok(indexes
            .into_iter()
            .map(|index| index.name)
            .chain(unreadable)
            .collect())
    }

    async fn put_all(&self, name: &str, entries: Vec<(Request, Response)>) -> SwResult<()> {
        let _guard = self.write_lock.lock().await;
        let dir = self.namespace_dir(name);

        let mut index = self
            .read_index(&dir)
            .await?
            .ok_or_else(|| SwError::CacheNotFound(name.to_string()))?;

        for (request, response) in entries {
            let body_file = format!(
                "{}.{}",
                hex::encode(Sha256::digest(&response.body)),
                BODY_EXT
            );
            let body_path = dir.join(&body_file);
            if !body_path.exists() {
                fs::write(&body_path, &response.body).await.map_err(|e| {
                    SwError::io(format!("writing cache body {}", body_path.display()), e)
                })?;
            }

            let stored = StoredEntry {
                key: request.key().to_string(),
                status: response.status,
                status_text: response.status_text,
                kind: response.kind,
                headers: response.headers,
                url: response.url,
                body: body_file,
            };

            match index.entries.iter_mut().find(|e| e.key == stored.key) {
                Some(slot) => *slot = stored,
                None => index.entries.push(stored),
            }
        }

        self.write_index(&dir, &index).await?;
        self.collect_garbage(&dir, &index).await
    }

    async fn match_in(&self, name: &str, request: &Request) -> SwResult<Option<Response>> {
        if unreadable_dir(name).is_some() {
            return Ok(None);
        }
        let dir = self.namespace_dir(name);
        let Some(index) = self.read_index(&dir).await? else {
            return Ok(None);
        };
        let Some(entry) = index.entries.into_iter().find(|e| e.key == request.key()) else {
            return Ok(None);
        };

        // Reads take no lock: a concurrent batch may have replaced this
        // entry and collected its body since the index was read
        let body_path = dir.join(&entry.body);
        let body = match fs::read(&body_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Body for {} in {} is gone, treating as a miss", entry.key, name);
                return Ok(None);
            }
            Err(e) => {
                return Err(SwError::CacheCorrupt {
                    path: body_path,
                    reason: e.to_string(),
                })
            }
        };

        Ok(Some(Response {
            status: entry.status,
            status_text: entry.status_text,
            kind: entry.kind,
            headers: entry.headers,
            body,
            url: entry.url,
        }))
    }

    async fn entries(&self, name: &str) -> SwResult<Vec<String>> {
        let index = self
            .read_index(&self.namespace_dir(name))
            .await?
            .ok_or_else(|| SwError::CacheNotFound(name.to_string()))?;
        Ok(index.entries.into_iter().map(|e| e.key).collect())
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}

/// Directory of an unreadable namespace listed as `#<directory>`
fn unreadable_dir(name: &str) -> Option<&str> {
    name.strip_prefix(UNREADABLE_PREFIX)
        .filter(|dir| dir.len() == 32 && dir.bytes().all(|b| b.is_ascii_hexdigit()))
}

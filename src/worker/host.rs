//! Worker host: drives the lifecycle and dispatches events
//!
//! The host owns the registration, runs install and activate one at a time,
//! and routes requests either to the active worker or straight to the
//! network. A new version waits while another one is active, until
//! [`WorkerHost::activate_waiting`] is called.

use crate::audit::{AuditEvent, AuditLog, DeletedBy};
use crate::config::{Config, ConfigManager, StorageBackend};
use crate::error::{SwError, SwResult};
use crate::fetch::{create_fetcher, Fetcher};
use crate::http::{in_scope, scope_of, Origin, Request, Response};
use crate::store::{create_storage, CacheStorage};
use crate::worker::event::{ExtendableEvent, LifecycleEvent};
use crate::worker::manager::{CacheManager, ServiceWorker};
use crate::worker::registration::{Registration, RegistrationStore, WorkerVersion};
use crate::worker::script::{WorkerConfig, WorkerScript};
use crate::worker::state::WorkerState;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Host for a single worker registration
pub struct WorkerHost {
    origin: Origin,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    records: RegistrationStore,
    registration: RwLock<Option<Registration>>,
    lifecycle: Mutex<()>,
    audit: AuditLog,
}

impl WorkerHost {
    /// Create a host, loading any persisted registration
    pub async fn open(
        origin: Origin,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        records: RegistrationStore,
        audit: AuditLog,
    ) -> SwResult<Self> {
        let registration = records.load().await?;
        if let Some(ref reg) = registration {
            debug!("Loaded registration for scope {}", reg.scope);
        }

        Ok(Self {
            origin,
            storage,
            fetcher,
            records,
            registration: RwLock::new(registration),
            lifecycle: Mutex::new(()),
            audit,
        })
    }

    /// Create the host described by the configuration
    ///
    /// Returns `None` when the storage backend is `none`.
    pub async fn from_config(config: &Config) -> SwResult<Option<Self>> {
        let Some(storage) = create_storage(config) else {
            return Ok(None);
        };
        let origin = Origin::parse(&config.origin.url)?;
        let fetcher = create_fetcher(config)?;
        let records = match config.storage.backend {
            StorageBackend::Memory => RegistrationStore::Memory,
            _ => RegistrationStore::File(
                ConfigManager::storage_dir(config).join("registration.json"),
            ),
        };

        Self::open(origin, storage, fetcher, records, AuditLog::new(config))
            .await
            .map(Some)
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Current registration, if any
    pub async fn registration(&self) -> Option<Registration> {
        self.registration.read().await.clone()
    }

    fn manager(&self, config: &WorkerConfig) -> CacheManager {
        CacheManager::new(
            config.clone(),
            self.origin.clone(),
            Arc::clone(&self.storage),
            Arc::clone(&self.fetcher),
        )
    }

    /// Register a worker script, installing it if it changed
    ///
    /// The scope defaults to the script's directory and may only be
    /// narrowed. Registering an unchanged script is a no-op.
    pub async fn register(&self, script_url: &str, scope: Option<&str>) -> SwResult<Registration> {
        let script_request = self.origin.request("GET", script_url)?;
        if !script_request.is_same_origin() {
            return Err(SwError::InvalidUrl(format!(
                "worker script must be same-origin: {}",
                script_url
            )));
        }

        let max_scope = scope_of(script_request.path());
        let scope = match scope {
            Some(scope) => {
                let request = self.origin.request("GET", scope)?;
                if !request.is_same_origin() {
                    return Err(SwError::InvalidUrl(format!(
                        "scope must be same-origin: {}",
                        scope
                    )));
                }
                request.path().to_string()
            }
            None => max_scope.clone(),
        };
        if !in_scope(&scope, &max_scope) {
            return Err(SwError::ScopeNotAllowed { scope, max_scope });
        }

        let _lifecycle = self.lifecycle.lock().await;

        let response = self.fetcher.fetch(&script_request).await?;
        if !response.is_ok() {
            return Err(SwError::BadStatus {
                url: script_request.url.clone(),
                status: response.status,
            });
        }
        let script = WorkerScript::parse(&script_request.url, &response.body)?;

        let mut registration = match self.registration.read().await.as_ref() {
            Some(existing) if existing.scope == scope => existing.clone(),
            Some(existing) => {
                info!(
                    "Replacing registration for scope {} with scope {}",
                    existing.scope, scope
                );
                Registration::new(&scope, &script.url)
            }
            None => Registration::new(&scope, &script.url),
        };

        if registration.script_url == script.url && registration.has_version(&script.hash) {
            debug!("Worker script {} unchanged", script.url);
            return Ok(registration);
        }
        registration.script_url = script.url.clone();

        let version = self.install(&script).await?;

        if let Some(previous) = registration.waiting.take() {
            debug!("Waiting version {} is now redundant", previous.short_hash());
        }

        if registration.active.is_none() {
            self.activate(&mut registration, version).await?;
        } else {
            info!(
                "Version {} of {} installed and waiting",
                version.short_hash(),
                script.url
            );
            registration.waiting = Some(version);
        }

        let registration = self.commit(registration).await?;
        self.audit
            .record(AuditEvent::WorkerRegistered {
                id: registration.id,
                scope: registration.scope.clone(),
                script_url: registration.script_url.clone(),
            })
            .await;
        Ok(registration)
    }

    /// Activate the waiting version once the active one has no clients
    pub async fn activate_waiting(&self) -> SwResult<Registration> {
        let _lifecycle = self.lifecycle.lock().await;

        let mut registration = self
            .registration
            .read()
            .await
            .clone()
            .ok_or(SwError::NotRegistered)?;
        let waiting = registration
            .waiting
            .take()
            .ok_or(SwError::NothingWaiting)?;

        self.activate(&mut registration, waiting).await?;
        self.commit(registration).await
    }

    /// Resolve a request through the active worker if it controls the URL
    pub async fn fetch(&self, request: Request) -> SwResult<Response> {
        let controller = {
            let registration = self.registration.read().await;
            registration.as_ref().and_then(|reg| {
                let controlled = request.is_same_origin() && in_scope(request.path(), &reg.scope);
                reg.active
                    .as_ref()
                    .filter(|_| controlled)
                    .map(|version| version.config.clone())
            })
        };

        match controller {
            Some(config) => self.manager(&config).on_fetch(request).await,
            None => {
                debug!("{} is not controlled, using network", request.url);
                self.fetcher.fetch(&request).await
            }
        }
    }

    /// Remove the registration; caches are left in place
    pub async fn unregister(&self) -> SwResult<bool> {
        let _lifecycle = self.lifecycle.lock().await;

        let Some(registration) = self.registration.write().await.take() else {
            return Ok(false);
        };
        self.records.remove().await?;

        info!("Unregistered worker for scope {}", registration.scope);
        self.audit
            .record(AuditEvent::WorkerUnregistered {
                id: registration.id,
                scope: registration.scope,
            })
            .await;
        Ok(true)
    }

    async fn install(&self, script: &WorkerScript) -> SwResult<WorkerVersion> {
        let mut version = WorkerVersion::from_script(script);
        version.state.transition(WorkerState::Installing)?;

        let mut event = ExtendableEvent::new(LifecycleEvent::Install);
        self.manager(&version.config).on_install(&mut event);

        if let Err(e) = event.settle().await {
            version.state.transition(WorkerState::Redundant)?;
            warn!(
                "Install of version {} failed, version is {}",
                version.short_hash(),
                version.state
            );
            self.audit
                .record(AuditEvent::InstallFailed {
                    script_hash: version.script_hash.clone(),
                    cache_name: version.config.cache_name.clone(),
                    reason: e.to_string(),
                })
                .await;
            return Err(e);
        }

        version.state.transition(WorkerState::Installed)?;
        version.installed_at = Utc::now();
        self.audit
            .record(AuditEvent::WorkerInstalled {
                script_hash: version.script_hash.clone(),
                cache_name: version.config.cache_name.clone(),
            })
            .await;
        Ok(version)
    }

    /// Promote `version` to active and prune stale caches
    ///
    /// Failed cache deletions are logged; the version still activates.
    async fn activate(
        &self,
        registration: &mut Registration,
        mut version: WorkerVersion,
    ) -> SwResult<()> {
        version.state.transition(WorkerState::Activating)?;
        if let Some(previous) = registration.active.take() {
            info!("Version {} is now redundant", previous.short_hash());
        }

        let before = self.storage.keys().await?;

        let mut event = ExtendableEvent::new(LifecycleEvent::Activate);
        self.manager(&version.config).on_activate(&mut event);
        if let Err(e) = event.settle().await {
            warn!("Activate of version {} incomplete: {}", version.short_hash(), e);
        }

        let after = self.storage.keys().await?;
        for name in before.iter().filter(|name| !after.contains(name)) {
            self.audit
                .record(AuditEvent::CacheDeleted {
                    cache_name: name.clone(),
                    deleted_by: DeletedBy::Activate,
                })
                .await;
        }

        version.state.transition(WorkerState::Activated)?;
        info!(
            "Version {} activated with cache {}",
            version.short_hash(),
            version.config.cache_name
        );
        self.audit
            .record(AuditEvent::WorkerActivated {
                scope: registration.scope.clone(),
                script_hash: version.script_hash.clone(),
                cache_name: version.config.cache_name.clone(),
            })
            .await;

        registration.active = Some(version);
        Ok(())
    }

    async fn commit(&self, mut registration: Registration) -> SwResult<Registration> {
        registration.touch();
        self.records.save(&registration).await?;
        *self.registration.write().await = Some(registration.clone());
        Ok(registration)
    }
}

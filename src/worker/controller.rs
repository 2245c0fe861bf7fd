//! The offline cache worker for one deployed version
//!
//! A `CacheController` is created once per worker context. It handles
//! lifecycle events (install, activate), intercepts fetches, and accepts
//! control messages. All durable state lives in `CacheStorage`; the
//! controller itself can be dropped and recreated at any time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Url;
use tokio::task::JoinHandle;

use super::lifecycle::WorkerState;
use super::routing::{Route, Router};
use crate::cache::{CacheNames, CacheStorage};
use crate::config::WorkerConfig;
use crate::error::{ConfigError, Error, FetchError, Result, WorkerError};
use crate::network::{Network, Request, Response};

/// Control message that forces a waiting worker to activate
pub const SKIP_WAITING: &str = "SKIP_WAITING";

/// Events delivered to a worker
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message(String),
}

/// What handling an event produced
#[derive(Debug)]
pub enum WorkerReply {
    Installed,
    /// Names of the namespaces removed during activation
    Activated(Vec<String>),
    Response(Response),
    Message(Option<ControlCommand>),
}

/// Recognised control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    SkipWaiting,
}

pub struct CacheController {
    prefix: String,
    version: String,
    names: CacheNames,
    router: Router,
    origin: Url,
    static_assets: Vec<String>,
    skip_waiting_on_install: bool,
    storage: Arc<Mutex<CacheStorage>>,
    network: Arc<dyn Network>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    controls_clients: AtomicBool,
    /// Background cache writes and revalidations still running
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheController {
    pub fn new(
        config: &WorkerConfig,
        storage: Arc<Mutex<CacheStorage>>,
        network: Arc<dyn Network>,
    ) -> Result<Self> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| ConfigError::Invalid(format!("worker.origin {}: {}", config.origin, e)))?;

        Ok(Self {
            prefix: config.prefix.clone(),
            version: config.version.clone(),
            names: config.cache_names(),
            router: Router::from_config(config),
            origin,
            static_assets: config.static_assets.clone(),
            skip_waiting_on_install: config.skip_waiting_on_install,
            storage,
            network,
            state: Mutex::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
            controls_clients: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn state(&self) -> WorkerState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(WorkerState::Redundant)
    }

    pub(super) fn set_state(&self, state: WorkerState) {
        if let Ok(mut current) = self.state.lock() {
            log::debug!("worker {}: {:?} -> {:?}", self.version, *current, state);
            *current = state;
        }
    }

    /// Whether this worker asked to skip the waiting phase
    pub fn wants_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Whether open pages route their fetches through this worker
    pub fn controls_clients(&self) -> bool {
        self.controls_clients.load(Ordering::SeqCst)
    }

    pub(super) fn claim_clients(&self) {
        self.controls_clients.store(true, Ordering::SeqCst);
    }

    /// Whether this version's app shell is already installed in storage
    pub fn is_installed(&self) -> Result<bool> {
        Ok(self.storage()?.has_namespace(&self.names.static_ns)?)
    }

    /// Whether this version is the one storage records as activated
    pub fn is_activated(&self) -> Result<bool> {
        let storage = self.storage()?;
        let recorded = storage.active_version(&self.prefix)?;
        Ok(recorded.as_deref() == Some(self.version.as_str())
            && storage.has_namespace(&self.names.static_ns)?)
    }

    /// Handle one event
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<WorkerReply> {
        match event {
            WorkerEvent::Install => self.install().await.map(|_| WorkerReply::Installed),
            WorkerEvent::Activate => self.activate().await.map(WorkerReply::Activated),
            WorkerEvent::Fetch(request) => self
                .handle_fetch(request)
                .await
                .map(WorkerReply::Response)
                .map_err(Error::from),
            WorkerEvent::Message(message) => Ok(WorkerReply::Message(self.handle_message(&message))),
        }
    }

    /// Populate the static namespace with the app shell.
    ///
    /// All-or-nothing: every asset must come back 2xx before anything is
    /// written, and the write is a single transaction.
    pub async fn install(&self) -> Result<()> {
        self.set_state(WorkerState::Installing);

        let requests = self
            .static_assets
            .iter()
            .map(|path| {
                self.origin
                    .join(path)
                    .map(Request::get)
                    .map_err(|e| ConfigError::Invalid(format!("static asset {}: {}", path, e)))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let fetches = requests.iter().map(|request| async move {
            let response =
                self.network
                    .fetch(request)
                    .await
                    .map_err(|e| WorkerError::InstallFailed {
                        url: request.url.to_string(),
                        reason: e.to_string(),
                    })?;
            if !response.is_success() {
                return Err(WorkerError::InstallFailed {
                    url: request.url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok::<_, WorkerError>((request.clone(), response))
        });
        let entries = futures::future::try_join_all(fetches).await?;

        {
            let storage = self.storage()?;
            storage.open_namespace(&self.names.static_ns)?;
            storage.put_all(&self.names.static_ns, &entries)?;
        }
        log::info!(
            "Installed {} shell assets into {}",
            entries.len(),
            self.names.static_ns
        );

        if self.skip_waiting_on_install {
            self.skip_waiting.store(true, Ordering::SeqCst);
        }
        self.set_state(WorkerState::Installed);
        Ok(())
    }

    /// Delete every namespace that is not this version's, then take over
    /// open pages.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.set_state(WorkerState::Activating);

        let mut deleted = Vec::new();
        {
            let storage = self.storage()?;
            for name in storage.namespaces()? {
                if !self.names.is_current(&name) {
                    storage.delete_namespace(&name)?;
                    log::info!("Deleted stale cache namespace {}", name);
                    deleted.push(name);
                }
            }
            storage.open_namespace(&self.names.dynamic)?;
            storage.set_active_version(&self.prefix, &self.version)?;
        }

        self.claim_clients();
        self.set_state(WorkerState::Active);
        Ok(deleted)
    }

    /// Handle a control message. Unknown messages are ignored.
    pub fn handle_message(&self, message: &str) -> Option<ControlCommand> {
        match message.trim() {
            SKIP_WAITING => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                Some(ControlCommand::SkipWaiting)
            }
            other => {
                log::debug!("Ignoring unknown worker message {:?}", other);
                None
            }
        }
    }

    /// Intercept a request
    pub async fn handle_fetch(&self, request: Request) -> std::result::Result<Response, FetchError> {
        match self.router.route(&request) {
            Route::Passthrough => self.network.fetch(&request).await,
            Route::Navigation => self.navigation(request).await,
            Route::StaticAsset => self.stale_while_revalidate(request).await,
            Route::NetworkFirst => self.network_first(request).await,
        }
    }

    /// Wait for background cache writes and revalidations to finish
    pub async fn settle(&self) {
        loop {
            let handles = self
                .pending
                .lock()
                .map(|mut pending| std::mem::take(&mut *pending))
                .unwrap_or_default();
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    log::debug!("Background cache task failed: {}", e);
                }
            }
        }
    }

    async fn navigation(&self, request: Request) -> std::result::Result<Response, FetchError> {
        match self.network.fetch(&request).await {
            Ok(response) => {
                self.cache_in_background(request, response.clone());
                Ok(response)
            }
            Err(err) => {
                if let Some(hit) = self.lookup(|s| s.match_in(&self.names.dynamic, &request)) {
                    log::debug!("Offline navigation served from cache: {}", request.url);
                    return Ok(hit);
                }
                let root = self.origin.join("/").map(Request::get);
                if let Some(hit) = root.ok().and_then(|root| self.lookup(|s| s.match_any(&root))) {
                    log::debug!("Offline navigation served root document: {}", request.url);
                    return Ok(hit);
                }
                Err(err)
            }
        }
    }

    async fn stale_while_revalidate(
        &self,
        request: Request,
    ) -> std::result::Result<Response, FetchError> {
        if let Some(hit) = self.lookup(|s| s.match_any(&request)) {
            log::debug!("Cache hit: {}", request.url);
            self.revalidate_in_background(request);
            return Ok(hit);
        }

        log::debug!("Cache miss: {}", request.url);
        let response = self.network.fetch(&request).await?;
        self.cache_in_background(request, response.clone());
        Ok(response)
    }

    async fn network_first(&self, request: Request) -> std::result::Result<Response, FetchError> {
        match self.network.fetch(&request).await {
            Ok(response) => {
                self.cache_in_background(request, response.clone());
                Ok(response)
            }
            Err(err) => match self.lookup(|s| s.match_any(&request)) {
                Some(hit) => {
                    log::debug!("Network failed, served from cache: {}", request.url);
                    Ok(hit)
                }
                None => Err(err),
            },
        }
    }

    /// Read from storage, treating storage errors as a miss
    fn lookup<F>(&self, find: F) -> Option<Response>
    where
        F: FnOnce(&CacheStorage) -> std::result::Result<Option<Response>, crate::error::CacheError>,
    {
        let storage = self.storage().ok()?;
        match find(&storage) {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Cache lookup failed: {}", e);
                None
            }
        }
    }

    fn cache_in_background(&self, request: Request, response: Response) {
        if !response.is_success() {
            return;
        }
        let storage = Arc::clone(&self.storage);
        let namespace = self.names.dynamic.clone();
        let handle = tokio::task::spawn_blocking(move || {
            store_quietly(&storage, &namespace, &request, &response);
        });
        self.track(handle);
    }

    fn revalidate_in_background(&self, request: Request) {
        let storage = Arc::clone(&self.storage);
        let network = Arc::clone(&self.network);
        let namespace = self.names.dynamic.clone();
        let handle = tokio::spawn(async move {
            match network.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    let url = request.url.clone();
                    let store = tokio::task::spawn_blocking(move || {
                        store_quietly(&storage, &namespace, &request, &response);
                    });
                    if let Err(e) = store.await {
                        log::debug!("Storing revalidated {} failed: {}", url, e);
                    }
                }
                Ok(response) => {
                    log::debug!("Revalidation of {} got {}", request.url, response.status);
                }
                Err(e) => log::debug!("Revalidation of {} failed: {}", request.url, e),
            }
        });
        self.track(handle);
    }

    fn track(&self, handle: JoinHandle<()>) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
    }

    fn storage(&self) -> Result<MutexGuard<'_, CacheStorage>> {
        self.storage
            .lock()
            .map_err(|_| Error::Other("cache storage lock poisoned".to_string()))
    }
}

/// Best-effort write; failures are logged and dropped
fn store_quietly(
    storage: &Mutex<CacheStorage>,
    namespace: &str,
    request: &Request,
    response: &Response,
) {
    let result = match storage.lock() {
        Ok(storage) => storage.put(namespace, request, response),
        Err(_) => return,
    };
    if let Err(e) = result {
        log::debug!("Skipped caching {}: {}", request.url, e);
    }
}

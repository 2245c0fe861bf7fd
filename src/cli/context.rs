//! Command execution context
//!
//! Loads config once and builds the storage, worker registration and
//! progress tracker that commands need.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::CacheStorage;
use crate::cli::{GlobalOptions, OutputFormat, spinner};
use crate::client::{SupabaseClient, User};
use crate::config::{Config, WorkerConfig};
use crate::error::{Error, Result, WorkerError};
use crate::network::{HttpNetwork, Network};
use crate::progress::{ConsoleNotifier, ProgressTracker};
use crate::worker::{CacheController, Registration, WorkerState};

/// Context for command execution containing config and runtime options.
pub struct CommandContext {
    /// Loaded configuration (defaults when no file exists)
    pub config: Config,
    /// Global CLI options
    pub opts: GlobalOptions,
}

impl CommandContext {
    /// Load config from `--config` or the default location
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = Config::load_at(opts.config_ref())?;
        Ok(Self {
            config,
            opts: opts.clone(),
        })
    }

    pub fn format(&self) -> OutputFormat {
        self.opts.format
    }

    /// The signed-in user, if any
    pub fn user(&self) -> Option<User> {
        self.config.current_user()
    }

    /// Open the durable cache at `--cache-dir` or the default location
    pub fn open_storage(&self) -> Result<CacheStorage> {
        let storage = match self.opts.cache_dir_ref() {
            Some(dir) => CacheStorage::open_at(Path::new(dir))?,
            None => CacheStorage::open()?,
        };
        Ok(storage)
    }

    /// Worker pieces sharing one storage handle and one network
    pub fn worker_runtime(&self) -> Result<WorkerRuntime> {
        let network: Arc<dyn Network> = Arc::new(HttpNetwork::new()?);
        let storage = Arc::new(Mutex::new(self.open_storage()?));
        Ok(WorkerRuntime { network, storage })
    }

    /// Progress tracker bound to the hosted backend, loaded for the current user
    pub async fn progress_tracker(&self) -> Result<ProgressTracker<SupabaseClient>> {
        let client = SupabaseClient::from_config(&self.config)?;
        let tracker =
            ProgressTracker::new(client, Arc::new(ConsoleNotifier)).with_user(self.user());

        let spinner = spinner("Loading progress...".to_string());
        let tick = async {
            while tracker.is_loading() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::join!(tracker.refresh(), tick);
        spinner.finish_and_clear();

        Ok(tracker)
    }
}

/// Shared handles for building worker controllers
pub struct WorkerRuntime {
    pub network: Arc<dyn Network>,
    pub storage: Arc<Mutex<CacheStorage>>,
}

impl WorkerRuntime {
    pub fn controller(&self, config: &WorkerConfig) -> Result<CacheController> {
        CacheController::new(config, Arc::clone(&self.storage), Arc::clone(&self.network))
    }

    pub fn registration(&self) -> Registration {
        Registration::new(Arc::clone(&self.network))
    }

    /// The version that last completed activation, as recorded in storage
    pub fn active_version(&self, config: &WorkerConfig) -> Result<Option<String>> {
        let storage = self
            .storage
            .lock()
            .map_err(|_| Error::Other("cache storage lock poisoned".to_string()))?;
        Ok(storage.active_version(&config.prefix)?)
    }

    /// Resume `version` of the configured worker into `registration`.
    /// Returns `None` when that version is not installed.
    pub fn resume_version(
        &self,
        registration: &mut Registration,
        config: &WorkerConfig,
        version: &str,
    ) -> Result<Option<WorkerState>> {
        let mut versioned = config.clone();
        versioned.version = version.to_string();
        match registration.resume(self.controller(&versioned)?) {
            Ok(state) => Ok(Some(state)),
            Err(Error::Worker(WorkerError::NotDeployed)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// A registration with the last activated version as the active worker
    /// and the configured version waiting when it was installed but never
    /// activated
    pub fn resume_current(&self, config: &WorkerConfig) -> Result<Registration> {
        let mut registration = self.registration();
        if let Some(active) = self.active_version(config)?.filter(|v| *v != config.version) {
            self.resume_version(&mut registration, config, &active)?;
        }

        match self.resume_version(&mut registration, config, &config.version)? {
            Some(WorkerState::Active) => {}
            Some(_) => log::warn!(
                "Worker {} is installed but waiting; run 'learnhub worker deploy' to activate it",
                config.version
            ),
            None => log::warn!(
                "Worker {} is not installed; requests go straight to the network",
                config.version
            ),
        }
        Ok(registration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> CommandContext {
        let opts = GlobalOptions {
            format: OutputFormat::Json,
            config: Some(dir.path().join("config.yaml").display().to_string()),
            cache_dir: Some(dir.path().join("cache").display().to_string()),
        };
        CommandContext::new(&opts).unwrap()
    }

    #[test]
    fn test_context_without_config_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);

        assert!(ctx.user().is_none());
        assert_eq!(ctx.format(), OutputFormat::Json);
        assert!(ctx.open_storage().unwrap().namespaces().unwrap().is_empty());
    }

    #[test]
    fn test_resume_current_ignores_unactivated_version() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let runtime = ctx.worker_runtime().unwrap();
        {
            let storage = runtime.storage.lock().unwrap();
            storage.open_namespace("learnhub-static-v1").unwrap();
            storage.open_namespace("learnhub-dynamic-v1").unwrap();
            storage.set_active_version("learnhub", "v1").unwrap();
            storage.open_namespace("learnhub-static-v2").unwrap();
        }

        let config = &ctx.config.worker;
        assert_eq!(runtime.active_version(config).unwrap().as_deref(), Some("v1"));

        let registration = runtime.resume_current(config).unwrap();
        assert_eq!(registration.active().unwrap().version(), "v1");
        assert_eq!(registration.waiting().unwrap().version(), "v2");
        assert_eq!(
            registration.waiting().unwrap().state(),
            WorkerState::Installed
        );
    }

    #[test]
    fn test_resume_current_on_empty_cache() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let runtime = ctx.worker_runtime().unwrap();

        let registration = runtime.resume_current(&ctx.config.worker).unwrap();
        assert!(registration.active().is_none());
        assert!(registration.waiting().is_none());
    }

    #[tokio::test]
    async fn test_progress_requires_backend() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        assert!(ctx.progress_tracker().await.is_err());
    }
}

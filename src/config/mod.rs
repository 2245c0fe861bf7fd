//! Configuration management for LearnHub

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::CacheNames;
use crate::catalog::Course;
use crate::client::User;
use crate::error::{ConfigError, Result};
use crate::worker::ExclusionRule;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hosted backend connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,

    /// Signed-in session, absent when signed out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,

    /// Offline cache worker settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Course catalog
    #[serde(default)]
    pub courses: Vec<Course>,
}

/// Hosted backend (PostgREST) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    pub url: String,

    /// Public anonymous API key sent as `apikey`
    pub anon_key: String,
}

/// Access token and the identity decoded from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,

    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| exp <= Utc::now())
    }
}

/// Offline cache worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Origin the app shell is served from
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix shared by all namespace names
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Version tag; bump to invalidate caches on deploy
    #[serde(default = "default_version")]
    pub version: String,

    /// Version tag of the old general namespace to clean up
    #[serde(default = "default_legacy_version")]
    pub legacy_version: String,

    /// Root-relative paths cached at install
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// File extensions served stale-while-revalidate
    #[serde(default = "default_asset_extensions")]
    pub asset_extensions: Vec<String>,

    /// Requests the worker never touches, as `- host_contains: supabase` maps
    #[serde(
        default = "default_exclusions",
        with = "serde_yaml::with::singleton_map_recursive"
    )]
    pub exclusions: Vec<ExclusionRule>,

    /// Promote straight to active after install
    #[serde(default = "default_skip_waiting")]
    pub skip_waiting_on_install: bool,
}

fn default_origin() -> String {
    "http://localhost:5173".to_string()
}

fn default_prefix() -> String {
    "learnhub".to_string()
}

fn default_version() -> String {
    "v2".to_string()
}

fn default_legacy_version() -> String {
    "v1".to_string()
}

fn default_static_assets() -> Vec<String> {
    ["/", "/manifest.json", "/icon-192.png", "/icon-512.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_asset_extensions() -> Vec<String> {
    [
        "js", "mjs", "css", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2",
        "ttf", "eot",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_exclusions() -> Vec<ExclusionRule> {
    vec![
        ExclusionRule::HostContains("supabase".to_string()),
        ExclusionRule::HostContains("api.".to_string()),
        ExclusionRule::PathContains("/functions/".to_string()),
    ]
}

fn default_skip_waiting() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            prefix: default_prefix(),
            version: default_version(),
            legacy_version: default_legacy_version(),
            static_assets: default_static_assets(),
            asset_extensions: default_asset_extensions(),
            exclusions: default_exclusions(),
            skip_waiting_on_install: default_skip_waiting(),
        }
    }
}

impl WorkerConfig {
    pub fn cache_names(&self) -> CacheNames {
        CacheNames::new(&self.prefix, &self.version, &self.legacy_version)
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".learnhub").join("config.yaml"))
    }

    /// Resolve `--config` or the default location
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration, falling back to defaults when no file exists yet
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        match Self::load_from(path) {
            Err(crate::error::Error::Config(ConfigError::NotFound)) => {
                log::debug!("No config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Save configuration to `--config` or the default path
    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(Self::resolve_path(path)?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(&path, contents)?;

        // Set file permissions to 600 on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Backend settings, or an error telling the user to run init
    pub fn require_backend(&self) -> Result<&BackendConfig> {
        self.backend
            .as_ref()
            .ok_or_else(|| ConfigError::MissingBackend.into())
    }

    /// The signed-in user, if the session is present and unexpired
    pub fn current_user(&self) -> Option<User> {
        self.session
            .as_ref()
            .filter(|s| !s.is_expired())
            .map(|s| User {
                id: s.user_id.clone(),
                email: s.email.clone(),
            })
    }

    /// Look a course up in the catalog
    pub fn course(&self, id: &str) -> Result<&Course> {
        self.courses
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ConfigError::UnknownCourse(id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session(expires_at: Option<DateTime<Utc>>) -> Session {
        Session {
            access_token: "token".to_string(),
            user_id: "user-1".to_string(),
            email: Some("ada@example.com".to_string()),
            expires_at,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.backend.is_none());
        assert!(config.session.is_none());
        assert_eq!(config.worker.static_assets.len(), 4);
        assert_eq!(config.worker.exclusions.len(), 3);
        assert!(config.worker.skip_waiting_on_install);
    }

    #[test]
    fn test_partial_worker_section_keeps_defaults() {
        let config: Config = serde_yaml::from_str("worker:\n  version: v9\n").unwrap();
        assert_eq!(config.worker.version, "v9");
        assert_eq!(config.worker.prefix, "learnhub");
        assert_eq!(config.worker.cache_names().static_ns, "learnhub-static-v9");
    }

    #[test]
    fn test_exclusions_parse_from_yaml() {
        let yaml = "worker:\n  exclusions:\n    - host_contains: backend.\n    - path_contains: /rpc/\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.worker.exclusions,
            vec![
                ExclusionRule::HostContains("backend.".to_string()),
                ExclusionRule::PathContains("/rpc/".to_string()),
            ]
        );
    }

    #[test]
    fn test_exclusions_round_trip_as_maps() {
        let mut config = Config::default();
        config.worker.exclusions = vec![ExclusionRule::PathContains("/rpc/".to_string())];

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("- path_contains: /rpc/"));

        let loaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(loaded.worker.exclusions, config.worker.exclusions);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "worker:\n  exclusions: 12\n").unwrap();

        assert!(Config::load_at(path.to_str()).is_err());
    }

    #[test]
    fn test_current_user_requires_live_session() {
        let mut config = Config::default();
        assert!(config.current_user().is_none());

        config.session = Some(session(None));
        assert_eq!(config.current_user().unwrap().id, "user-1");

        config.session = Some(session(Some(Utc::now() + chrono::Duration::hours(1))));
        assert!(config.current_user().is_some());

        config.session = Some(session(Some(Utc::now() - chrono::Duration::hours(1))));
        assert!(config.current_user().is_none());
    }

    #[test]
    fn test_require_backend() {
        let mut config = Config::default();
        assert!(config.require_backend().is_err());

        config.backend = Some(BackendConfig {
            url: "https://demo.supabase.co".to_string(),
            anon_key: "anon".to_string(),
        });
        assert_eq!(config.require_backend().unwrap().anon_key, "anon");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.yaml");
        let config = Config::load_at(path.to_str()).unwrap();
        assert!(config.backend.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.session = Some(session(None));
        config.save_to(path.clone()).unwrap();

        let loaded = Config::load_from(path).unwrap();
        assert_eq!(loaded.session.unwrap().email.as_deref(), Some("ada@example.com"));
    }
}

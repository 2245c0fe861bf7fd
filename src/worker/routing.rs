//! Request routing: decides which caching strategy handles a request

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

use crate::config::WorkerConfig;
use crate::network::Request;

/// A request the worker must leave alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionRule {
    /// Host contains the substring (e.g. `supabase`, `api.`)
    HostContains(String),
    /// Path contains the substring (e.g. `/functions/`)
    PathContains(String),
}

impl ExclusionRule {
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            ExclusionRule::HostContains(needle) => {
                url.host_str().is_some_and(|host| host.contains(needle.as_str()))
            }
            ExclusionRule::PathContains(needle) => url.path().contains(needle.as_str()),
        }
    }
}

/// Strategy chosen for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted: straight to the network, never stored
    Passthrough,
    /// Network first, then dynamic cache, then the cached root document
    Navigation,
    /// Cache first with background revalidation
    StaticAsset,
    /// Network first with fallback to any cache
    NetworkFirst,
}

/// Ordered routing rules
#[derive(Debug, Clone)]
pub struct Router {
    exclusions: Vec<ExclusionRule>,
    asset_extensions: Vec<String>,
}

impl Router {
    pub fn new(exclusions: Vec<ExclusionRule>, asset_extensions: Vec<String>) -> Self {
        Self {
            exclusions,
            asset_extensions: asset_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.exclusions.clone(), config.asset_extensions.clone())
    }

    /// Route a request. Rules apply in order and the first match wins.
    pub fn route(&self, request: &Request) -> Route {
        if request.method != Method::GET {
            return Route::Passthrough;
        }
        if self.is_excluded(&request.url) {
            return Route::Passthrough;
        }
        if request.is_navigation() {
            return Route::Navigation;
        }
        if self.is_static_asset(&request.url) {
            return Route::StaticAsset;
        }
        Route::NetworkFirst
    }

    pub fn is_excluded(&self, url: &Url) -> bool {
        self.exclusions.iter().any(|rule| rule.matches(url))
    }

    fn is_static_asset(&self, url: &Url) -> bool {
        let last_segment = url.path().rsplit('/').next().unwrap_or_default();
        match last_segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.asset_extensions.iter().any(|allowed| *allowed == ext)
            }
            _ => false,
        }
    }
}

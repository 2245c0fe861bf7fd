//! Durable, namespaced response cache used by the offline worker
//!
//! Provides SQLite-backed storage partitioned into named namespaces, plus
//! the versioned namespace naming scheme that drives cache invalidation on
//! deploy.

pub mod key;
pub mod storage;

use serde::Serialize;

/// Namespace names for one worker version.
///
/// Bumping the version changes every name, which is what invalidates the
/// previous version's caches at activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheNames {
    /// General namespace of an older layout. Never created, always cleaned up.
    pub legacy: String,
    /// App shell, populated once at install
    pub static_ns: String,
    /// Runtime-populated responses
    pub dynamic: String,
}

impl CacheNames {
    pub fn new(prefix: &str, version: &str, legacy_version: &str) -> Self {
        Self {
            legacy: format!("{}-{}", prefix, legacy_version),
            static_ns: format!("{}-static-{}", prefix, version),
            dynamic: format!("{}-dynamic-{}", prefix, version),
        }
    }

    /// Whether a namespace survives activation of this version
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_ns || name == self.dynamic
    }
}

// Re-export main types
pub use storage::{CacheStorage, NamespaceStats};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_carry_version() {
        let names = CacheNames::new("learnhub", "v3", "v1");
        assert_eq!(names.static_ns, "learnhub-static-v3");
        assert_eq!(names.dynamic, "learnhub-dynamic-v3");
        assert_eq!(names.legacy, "learnhub-v1");
    }

    #[test]
    fn test_only_static_and_dynamic_are_current() {
        let names = CacheNames::new("learnhub", "v3", "v1");
        assert!(names.is_current("learnhub-static-v3"));
        assert!(names.is_current("learnhub-dynamic-v3"));
        assert!(!names.is_current("learnhub-v1"));
        assert!(!names.is_current("learnhub-static-v2"));
    }
}

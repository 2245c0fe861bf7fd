//! Error types for the LearnHub CLI

use std::time::Duration;
use thiserror::Error;

/// Result type alias for LearnHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

/// Errors from the hosted progress store
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not signed in or session expired. Run `learnhub init` with a fresh access token.")]
    Unauthorized,

    #[error("Access denied by row-level security. You can only touch your own progress.")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded. Retry after {0:?}")]
    RateLimit(Duration),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Invalid access token: {0}")]
    InvalidToken(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to backend".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found. Run `learnhub init` to set up.")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Backend not configured. Run `learnhub init` to set the backend URL and anon key.")]
    MissingBackend,

    #[error("Unknown course: {0}")]
    UnknownCourse(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Durable cache storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine home directory for cache")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("Only GET requests can be cached, got {0}")]
    NotCacheable(String),
}

/// Network fetch failures.
///
/// An HTTP error status is not a fetch failure; only the absence of a
/// response is.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Network unreachable: {0}")]
    Offline(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        if err.is_timeout() {
            FetchError::Timeout(url)
        } else if err.is_builder() {
            FetchError::InvalidUrl(url)
        } else {
            FetchError::Offline(format!("{}: {}", url, err))
        }
    }
}

/// Cache worker lifecycle errors
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Install failed for {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Invalid worker state: {0}")]
    State(String),

    #[error("No active worker. Run `learnhub worker deploy` first.")]
    NotDeployed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_unauthorized_message() {
        let err = ApiError::Unauthorized;
        assert!(err.to_string().contains("learnhub init"));
    }

    #[test]
    fn test_api_error_forbidden_message() {
        let err = ApiError::Forbidden;
        assert!(err.to_string().contains("row-level security"));
    }

    #[test]
    fn test_api_error_rate_limit() {
        let err = ApiError::RateLimit(Duration::from_secs(30));
        let msg = err.to_string();
        assert!(msg.contains("Rate limit"));
        assert!(msg.contains("30"));
    }

    #[test]
    fn test_api_error_bad_request() {
        let err = ApiError::BadRequest("invalid input syntax".to_string());
        assert!(err.to_string().contains("invalid input syntax"));
    }

    #[test]
    fn test_config_error_missing_backend() {
        let err = ConfigError::MissingBackend;
        assert!(err.to_string().contains("learnhub init"));
    }

    #[test]
    fn test_config_error_unknown_course() {
        let err = ConfigError::UnknownCourse("rust-101".to_string());
        assert!(err.to_string().contains("rust-101"));
    }

    #[test]
    fn test_cache_error_not_cacheable() {
        let err = CacheError::NotCacheable("POST".to_string());
        assert!(err.to_string().contains("POST"));
    }

    #[test]
    fn test_worker_error_install_failed() {
        let err = WorkerError::InstallFailed {
            url: "https://app.test/icon-192.png".to_string(),
            reason: "status 404".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("icon-192.png"));
        assert!(msg.contains("404"));
    }

    #[test]
    fn test_error_from_api_error() {
        let err: Error = ApiError::Unauthorized.into();

        match err {
            Error::Api(ApiError::Unauthorized) => (),
            _ => panic!("Expected Error::Api(ApiError::Unauthorized)"),
        }
    }

    #[test]
    fn test_error_from_fetch_error() {
        let err: Error = FetchError::Offline("no route".to_string()).into();

        match err {
            Error::Fetch(FetchError::Offline(_)) => (),
            _ => panic!("Expected Error::Fetch(FetchError::Offline)"),
        }
    }

    #[test]
    fn test_config_error_from_yaml_error() {
        let yaml_str = "invalid: [yaml: content";
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let config_err: ConfigError = yaml_err.into();

        match config_err {
            ConfigError::ParseError(_) => (),
            _ => panic!("Expected ConfigError::ParseError"),
        }
    }
}

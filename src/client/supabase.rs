//! PostgREST client for the hosted progress store

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ProgressApi, ProgressRecord};
use crate::config::Config;
use crate::error::{ApiError, ConfigError, Result};

/// Progress table exposed by PostgREST
const PROGRESS_PATH: &str = "/rest/v1/user_progress";

/// Environment override for the backend URL
pub const API_URL_ENV: &str = "LEARNHUB_API_URL";

/// Identity claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Decode base64url (URL-safe base64 without padding)
fn base64_decode_url(input: &str) -> std::result::Result<Vec<u8>, String> {
    use base64::{Engine as _, engine::general_purpose};

    general_purpose::URL_SAFE_NO_PAD
        .decode(input.trim_end_matches('='))
        .map_err(|e| e.to_string())
}

/// Read `sub`, `email` and `exp` from a JWT without verifying it.
///
/// The backend verifies the signature on every request.
pub fn decode_access_token(token: &str) -> Result<TokenClaims> {
    #[derive(Deserialize)]
    struct JwtPayload {
        sub: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        exp: Option<i64>,
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(ApiError::InvalidToken("expected three dot-separated parts".to_string()).into());
    }

    let payload_bytes = base64_decode_url(parts[1])
        .map_err(|e| ApiError::InvalidToken(format!("payload is not base64url: {}", e)))?;
    let payload: JwtPayload = serde_json::from_slice(&payload_bytes)
        .map_err(|e| ApiError::InvalidToken(format!("payload: {}", e)))?;

    let expires_at = match payload.exp {
        Some(exp) => Some(
            DateTime::from_timestamp(exp, 0)
                .ok_or_else(|| ApiError::InvalidToken("bad exp timestamp".to_string()))?,
        ),
        None => None,
    };

    Ok(TokenClaims {
        user_id: payload.sub,
        email: payload.email.filter(|e| !e.is_empty()),
        expires_at,
    })
}

/// Hosted backend client
pub struct SupabaseClient {
    http: HttpClient,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl SupabaseClient {
    /// Create a client for a project URL and anon key
    pub fn new(base_url: &str, anon_key: &str, access_token: Option<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("learnhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token,
        })
    }

    /// Build a client from config, honouring `LEARNHUB_API_URL`
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = config.require_backend()?;
        let url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| backend.url.clone());
        if url.is_empty() {
            return Err(ConfigError::Invalid("backend.url is empty".to_string()).into());
        }
        let token = config
            .session
            .as_ref()
            .filter(|s| !s.is_expired())
            .map(|s| s.access_token.clone());
        Self::new(&url, &backend.anon_key, token)
    }

    fn authorized(&self, method: Method, path_and_query: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path_and_query);
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    /// Send a request and map the status the way every endpoint needs
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(ApiError::from)?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                let data = response.json::<T>().await.map_err(|e| {
                    ApiError::InvalidResponse(format!("Failed to parse response: {}", e))
                })?;
                Ok(data)
            }
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized.into()),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden.into()),
            StatusCode::NOT_FOUND => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Resource not found".to_string());
                Err(ApiError::NotFound(error_msg).into())
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                Err(ApiError::RateLimit(Duration::from_secs(retry_after)).into())
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Bad request".to_string());
                Err(ApiError::BadRequest(error_msg).into())
            }
            status if status.is_server_error() => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| format!("Server error: {}", status));
                Err(ApiError::ServerError(error_msg).into())
            }
            _ => {
                let error_msg = format!("Unexpected status code: {}", status);
                Err(ApiError::InvalidResponse(error_msg).into())
            }
        }
    }
}

#[async_trait]
impl ProgressApi for SupabaseClient {
    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>> {
        let filter = format!("eq.{}", user_id);
        log::debug!("GET {}{} user_id={}", self.base_url, PROGRESS_PATH, filter);
        let request = self
            .authorized(Method::GET, PROGRESS_PATH)
            .query(&[("select", "*"), ("user_id", filter.as_str())]);
        self.send(request).await
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<ProgressRecord> {
        let path = format!("{}?on_conflict=user_id,lesson_id", PROGRESS_PATH);
        log::debug!("POST {}{} lesson={}", self.base_url, path, record.lesson_id);
        let request = self
            .authorized(Method::POST, &path)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(record);

        let mut rows: Vec<ProgressRecord> = self.send(request).await?;
        rows.pop().ok_or_else(|| {
            ApiError::InvalidResponse("upsert returned no representation".to_string()).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use mockito::Matcher;

    fn token(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_access_token() {
        let claims =
            decode_access_token(&token(r#"{"sub":"u-1","email":"ada@example.com","exp":1900000000}"#))
                .unwrap();
        assert_eq!(claims.user_id, "u-1");
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
        assert_eq!(claims.expires_at.unwrap().timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_decode_access_token_without_optional_claims() {
        let claims = decode_access_token(&token(r#"{"sub":"u-2","email":""}"#)).unwrap();
        assert_eq!(claims.user_id, "u-2");
        assert!(claims.email.is_none());
        assert!(claims.expires_at.is_none());
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert!(decode_access_token("not-a-jwt").is_err());
        assert!(decode_access_token("a.!!!.c").is_err());
        assert!(decode_access_token(&token(r#"{"email":"x"}"#)).is_err());
    }

    fn record() -> ProgressRecord {
        ProgressRecord::new("u-1", "html-1", 100, true)
    }

    #[tokio::test]
    async fn test_list_progress_sends_auth_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/user_progress")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("user_id".into(), "eq.u-1".into()),
            ]))
            .match_header("apikey", "anon")
            .match_header("authorization", "Bearer user-token")
            .with_status(200)
            .with_body(
                r#"[{"user_id":"u-1","lesson_id":"html-1","progress":40,
                     "is_completed":false,"last_accessed":"2026-03-01T10:00:00Z"}]"#,
            )
            .create_async()
            .await;

        let client =
            SupabaseClient::new(&server.url(), "anon", Some("user-token".to_string())).unwrap();
        let rows = client.list_progress("u-1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].progress, 40);
    }

    #[tokio::test]
    async fn test_list_progress_encodes_user_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/user_progress")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("user_id".into(), "eq.a&b=c d".into()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = SupabaseClient::new(&server.url(), "anon", None).unwrap();
        let rows = client.list_progress("a&b=c d").await.unwrap();

        mock.assert_async().await;
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_list_progress_rounds_fractional_progress() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/v1/user_progress")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"user_id":"u-1","lesson_id":"html-1","progress":42.6,
                     "is_completed":false,"last_accessed":"2026-03-01T10:00:00Z"},
                    {"user_id":"u-1","lesson_id":"html-2","progress":100,
                     "is_completed":true,"last_accessed":"2026-03-01T10:00:00Z"}]"#,
            )
            .create_async()
            .await;

        let client = SupabaseClient::new(&server.url(), "anon", None).unwrap();
        let rows = client.list_progress("u-1").await.unwrap();

        assert_eq!(rows[0].progress, 43);
        assert_eq!(rows[1].progress, 100);
    }

    #[tokio::test]
    async fn test_upsert_requests_merge_and_representation() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/user_progress")
            .match_query(Matcher::UrlEncoded(
                "on_conflict".into(),
                "user_id,lesson_id".into(),
            ))
            .match_header("prefer", "resolution=merge-duplicates,return=representation")
            .match_body(Matcher::PartialJsonString(
                r#"{"lesson_id":"html-1","progress":100,"is_completed":true}"#.to_string(),
            ))
            .with_status(201)
            .with_body(
                r#"[{"user_id":"u-1","lesson_id":"html-1","progress":100,
                     "is_completed":true,"last_accessed":"2026-03-01T10:00:00Z"}]"#,
            )
            .create_async()
            .await;

        let client = SupabaseClient::new(&server.url(), "anon", Some("t".to_string())).unwrap();
        let stored = client.upsert_progress(&record()).await.unwrap();

        mock.assert_async().await;
        assert!(stored.is_completed);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let mut server = mockito::Server::new_async().await;
        let client = SupabaseClient::new(&server.url(), "anon", None).unwrap();

        let _m = server
            .mock("GET", "/rest/v1/user_progress")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;
        let err = client.list_progress("u-1").await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Api(ApiError::Unauthorized)));

        server.reset_async().await;
        let _m = server
            .mock("GET", "/rest/v1/user_progress")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;
        let err = client.list_progress("u-1").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Api(ApiError::RateLimit(d)) if d == Duration::from_secs(7)
        ));
    }

    #[tokio::test]
    async fn test_empty_representation_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/rest/v1/user_progress")
            .match_query(Matcher::Any)
            .with_status(201)
            .with_body("[]")
            .create_async()
            .await;

        let client = SupabaseClient::new(&server.url(), "anon", None).unwrap();
        let err = client.upsert_progress(&record()).await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Api(ApiError::InvalidResponse(_))));
    }
}

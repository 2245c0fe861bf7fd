//! Remote progress store client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

#[cfg(test)]
pub mod mock;
pub mod supabase;

#[cfg(test)]
pub use mock::MockProgressApi;
pub use supabase::{SupabaseClient, decode_access_token};

/// Remote progress store
#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// All progress rows belonging to a user
    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>>;

    /// Insert or update one row, keyed by (user, lesson). Returns the row
    /// as stored.
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<ProgressRecord>;
}

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A row of the `user_progress` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,

    pub lesson_id: String,

    /// 0..=100; the column is numeric, so fractions are rounded on read
    #[serde(deserialize_with = "deserialize_progress")]
    pub progress: u32,

    pub is_completed: bool,

    pub last_accessed: DateTime<Utc>,
}

fn deserialize_progress<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.round().clamp(0.0, u32::MAX as f64) as u32)
}

impl ProgressRecord {
    /// A fresh row for a write, stamped with the current time
    pub fn new(user_id: &str, lesson_id: &str, progress: u32, is_completed: bool) -> Self {
        Self {
            user_id: user_id.to_string(),
            lesson_id: lesson_id.to_string(),
            progress,
            is_completed,
            last_accessed: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let json = r#"{
            "id": "8d1c",
            "user_id": "u1",
            "lesson_id": "html-1",
            "progress": 40,
            "is_completed": false,
            "last_accessed": "2026-03-01T10:00:00+00:00",
            "created_at": "2026-02-01T10:00:00+00:00"
        }"#;
        let record: ProgressRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.lesson_id, "html-1");
        assert_eq!(record.progress, 40);
        assert!(!record.is_completed);
    }

    #[test]
    fn test_record_rounds_numeric_progress() {
        let json = r#"{"user_id":"u1","lesson_id":"html-1","progress":66.5,
                       "is_completed":false,"last_accessed":"2026-03-01T10:00:00Z"}"#;
        let record: ProgressRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.progress, 67);
    }
}

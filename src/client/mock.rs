//! Mock progress store for testing
//!
//! Keeps rows in memory, keyed by (user, lesson) the same way the remote
//! table's unique constraint does.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{ProgressApi, ProgressRecord};
use crate::error::{ApiError, Result};

/// Mock progress store.
///
/// # Example
/// ```ignore
/// let api = MockProgressApi::new()
///     .with_records(vec![ProgressRecord::new("u1", "html-1", 40, false)])
///     .await;
/// ```
#[derive(Default)]
pub struct MockProgressApi {
    /// Stored rows
    records: Arc<Mutex<Vec<ProgressRecord>>>,
    /// Error to return (if any) - consumed on first use
    error: Arc<Mutex<Option<ApiError>>>,
    /// Track number of calls for verification
    call_count: Arc<Mutex<CallCounts>>,
    /// Rows passed to upsert, in call order
    captured_upserts: Arc<Mutex<Vec<ProgressRecord>>>,
}

/// Tracks API call counts for test verification
#[derive(Default, Debug, Clone)]
pub struct CallCounts {
    pub list_progress: usize,
    pub upsert_progress: usize,
}

impl MockProgressApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed stored rows
    pub async fn with_records(self, records: Vec<ProgressRecord>) -> Self {
        *self.records.lock().await = records;
        self
    }

    /// Fail the next call with this error
    pub async fn with_error(self, error: ApiError) -> Self {
        *self.error.lock().await = Some(error);
        self
    }

    pub async fn set_error(&self, error: ApiError) {
        *self.error.lock().await = Some(error);
    }

    pub async fn call_counts(&self) -> CallCounts {
        self.call_count.lock().await.clone()
    }

    pub async fn captured_upserts(&self) -> Vec<ProgressRecord> {
        self.captured_upserts.lock().await.clone()
    }

    async fn take_error(&self) -> Result<()> {
        match self.error.lock().await.take() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProgressApi for MockProgressApi {
    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>> {
        self.call_count.lock().await.list_progress += 1;
        self.take_error().await?;

        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<ProgressRecord> {
        self.call_count.lock().await.upsert_progress += 1;
        self.captured_upserts.lock().await.push(record.clone());
        self.take_error().await?;

        let mut records = self.records.lock().await;
        match records
            .iter_mut()
            .find(|r| r.user_id == record.user_id && r.lesson_id == record.lesson_id)
        {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_replaces_by_user_and_lesson() {
        let api = MockProgressApi::new();
        api.upsert_progress(&ProgressRecord::new("u1", "l1", 10, false))
            .await
            .unwrap();
        api.upsert_progress(&ProgressRecord::new("u1", "l1", 60, false))
            .await
            .unwrap();
        api.upsert_progress(&ProgressRecord::new("u2", "l1", 5, false))
            .await
            .unwrap();

        let rows = api.list_progress("u1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].progress, 60);
        assert_eq!(api.call_counts().await.upsert_progress, 3);
    }

    #[tokio::test]
    async fn test_error_is_consumed_once() {
        let api = MockProgressApi::new()
            .with_error(ApiError::ServerError("boom".to_string()))
            .await;

        assert!(api.list_progress("u1").await.is_err());
        assert!(api.list_progress("u1").await.is_ok());
    }
}

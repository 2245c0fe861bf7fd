//! Lesson progress tracking
//!
//! An in-memory map from lesson id to progress, loaded wholesale from the
//! remote store and updated write-through: the local entry changes only
//! after the remote store confirms the write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::{ProgressApi, ProgressRecord, User};

pub mod notice;

pub use notice::{ConsoleNotifier, Notice, Notifier};

/// Progress for one lesson
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEntry {
    pub lesson_id: String,
    pub progress: u32,
    pub is_completed: bool,
    pub last_accessed: DateTime<Utc>,
}

impl From<ProgressRecord> for ProgressEntry {
    fn from(record: ProgressRecord) -> Self {
        Self {
            lesson_id: record.lesson_id,
            progress: record.progress,
            is_completed: record.is_completed,
            last_accessed: record.last_accessed,
        }
    }
}

/// Result of an update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Stored remotely and mirrored locally
    Saved(ProgressEntry),
    /// No signed-in user; nothing was written
    SignInRequired,
    /// The remote write failed; local state unchanged
    Failed,
}

/// Completion summary for a set of lessons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CourseCompletion {
    pub completed: usize,
    pub total: usize,
    /// Rounded to the nearest whole percent
    pub percentage: u32,
}

/// Progress tracker for the signed-in user
pub struct ProgressTracker<A: ProgressApi> {
    api: A,
    notifier: Arc<dyn Notifier>,
    entries: Mutex<HashMap<String, ProgressEntry>>,
    loading: AtomicBool,
    current_user: Mutex<Option<User>>,
}

impl<A: ProgressApi> ProgressTracker<A> {
    pub fn new(api: A, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            entries: Mutex::new(HashMap::new()),
            loading: AtomicBool::new(true),
            current_user: Mutex::new(None),
        }
    }

    /// Bind the tracker to a user before the first load
    pub fn with_user(self, user: Option<User>) -> Self {
        *self.lock_user() = user;
        self
    }

    #[allow(dead_code)]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Replace the map with the user's rows from the remote store.
    ///
    /// Without a user the map is emptied. A remote failure is logged and
    /// leaves the previous map in place. The loading flag is cleared in
    /// every case.
    pub async fn fetch_all(&self, user: Option<&User>) {
        *self.lock_user() = user.cloned();

        let Some(user) = user else {
            self.lock_entries().clear();
            self.loading.store(false, Ordering::SeqCst);
            return;
        };

        self.loading.store(true, Ordering::SeqCst);
        match self.api.list_progress(&user.id).await {
            Ok(records) => {
                log::debug!("Loaded {} progress rows for {}", records.len(), user.id);
                let fresh: HashMap<String, ProgressEntry> = records
                    .into_iter()
                    .map(|r| (r.lesson_id.clone(), ProgressEntry::from(r)))
                    .collect();
                *self.lock_entries() = fresh;
            }
            Err(e) => log::error!("Failed to load progress: {}", e),
        }
        self.loading.store(false, Ordering::SeqCst);
    }

    /// Reload for the current user: the one the tracker was bound to, or
    /// the last one seen by `fetch_all` or a saved `update`
    pub async fn refresh(&self) {
        let user = self.lock_user().clone();
        self.fetch_all(user.as_ref()).await;
    }

    /// Record progress for a lesson.
    ///
    /// Completion defaults to `progress >= 100` unless given explicitly.
    pub async fn update(
        &self,
        user: Option<&User>,
        lesson_id: &str,
        progress: u32,
        completed: Option<bool>,
    ) -> UpdateOutcome {
        let Some(user) = user else {
            self.notifier.notify(Notice::SignInRequired);
            return UpdateOutcome::SignInRequired;
        };

        let is_completed = completed.unwrap_or(progress >= 100);
        let record = ProgressRecord::new(&user.id, lesson_id, progress, is_completed);

        if let Err(e) = self.api.upsert_progress(&record).await {
            log::warn!("Progress write for {} failed: {}", lesson_id, e);
            self.notifier.notify(Notice::SaveFailed {
                message: e.to_string(),
            });
            return UpdateOutcome::Failed;
        }

        *self.lock_user() = Some(user.clone());
        let entry = ProgressEntry::from(record);
        let newly_completed = {
            let mut entries = self.lock_entries();
            let was_completed = entries.get(lesson_id).is_some_and(|e| e.is_completed);
            entries.insert(lesson_id.to_string(), entry.clone());
            is_completed && !was_completed
        };

        if newly_completed {
            self.notifier.notify(Notice::LessonCompleted {
                lesson_id: lesson_id.to_string(),
            });
        }
        UpdateOutcome::Saved(entry)
    }

    pub fn entry(&self, lesson_id: &str) -> Option<ProgressEntry> {
        self.lock_entries().get(lesson_id).cloned()
    }

    /// Progress percent, 0 when the lesson has no entry
    pub fn percent(&self, lesson_id: &str) -> u32 {
        self.lock_entries()
            .get(lesson_id)
            .map(|e| e.progress)
            .unwrap_or(0)
    }

    pub fn is_completed(&self, lesson_id: &str) -> bool {
        self.lock_entries()
            .get(lesson_id)
            .is_some_and(|e| e.is_completed)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// All entries, sorted by lesson id
    pub fn entries(&self) -> Vec<ProgressEntry> {
        let mut entries: Vec<ProgressEntry> = self.lock_entries().values().cloned().collect();
        entries.sort_by(|a, b| a.lesson_id.cmp(&b.lesson_id));
        entries
    }

    /// How many of the given lessons are completed
    pub fn course_completion(&self, lesson_ids: &[&str]) -> CourseCompletion {
        let total = lesson_ids.len();
        if total == 0 {
            return CourseCompletion {
                completed: 0,
                total: 0,
                percentage: 0,
            };
        }

        let entries = self.lock_entries();
        let completed = lesson_ids
            .iter()
            .filter(|id| entries.get(**id).is_some_and(|e| e.is_completed))
            .count();
        let percentage = (completed as f64 / total as f64 * 100.0).round() as u32;

        CourseCompletion {
            completed,
            total,
            percentage,
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, ProgressEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_user(&self) -> MutexGuard<'_, Option<User>> {
        self.current_user
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

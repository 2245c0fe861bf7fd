//! User-facing notices raised by progress tracking

use colored::Colorize;

/// A one-shot message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A write was attempted without a signed-in user
    SignInRequired,
    /// A lesson went from not completed to completed
    LessonCompleted { lesson_id: String },
    /// The remote store rejected a write
    SaveFailed { message: String },
}

/// Where notices are shown
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Prints notices to stderr so they never mix with command output
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::SignInRequired => eprintln!(
                "{} Sign in to save your progress. Run {}.",
                "!".yellow(),
                "learnhub init".cyan()
            ),
            Notice::LessonCompleted { lesson_id } => {
                eprintln!("{} Lesson {} completed!", "✓".green(), lesson_id.bold())
            }
            Notice::SaveFailed { message } => {
                eprintln!("{} Failed to save progress: {}", "✗".red(), message)
            }
        }
    }
}

/// Collects notices for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: std::sync::Mutex<Vec<Notice>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

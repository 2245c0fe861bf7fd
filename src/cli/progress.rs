//! Lesson progress commands

use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::catalog::Course;
use crate::cli::{CommandContext, OutputFormat};
use crate::client::SupabaseClient;
use crate::error::{Error, Result};
use crate::output::{self, formatters};
use crate::progress::{CourseCompletion, ProgressEntry, ProgressTracker, UpdateOutcome};

/// Display format for a lesson's progress
#[derive(Tabled, Serialize)]
struct EntryDisplay {
    #[tabled(rename = "LESSON")]
    lesson_id: String,

    #[tabled(rename = "PROGRESS")]
    progress: String,

    #[tabled(rename = "COMPLETED")]
    completed: String,

    #[tabled(rename = "LAST ACCESSED")]
    last_accessed: String,
}

impl From<ProgressEntry> for EntryDisplay {
    fn from(entry: ProgressEntry) -> Self {
        Self {
            lesson_id: entry.lesson_id,
            progress: format!("{}%", entry.progress),
            completed: yes_no(entry.is_completed),
            last_accessed: formatters::format_since(entry.last_accessed, chrono::Utc::now()),
        }
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}

/// Display format for a course's completion
#[derive(Tabled, Serialize)]
struct CourseDisplay {
    #[tabled(rename = "COURSE")]
    id: String,

    #[tabled(rename = "TITLE")]
    title: String,

    #[tabled(rename = "DONE")]
    done: String,

    #[tabled(rename = "COMPLETE")]
    bar: String,
}

impl CourseDisplay {
    fn new(course: &Course, completion: CourseCompletion) -> Self {
        Self {
            id: course.id.clone(),
            title: course.title.clone(),
            done: format!("{}/{}", completion.completed, completion.total),
            bar: format!(
                "{} {:>3}%",
                formatters::format_bar(completion.percentage, 20),
                completion.percentage
            ),
        }
    }
}

/// List progress for every lesson
pub async fn list(ctx: &CommandContext) -> Result<()> {
    let tracker = ctx.progress_tracker().await?;
    if ctx.user().is_none() {
        eprintln!(
            "{} Not signed in. Run {} to see your progress.",
            "○".dimmed(),
            "learnhub init".cyan()
        );
    }

    let entries = tracker.entries();
    match ctx.format() {
        OutputFormat::Json => output::print_json(&entries),
        format => {
            let rows: Vec<EntryDisplay> = entries.into_iter().map(EntryDisplay::from).collect();
            output::print(&rows, format)
        }
    }
}

/// Record progress for a lesson
pub async fn set(
    ctx: &CommandContext,
    lesson: &str,
    progress: u32,
    completed: Option<bool>,
) -> Result<()> {
    let tracker = ctx.progress_tracker().await?;
    save(ctx, &tracker, lesson, progress, completed).await
}

/// Mark a lesson completed
pub async fn complete(ctx: &CommandContext, lesson: &str) -> Result<()> {
    let tracker = ctx.progress_tracker().await?;
    save(ctx, &tracker, lesson, 100, None).await
}

async fn save(
    ctx: &CommandContext,
    tracker: &ProgressTracker<SupabaseClient>,
    lesson: &str,
    progress: u32,
    completed: Option<bool>,
) -> Result<()> {
    let user = ctx.user();
    match tracker.update(user.as_ref(), lesson, progress, completed).await {
        UpdateOutcome::Saved(entry) => match ctx.format() {
            OutputFormat::Json => output::print_json(&entry),
            _ => {
                println!(
                    "{} {} at {}%{}",
                    "✓".green(),
                    entry.lesson_id.bold(),
                    entry.progress,
                    if entry.is_completed { " (completed)" } else { "" }
                );
                Ok(())
            }
        },
        UpdateOutcome::SignInRequired | UpdateOutcome::Failed => {
            Err(Error::Other(format!("progress for {} was not saved", lesson)))
        }
    }
}

/// Show completion for one course
pub async fn course(ctx: &CommandContext, course_id: &str) -> Result<()> {
    let course = ctx.config.course(course_id)?;
    let tracker = ctx.progress_tracker().await?;
    let completion = tracker.course_completion(&course.lesson_ids());

    if ctx.format() == OutputFormat::Json {
        #[derive(Serialize)]
        struct CourseResult<'a> {
            course: &'a str,
            #[serde(flatten)]
            completion: CourseCompletion,
            lessons: Vec<ProgressEntry>,
        }
        let lessons = course
            .lessons
            .iter()
            .filter_map(|l| tracker.entry(&l.id))
            .collect();
        return output::print_json(&CourseResult {
            course: &course.id,
            completion,
            lessons,
        });
    }

    println!(
        "{}  {}/{} lessons  {} {}%",
        course.title.bold(),
        completion.completed,
        completion.total,
        formatters::format_bar(completion.percentage, 20),
        completion.percentage
    );

    let now = chrono::Utc::now();
    let rows: Vec<EntryDisplay> = course
        .lessons
        .iter()
        .map(|lesson| EntryDisplay {
            lesson_id: lesson.id.clone(),
            progress: format!("{}%", tracker.percent(&lesson.id)),
            completed: yes_no(tracker.is_completed(&lesson.id)),
            last_accessed: tracker
                .entry(&lesson.id)
                .map(|e| formatters::format_since(e.last_accessed, now))
                .unwrap_or_else(|| "never".to_string()),
        })
        .collect();
    output::print(&rows, ctx.format())
}

/// Show completion for every catalog course
pub async fn courses(ctx: &CommandContext) -> Result<()> {
    if ctx.config.courses.is_empty() {
        println!("No courses in the catalog. Add them under `courses:` in the config file.");
        return Ok(());
    }

    let tracker = ctx.progress_tracker().await?;
    let completions: Vec<(&Course, CourseCompletion)> = ctx
        .config
        .courses
        .iter()
        .map(|c| (c, tracker.course_completion(&c.lesson_ids())))
        .collect();

    match ctx.format() {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = completions
                .iter()
                .map(|(c, completion)| {
                    serde_json::json!({
                        "course": c.id,
                        "title": c.title,
                        "completed": completion.completed,
                        "total": completion.total,
                        "percentage": completion.percentage,
                    })
                })
                .collect();
            output::print_json(&json)
        }
        format => {
            let rows: Vec<CourseDisplay> = completions
                .into_iter()
                .map(|(c, completion)| CourseDisplay::new(c, completion))
                .collect();
            output::print(&rows, format)
        }
    }
}

//! CLI command definitions and handlers

use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

pub mod args;
pub mod context;
pub mod init;
pub mod progress;
pub mod status;
pub mod worker;

pub use args::{GlobalOptions, OutputFormat};
pub use context::CommandContext;

/// LearnHub CLI - offline cache worker and lesson progress for the LearnHub platform
#[derive(Parser, Debug)]
#[command(name = "learnhub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "LEARNHUB_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "LEARNHUB_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Override cache directory
    #[arg(long, global = true, env = "LEARNHUB_CACHE_DIR", hide_env = true)]
    pub cache_dir: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "LEARNHUB_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure the backend and sign in
    Init {
        /// Backend project URL
        #[arg(long)]
        url: Option<String>,

        /// Public anon key
        #[arg(long)]
        anon_key: Option<String>,

        /// Access token of the signed-in user
        #[arg(long)]
        token: Option<String>,
    },

    /// Show configuration, session and worker status
    Status,

    /// Display version information
    Version,

    /// Manage the offline cache worker
    #[command(subcommand)]
    Worker(WorkerCommands),

    /// View and record lesson progress
    #[command(subcommand)]
    Progress(ProgressCommands),
}

/// Offline cache worker subcommands
#[derive(Subcommand, Debug)]
pub enum WorkerCommands {
    /// Install the configured version and activate it
    #[command(after_help = "EXAMPLES:\n  \
            learnhub worker deploy\n  \
            learnhub worker deploy --wait   # keep the old version active until confirmed")]
    Deploy {
        /// Leave the new version waiting while an older one is active
        #[arg(long)]
        wait: bool,

        /// Activate a waiting version without asking
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Route one request through the active worker
    #[command(after_help = "EXAMPLES:\n  \
            learnhub worker fetch http://localhost:5173/assets/index.js\n  \
            learnhub worker fetch http://localhost:5173/courses --navigate")]
    Fetch {
        /// Absolute URL to request
        url: String,

        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,

        /// HTTP method
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,

        /// Print the response body
        #[arg(long)]
        body: bool,
    },

    /// Show cache namespaces and their sizes
    Status,

    /// List the URLs cached in a namespace
    #[command(after_help = "EXAMPLES:\n  \
            learnhub worker entries\n  \
            learnhub worker entries learnhub-dynamic-v2")]
    Entries {
        /// Namespace name (defaults to the current static namespace)
        namespace: Option<String>,
    },

    /// Delete every cache namespace
    Clear,
}

/// Progress subcommands
#[derive(Subcommand, Debug)]
pub enum ProgressCommands {
    /// List progress for every lesson
    List,

    /// Record progress for a lesson
    #[command(after_help = "EXAMPLES:\n  \
            learnhub progress set html-1 40\n  \
            learnhub progress set html-1 100 --completed false")]
    Set {
        /// Lesson ID
        lesson: String,

        /// Progress percent
        #[arg(value_parser = clap::value_parser!(u32).range(0..=100))]
        progress: u32,

        /// Override the completion flag (defaults to progress >= 100)
        #[arg(long)]
        completed: Option<bool>,
    },

    /// Mark a lesson completed
    Complete {
        /// Lesson ID
        lesson: String,
    },

    /// Show completion for one course
    Course {
        /// Course ID from the catalog
        course: String,
    },

    /// Show completion for every course in the catalog
    Courses,
}

/// Steady-ticking spinner on stderr, hidden when stderr is not a terminal
pub fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

//! Status command implementation

use colored::Colorize;

use crate::cli::CommandContext;
use crate::config::Config;
use crate::error::Result;

/// Run the status command to display configuration status
pub fn run(ctx: &CommandContext) -> Result<()> {
    println!("{}\n", "LearnHub Status".bold());

    let config_path = Config::resolve_path(ctx.opts.config_ref())?;
    if config_path.exists() {
        println!("Config file: {}", config_path.display().to_string().cyan());
    } else {
        println!(
            "Config file: {} {}",
            config_path.display().to_string().cyan(),
            "(not created yet)".dimmed()
        );
    }
    println!();

    let config = &ctx.config;

    // Backend
    match &config.backend {
        Some(backend) => println!("{} Backend: {}", "✓".green(), backend.url),
        None => {
            println!("{} Backend not configured", "✗".red());
            println!("  → Run 'learnhub init' to configure");
        }
    }

    // Session
    match &config.session {
        Some(session) if session.is_expired() => {
            println!(
                "{} Access token expired (run 'learnhub init' with a fresh token)",
                "⚠".yellow()
            );
        }
        Some(session) => {
            let who = session.email.as_deref().unwrap_or(&session.user_id);
            match session.expires_at {
                Some(expires) => {
                    let remaining = expires.signed_duration_since(chrono::Utc::now());
                    println!(
                        "{} Signed in as {} (expires in {}h {}m)",
                        "✓".green(),
                        who,
                        remaining.num_hours(),
                        remaining.num_minutes() % 60
                    );
                }
                None => println!("{} Signed in as {}", "✓".green(), who),
            }
        }
        None => println!("{} Signed out", "○".dimmed()),
    }

    // Worker
    let names = config.worker.cache_names();
    let (installed, active) = ctx
        .open_storage()
        .and_then(|s| {
            Ok((
                s.has_namespace(&names.static_ns)?,
                s.active_version(&config.worker.prefix)?,
            ))
        })
        .unwrap_or((false, None));
    if installed && active.as_deref() == Some(config.worker.version.as_str()) {
        println!(
            "{} Worker {} active for {}",
            "✓".green(),
            config.worker.version.bold(),
            config.worker.origin
        );
    } else if installed {
        println!(
            "{} Worker {} installed and waiting (active: {})",
            "⚠".yellow(),
            config.worker.version.bold(),
            active.as_deref().unwrap_or("none")
        );
        println!("  → Run 'learnhub worker deploy' to activate it");
    } else {
        println!(
            "{} Worker {} not installed",
            "○".dimmed(),
            config.worker.version.bold()
        );
        println!("  → Run 'learnhub worker deploy' to cache the app shell");
    }

    // Catalog
    if config.courses.is_empty() {
        println!("{} No courses in the catalog", "○".dimmed());
    } else {
        let lessons: usize = config.courses.iter().map(|c| c.lessons.len()).sum();
        println!(
            "{} {} courses, {} lessons in the catalog",
            "✓".green(),
            config.courses.len(),
            lessons
        );
    }

    println!();
    Ok(())
}

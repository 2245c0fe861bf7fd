//! Offline cache worker commands

use colored::Colorize;
use dialoguer::{Confirm, theme::ColorfulTheme};
use reqwest::{Method, Url};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{CommandContext, OutputFormat, spinner};
use crate::error::{Error, FetchError, Result};
use crate::network::{Request, ResponseSource};
use crate::output::{self, formatters};
use crate::worker::{ControlCommand, SKIP_WAITING, WorkerState};

/// Install the configured version and activate it
pub async fn deploy(ctx: &CommandContext, wait: bool, yes: bool) -> Result<()> {
    let runtime = ctx.worker_runtime()?;
    let mut worker_config = ctx.config.worker.clone();
    let mut registration = runtime.registration();

    // Bring the last activated version back as the active worker
    let mut previous = None;
    if let Some(version) = runtime
        .active_version(&worker_config)?
        .filter(|v| *v != worker_config.version)
    {
        if runtime
            .resume_version(&mut registration, &worker_config, &version)?
            .is_some()
        {
            previous = Some(version);
        }
    }

    if wait {
        worker_config.skip_waiting_on_install = false;
    }
    let controller = runtime.controller(&worker_config)?;
    let names = controller.names().clone();

    let spinner = spinner(format!(
        "Installing {} ({} shell assets)...",
        worker_config.version,
        worker_config.static_assets.len()
    ));
    let result = registration.register(controller).await;
    spinner.finish_and_clear();
    let mut state = result?;

    if state == WorkerState::Installed {
        println!(
            "{} Version {} installed and waiting; {} is still active.",
            "○".dimmed(),
            worker_config.version.bold(),
            previous.as_deref().unwrap_or("the previous version")
        );
        let activate = yes
            || Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("Activate the new version now?")
                .default(true)
                .interact()?;
        if activate
            && registration.post_message(SKIP_WAITING).await? == Some(ControlCommand::SkipWaiting)
        {
            state = registration
                .active()
                .map(|w| w.state())
                .unwrap_or(WorkerState::Redundant);
        }
    }
    registration.settle().await;

    #[derive(Serialize)]
    struct DeployResult<'a> {
        version: &'a str,
        state: WorkerState,
        static_namespace: &'a str,
        dynamic_namespace: &'a str,
        previous_version: Option<&'a str>,
    }

    match ctx.format() {
        OutputFormat::Json => output::print_json(&DeployResult {
            version: &worker_config.version,
            state,
            static_namespace: &names.static_ns,
            dynamic_namespace: &names.dynamic,
            previous_version: previous.as_deref(),
        })?,
        _ => match state {
            WorkerState::Active => {
                println!(
                    "{} Worker {} active",
                    "✓".green(),
                    worker_config.version.bold()
                );
                println!("  Shell cached in {}", names.static_ns.cyan());
            }
            _ => println!(
                "{} Worker {} left waiting. Run {} again to activate it.",
                "○".dimmed(),
                worker_config.version.bold(),
                "learnhub worker deploy".cyan()
            ),
        },
    }

    Ok(())
}

/// Route one request through the active worker
pub async fn fetch(
    ctx: &CommandContext,
    url: &str,
    navigate: bool,
    method: &str,
    print_body: bool,
) -> Result<()> {
    let url = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| FetchError::InvalidUrl(format!("unknown method {}", method)))?;
    let request = if navigate {
        Request::navigate(url)
    } else {
        Request::get(url)
    }
    .with_method(method);

    let runtime = ctx.worker_runtime()?;
    let registration = runtime.resume_current(&ctx.config.worker)?;
    let response = registration.fetch(request.clone()).await?;
    registration.settle().await;

    let source = match &response.source {
        ResponseSource::Network => "network".to_string(),
        ResponseSource::Cache(namespace) => format!("cache ({})", namespace),
    };

    match ctx.format() {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct FetchResult<'a> {
                url: &'a str,
                status: u16,
                source: &'a ResponseSource,
                size_bytes: usize,
                content_type: Option<&'a str>,
            }
            output::print_json(&FetchResult {
                url: request.url.as_str(),
                status: response.status,
                source: &response.source,
                size_bytes: response.body.len(),
                content_type: response.header("content-type"),
            })?;
        }
        _ => {
            let status = if response.is_success() {
                response.status.to_string().green()
            } else {
                response.status.to_string().yellow()
            };
            println!("{} {}", status, request.url);
            println!("  Source: {}", source.cyan());
            println!("  Size:   {}", formatters::format_bytes(response.body.len()));
            if print_body {
                println!();
                println!("{}", String::from_utf8_lossy(&response.body));
            }
        }
    }

    Ok(())
}

/// Display row for a cache namespace
#[derive(Tabled, Serialize)]
struct NamespaceDisplay {
    #[tabled(rename = "NAMESPACE")]
    name: String,

    #[tabled(rename = "ENTRIES")]
    entries: usize,

    #[tabled(rename = "SIZE")]
    size: String,

    #[tabled(rename = "UPDATED")]
    updated: String,

    #[tabled(rename = "STATUS")]
    status: String,
}

/// Show cache namespaces and their sizes
pub fn status(ctx: &CommandContext) -> Result<()> {
    let storage = ctx.open_storage()?;
    let names = ctx.config.worker.cache_names();
    let stats = storage.stats()?;
    let active_version = storage.active_version(&ctx.config.worker.prefix)?;

    if ctx.format() == OutputFormat::Json {
        #[derive(Serialize)]
        struct StatusResult<'a> {
            version: &'a str,
            installed: bool,
            active_version: Option<String>,
            namespaces: &'a [crate::cache::NamespaceStats],
        }
        return output::print_json(&StatusResult {
            version: &ctx.config.worker.version,
            installed: storage.has_namespace(&names.static_ns)?,
            active_version,
            namespaces: &stats,
        });
    }

    let rows: Vec<NamespaceDisplay> = stats
        .into_iter()
        .map(|s| NamespaceDisplay {
            status: if names.is_current(&s.name) {
                "current".to_string()
            } else {
                "stale".to_string()
            },
            updated: formatters::format_age(s.newest_entry),
            size: formatters::format_bytes(s.size_bytes),
            entries: s.entries,
            name: s.name,
        })
        .collect();

    println!(
        "Worker version: {}  active: {}  (cache: {})",
        ctx.config.worker.version.bold(),
        active_version.as_deref().unwrap_or("none"),
        cache_location(ctx).dimmed()
    );
    output::print(&rows, ctx.format())
}

/// List the URLs stored in a namespace, the current static one by default
pub fn entries(ctx: &CommandContext, namespace: Option<&str>) -> Result<()> {
    let storage = ctx.open_storage()?;
    let names = ctx.config.worker.cache_names();
    let namespace = namespace.unwrap_or(&names.static_ns);
    if !storage.has_namespace(namespace)? {
        return Err(Error::Other(format!("No cache namespace named {}", namespace)));
    }
    let urls = storage.keys(namespace)?;

    match ctx.format() {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "namespace": namespace,
            "urls": urls,
        })),
        _ => {
            println!("{} ({} entries)", namespace.bold(), urls.len());
            for url in urls {
                println!("  {}", url);
            }
            Ok(())
        }
    }
}

/// Delete every cache namespace
pub fn clear(ctx: &CommandContext) -> Result<()> {
    let storage = ctx.open_storage()?;
    let stats = storage.clear_all()?;

    match ctx.format() {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "namespaces_removed": stats.namespaces_removed,
                "entries_removed": stats.entries_removed,
                "success": true,
            });
            output::print_json(&json)?;
        }
        _ => {
            if stats.namespaces_removed > 0 {
                println!(
                    "Removed {} namespaces ({} entries)",
                    stats.namespaces_removed, stats.entries_removed
                );
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

fn cache_location(ctx: &CommandContext) -> String {
    match ctx.opts.cache_dir_ref() {
        Some(dir) => dir.to_string(),
        None => crate::cache::CacheStorage::cache_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
    }
}

//! LearnHub CLI - offline cache worker and lesson progress for the LearnHub platform

use clap::Parser;

mod cache;
mod catalog;
mod cli;
mod client;
mod config;
mod error;
mod network;
mod output;
mod progress;
mod worker;

use cli::{Cli, CommandContext, Commands, GlobalOptions, ProgressCommands, WorkerCommands};
use error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// `--debug` forces debug level; otherwise `RUST_LOG` or warnings only
fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Init {
            url,
            anon_key,
            token,
        } => cli::init::run(&opts, url, anon_key, token).await,
        Commands::Status => cli::status::run(&CommandContext::new(&opts)?),
        Commands::Version => {
            println!("learnhub version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Worker(cmd) => {
            let ctx = CommandContext::new(&opts)?;
            match cmd {
                WorkerCommands::Deploy { wait, yes } => cli::worker::deploy(&ctx, wait, yes).await,
                WorkerCommands::Fetch {
                    url,
                    navigate,
                    method,
                    body,
                } => cli::worker::fetch(&ctx, &url, navigate, &method, body).await,
                WorkerCommands::Status => cli::worker::status(&ctx),
                WorkerCommands::Entries { namespace } => {
                    cli::worker::entries(&ctx, namespace.as_deref())
                }
                WorkerCommands::Clear => cli::worker::clear(&ctx),
            }
        }
        Commands::Progress(cmd) => {
            let ctx = CommandContext::new(&opts)?;
            match cmd {
                ProgressCommands::List => cli::progress::list(&ctx).await,
                ProgressCommands::Set {
                    lesson,
                    progress,
                    completed,
                } => cli::progress::set(&ctx, &lesson, progress, completed).await,
                ProgressCommands::Complete { lesson } => {
                    cli::progress::complete(&ctx, &lesson).await
                }
                ProgressCommands::Course { course } => cli::progress::course(&ctx, &course).await,
                ProgressCommands::Courses => cli::progress::courses(&ctx).await,
            }
        }
    }
}
